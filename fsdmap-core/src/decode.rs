//! Bounds-checked scalar reads from FileStaticData buffers.
//!
//! These are the primitives neighbouring decoders use to pull single fields
//! out of the same kind of buffer a [`KeyMap`](crate::KeyMap) reads. All
//! integers are little-endian and may sit at any (unaligned) offset.

use crate::error::{Error, Result};
use byteorder::{ByteOrder, LittleEndian};

fn word_at<'a>(buffer: &'a [u8], offset: usize, context: &'static str) -> Result<&'a [u8]> {
    offset
        .checked_add(4)
        .and_then(|end| buffer.get(offset..end))
        .ok_or_else(|| Error::too_short(context, 4, buffer.len().saturating_sub(offset)))
}

/// Read an unsigned 32-bit integer at `offset`.
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] unless `offset + 4 <= buffer.len()`.
pub fn read_u32(buffer: &[u8], offset: usize) -> Result<u32> {
    word_at(buffer, offset, "read_u32 requires 4 bytes at offset").map(LittleEndian::read_u32)
}

/// Read a signed 32-bit integer at `offset`.
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] unless `offset + 4 <= buffer.len()`.
pub fn read_i32(buffer: &[u8], offset: usize) -> Result<i32> {
    word_at(buffer, offset, "read_i32 requires 4 bytes at offset").map(LittleEndian::read_i32)
}

/// Read a length-prefixed byte string at `offset`, without copying.
///
/// The prefix is a 4-byte little-endian length `L`; the next `L` bytes are
/// returned. The prefix is read unsigned, so a length with the sign bit set
/// is simply too large for any buffer.
///
/// # Errors
///
/// Returns [`Error::BufferTooShort`] if fewer than 4 bytes remain at
/// `offset`, or fewer than `L` bytes follow the prefix.
pub fn read_length_prefixed(buffer: &[u8], offset: usize) -> Result<&[u8]> {
    let length = LittleEndian::read_u32(word_at(buffer, offset, "length-prefixed string prefix")?);
    let start = offset + 4;
    let available = buffer.len() - start;

    usize::try_from(length)
        .ok()
        .and_then(|len| start.checked_add(len))
        .and_then(|end| buffer.get(start..end))
        .ok_or_else(|| Error::too_short("length-prefixed string", u64::from(length), available))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_u32_at_offsets() {
        let bytes = [0xFF, 0x78, 0x56, 0x34, 0x12, 0x00];
        assert_eq!(read_u32(&bytes, 1).unwrap(), 0x1234_5678);
        assert_eq!(read_u32(&bytes, 2).unwrap(), 0x0012_3456);
    }

    #[test]
    fn test_read_i32_negative() {
        let bytes = (-5i32).to_le_bytes();
        assert_eq!(read_i32(&bytes, 0).unwrap(), -5);
        assert_eq!(read_u32(&bytes, 0).unwrap(), 0xFFFF_FFFB);
    }

    #[test]
    fn test_one_byte_short() {
        let bytes = [0u8; 8];
        assert!(read_u32(&bytes, 4).is_ok());
        assert!(matches!(read_u32(&bytes, 5), Err(Error::BufferTooShort { .. })));
        assert!(matches!(read_i32(&bytes, 5), Err(Error::BufferTooShort { .. })));
        assert!(read_u32(&[], 0).is_err());
        assert!(read_u32(&bytes, usize::MAX).is_err());
    }

    #[test]
    fn test_length_prefixed() {
        let mut bytes = vec![0xEE];
        bytes.extend_from_slice(&3u32.to_le_bytes());
        bytes.extend_from_slice(b"abcdef");

        assert_eq!(read_length_prefixed(&bytes, 1).unwrap(), b"abc");
    }

    #[test]
    fn test_length_prefixed_empty() {
        let bytes = 0u32.to_le_bytes();
        assert_eq!(read_length_prefixed(&bytes, 0).unwrap(), b"");
    }

    #[test]
    fn test_length_prefixed_too_long() {
        let mut bytes = 10u32.to_le_bytes().to_vec();
        bytes.extend_from_slice(b"short");

        let err = read_length_prefixed(&bytes, 0).unwrap_err();
        assert!(err.to_string().contains("10"));
    }

    #[test]
    fn test_length_prefixed_short_prefix_names_string() {
        let err = read_length_prefixed(&[1u8, 0], 0).unwrap_err();
        assert!(err.to_string().starts_with("length-prefixed string prefix"), "{err}");
    }

    #[test]
    fn test_length_prefixed_sign_bit() {
        let mut bytes = (-1i32).to_le_bytes().to_vec();
        bytes.extend_from_slice(b"data");
        assert!(read_length_prefixed(&bytes, 0).is_err());
    }
}
