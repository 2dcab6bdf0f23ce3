//! Fixed-width record layout of a keyed record region.
//!
//! # Layout
//!
//! ```text
//! Offset      Size   Field
//! ------      ----   -----
//! 0           4      count:  i32 LE (number of records, N)
//! 4 + 12*i    4      key:    u32 LE
//! 8 + 12*i    4      value1: u32 LE
//! 12 + 12*i   4      value2: u32 LE
//! ```
//!
//! Records carry no padding and no alignment guarantee: the region starts
//! wherever the caller's offset puts it, so every field is decoded with an
//! unaligned little-endian read. Record `i` lives at
//! `region_start + i * RECORD_SIZE`, which is what lets lookups binary
//! search the region in place.

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use std::io;

/// Size of the record-count prefix in bytes
pub const PREFIX_SIZE: usize = 4;

/// Size of one `(key, value1, value2)` record in bytes
pub const RECORD_SIZE: usize = 12;

/// One decoded record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Record {
    /// Sort key
    pub key: u32,

    /// First payload word
    pub value1: u32,

    /// Second payload word
    pub value2: u32,
}

impl Record {
    /// Create a record
    #[must_use]
    pub const fn new(key: u32, value1: u32, value2: u32) -> Self {
        Self { key, value1, value2 }
    }

    /// Decode a record from the first [`RECORD_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` if fewer than [`RECORD_SIZE`] bytes are available.
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let raw = bytes.get(..RECORD_SIZE)?;
        let mut words = [0u32; 3];
        LittleEndian::read_u32_into(raw, &mut words);
        let [key, value1, value2] = words;
        Some(Self { key, value1, value2 })
    }

    /// Decode only the key of the record starting at `bytes`
    #[inline]
    #[must_use]
    pub fn key_from_bytes(bytes: &[u8]) -> Option<u32> {
        bytes.get(..4).map(LittleEndian::read_u32)
    }

    /// Append the encoded record to `out`.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_u32::<LittleEndian>(self.key)?;
        out.write_u32::<LittleEndian>(self.value1)?;
        out.write_u32::<LittleEndian>(self.value2)
    }

    /// The `(value1, value2)` payload pair
    #[must_use]
    pub const fn values(&self) -> (u32, u32) {
        (self.value1, self.value2)
    }
}

/// Number of whole records that fit in `bytes` bytes
#[must_use]
pub const fn records_in(bytes: usize) -> usize {
    bytes / RECORD_SIZE
}
