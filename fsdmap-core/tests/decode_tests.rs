use fsdmap_core::Error;
use fsdmap_core::decode::{read_i32, read_length_prefixed, read_u32};
use fsdmap_core::layout::{PREFIX_SIZE, RECORD_SIZE, Record};

#[test]
fn test_scalar_reads_at_every_offset() {
    let values: [u32; 4] = [0, 1, 0x8000_0000, u32::MAX];

    for value in values {
        for pad in 0..5 {
            let mut bytes = vec![0xCC; pad];
            bytes.extend_from_slice(&value.to_le_bytes());

            assert_eq!(read_u32(&bytes, pad).unwrap(), value);
            assert_eq!(read_i32(&bytes, pad).unwrap(), value as i32);
        }
    }
}

#[test]
fn test_one_byte_short_fails() {
    for len in 4..12 {
        let bytes = vec![0u8; len];
        let offset = len - 3;

        assert!(matches!(read_u32(&bytes, offset), Err(Error::BufferTooShort { .. })));
        assert!(matches!(read_i32(&bytes, offset), Err(Error::BufferTooShort { .. })));
        assert!(read_u32(&bytes, len - 4).is_ok());
    }
}

#[test]
fn test_length_prefixed_strings_back_to_back() {
    let mut bytes = Vec::new();
    for s in [&b"alpha"[..], b"", b"gamma ray"] {
        bytes.extend_from_slice(&(s.len() as u32).to_le_bytes());
        bytes.extend_from_slice(s);
    }

    let first = read_length_prefixed(&bytes, 0).unwrap();
    assert_eq!(first, b"alpha");

    let second_at = 4 + first.len();
    let second = read_length_prefixed(&bytes, second_at).unwrap();
    assert!(second.is_empty());

    let third = read_length_prefixed(&bytes, second_at + 4).unwrap();
    assert_eq!(third, b"gamma ray");
}

#[test]
fn test_length_prefixed_short_prefix() {
    let bytes = [5u8, 0, 0];
    assert!(matches!(read_length_prefixed(&bytes, 0), Err(Error::BufferTooShort { .. })));
    assert!(read_length_prefixed(&bytes, 10).is_err());
}

#[test]
fn test_layout_constants() {
    assert_eq!(PREFIX_SIZE, 4);
    assert_eq!(RECORD_SIZE, 12);

    let mut bytes = Vec::new();
    Record::new(1, 2, 3).write_to(&mut bytes).unwrap();
    assert_eq!(bytes.len(), RECORD_SIZE);
}
