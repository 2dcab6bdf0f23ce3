//! Encoder producing buffers that [`KeyMap`] decodes.

use crate::error::{Error, Result};
use crate::layout::{PREFIX_SIZE, RECORD_SIZE, Record};
use crate::table::KeyMap;
use byteorder::{LittleEndian, WriteBytesExt};
use std::collections::BTreeMap;
use std::io;

/// Collects records in any order and writes them sorted by key.
#[derive(Debug, Clone, Default)]
pub struct KeyMapBuilder {
    records: BTreeMap<u32, (u32, u32)>,
}

impl KeyMapBuilder {
    /// Create an empty builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a record.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DuplicateKey`] if `key` was already added.
    pub fn insert(&mut self, key: u32, value1: u32, value2: u32) -> Result<()> {
        if self.records.contains_key(&key) {
            return Err(Error::DuplicateKey(key));
        }
        self.records.insert(key, (value1, value2));
        Ok(())
    }

    /// Number of records added so far
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if no records were added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Size of the encoded table in bytes
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        PREFIX_SIZE + self.records.len() * RECORD_SIZE
    }

    /// Write the count prefix followed by every record in key order.
    ///
    /// # Errors
    ///
    /// Propagates write failures from `out`, and fails with
    /// [`io::ErrorKind::InvalidInput`] if the record count does not fit the
    /// 32-bit signed prefix.
    pub fn write_to<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        let count = i32::try_from(self.records.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "too many records"))?;

        out.write_i32::<LittleEndian>(count)?;
        for (&key, &(value1, value2)) in &self.records {
            Record::new(key, value1, value2).write_to(out)?;
        }
        Ok(())
    }

    /// Encode into a new buffer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the record count does not fit the prefix.
    pub fn build(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::with_capacity(self.encoded_len());
        self.write_to(&mut bytes)?;
        Ok(bytes)
    }

    /// Encode and decode straight into a table.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the records cannot be encoded.
    pub fn build_map(&self) -> Result<KeyMap> {
        KeyMap::from_buffer(self.build()?, 0)
    }
}

impl Extend<Record> for KeyMapBuilder {
    /// Later records replace earlier ones with the same key
    fn extend<I: IntoIterator<Item = Record>>(&mut self, records: I) {
        for record in records {
            self.records.insert(record.key, record.values());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sorted_output() {
        let mut builder = KeyMapBuilder::new();
        builder.insert(30, 3, 3).unwrap();
        builder.insert(10, 1, 1).unwrap();
        builder.insert(20, 2, 2).unwrap();

        let bytes = builder.build().unwrap();
        assert_eq!(bytes.len(), builder.encoded_len());
        assert_eq!(&bytes[..4], &3i32.to_le_bytes());
        assert_eq!(Record::from_bytes(&bytes[4..]).unwrap().key, 10);
        assert_eq!(Record::from_bytes(&bytes[28..]).unwrap().key, 30);
    }

    #[test]
    fn test_duplicate_key() {
        let mut builder = KeyMapBuilder::new();
        builder.insert(1, 0, 0).unwrap();
        assert!(matches!(builder.insert(1, 5, 5), Err(Error::DuplicateKey(1))));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn test_extend_last_wins() {
        let mut builder = KeyMapBuilder::new();
        builder.extend([Record::new(4, 1, 1), Record::new(4, 2, 2)]);

        let map = builder.build_map().unwrap();
        assert_eq!(map.find(4), Some((2, 2)));
    }

    #[test]
    fn test_build_matches_write_to() {
        let mut builder = KeyMapBuilder::new();
        builder.insert(9, 1, 2).unwrap();
        builder.insert(3, 4, 5).unwrap();

        let mut written = Vec::new();
        builder.write_to(&mut written).unwrap();
        assert_eq!(builder.build().unwrap(), written);
        assert_eq!(builder.build_map().unwrap().find(3), Some((4, 5)));
    }

    #[test]
    fn test_empty_builder() {
        let builder = KeyMapBuilder::new();
        assert!(builder.is_empty());
        assert_eq!(builder.build().unwrap(), 0i32.to_le_bytes());
    }
}
