//! Read-only keyed record table decoded in place from a shared buffer.
//!
//! # Trust Model
//!
//! Records must be stored in strictly increasing key order. The table does
//! not re-sort, and by default it does not check: a buffer that breaks the
//! order makes lookups return wrong answers rather than fail. Set
//! [`TableOptions::validate_order`] to scan once at construction.

use crate::buffer::SharedBuffer;
use crate::decode::read_i32;
use crate::error::{Error, Result};
use crate::iter::{Projected, Projection, RecordIter};
use crate::layout::{self, PREFIX_SIZE, RECORD_SIZE, Record};
use crate::{RegionCheck, TableOptions};
use log::{debug, warn};
use std::cmp::Ordering;
use std::fmt::Display;
use std::path::Path;
use std::sync::Arc;

/// Validated record region inside a shared buffer.
///
/// Shared between a [`KeyMap`] and its iterators; holding one keeps the
/// backing buffer alive.
#[derive(Debug)]
pub(crate) struct Region {
    buffer: SharedBuffer,

    /// Byte offset of record 0
    start: usize,

    /// Addressable records
    len: usize,

    /// Count read from the prefix
    declared: usize,
}

impl Region {
    fn decode(buffer: SharedBuffer, offset: usize, options: TableOptions) -> Result<Self> {
        let bytes = buffer.as_bytes();

        let start = offset
            .checked_add(PREFIX_SIZE)
            .filter(|&start| start <= bytes.len())
            .ok_or_else(|| {
                Error::too_short(
                    "Initialize requires a buffer of at least 4 bytes",
                    PREFIX_SIZE as u64,
                    bytes.len().saturating_sub(offset),
                )
            })?;

        let raw = read_i32(bytes, offset)?;
        let declared = usize::try_from(raw).map_err(|_| Error::InvalidRecordCount(raw))?;
        let remaining = bytes.len() - start;

        // Legacy check: the prefix is compared against the byte count.
        if remaining < declared {
            return Err(Error::too_short(
                "Not enough data in buffer",
                declared as u64,
                remaining,
            ));
        }

        let len = match options.region_check {
            RegionCheck::Records => {
                let needed = declared as u64 * RECORD_SIZE as u64;
                if (remaining as u64) < needed {
                    return Err(Error::too_short(
                        "Record region shorter than declared record count",
                        needed,
                        remaining,
                    ));
                }
                declared
            }
            RegionCheck::Bytes => {
                let whole = layout::records_in(remaining).min(declared);
                if whole < declared {
                    warn!(
                        "keymap at offset {offset} declares {declared} records but only {whole} fit in {remaining} bytes"
                    );
                }
                whole
            }
        };

        let region = Self { buffer, start, len, declared };

        if options.validate_order {
            region.check_order()?;
        }

        debug!("keymap initialized at offset {offset}: {declared} declared, {len} addressable");
        Ok(region)
    }

    fn record_bytes(&self, index: usize) -> Option<&[u8]> {
        if index >= self.len {
            return None;
        }
        // start + len * RECORD_SIZE was bounds-checked in decode()
        let at = self.start + index * RECORD_SIZE;
        self.buffer.slice(at, at + RECORD_SIZE)
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn record(&self, index: usize) -> Option<Record> {
        self.record_bytes(index).and_then(Record::from_bytes)
    }

    fn key_at(&self, index: usize) -> Option<u32> {
        self.record_bytes(index).and_then(Record::key_from_bytes)
    }

    /// Binary search on the key field
    fn search(&self, key: u32) -> Option<Record> {
        let mut lo = 0;
        let mut hi = self.len;

        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key_at(mid)?.cmp(&key) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return self.record(mid),
            }
        }

        None
    }

    fn check_order(&self) -> Result<()> {
        let mut keys = (0..self.len).filter_map(|index| Some((index, self.key_at(index)?)));
        let Some((_, mut previous)) = keys.next() else {
            return Ok(());
        };

        for (index, key) in keys {
            if key <= previous {
                return Err(Error::UnsortedKeys { index, previous, key });
            }
            previous = key;
        }

        Ok(())
    }
}

/// Convert an arbitrary integer into a lookup key.
///
/// # Errors
///
/// Returns [`Error::InvalidKeyType`] if `key` does not fit in a `u32`.
pub fn key_from<K>(key: K) -> Result<u32>
where
    K: TryInto<u32> + Copy + Display,
{
    key.try_into().map_err(|_| Error::InvalidKeyType { key: key.to_string() })
}

/// Immutable lookup table over `(key, value1, value2)` records.
///
/// The table borrows its records from a [`SharedBuffer`] and keeps that
/// buffer alive for as long as the table, or any iterator created from it,
/// exists. Cloning a `KeyMap` is cheap and shares the same region.
///
/// # Example
///
/// ```
/// use fsdmap_core::{KeyMap, KeyMapBuilder};
///
/// # fn main() -> anyhow::Result<()> {
/// let mut builder = KeyMapBuilder::new();
/// builder.insert(1, 10, 20)?;
/// builder.insert(5, 30, 40)?;
///
/// let map = KeyMap::from_buffer(builder.build()?, 0)?;
/// assert_eq!(map.len(), 2);
/// assert_eq!(map.find(5), Some((30, 40)));
/// assert_eq!(map.find(3), None);
/// assert!(map.get(3).unwrap_err().is_not_found());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyMap {
    region: Option<Arc<Region>>,
    options: TableOptions,
}

impl KeyMap {
    /// Create an uninitialized table with default options.
    ///
    /// Until [`initialize`](Self::initialize) succeeds the table is empty:
    /// lookups miss and iterators yield nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an uninitialized table with custom options
    #[must_use]
    pub fn with_options(options: TableOptions) -> Self {
        Self { region: None, options }
    }

    /// Decode a table at `offset` in `buffer` with default options.
    ///
    /// # Errors
    ///
    /// See [`initialize`](Self::initialize).
    pub fn from_buffer(buffer: impl Into<SharedBuffer>, offset: usize) -> Result<Self> {
        Self::open_with(buffer, offset, TableOptions::default())
    }

    /// Decode a table at `offset` in `buffer` with custom options.
    ///
    /// # Errors
    ///
    /// See [`initialize`](Self::initialize).
    pub fn open_with(
        buffer: impl Into<SharedBuffer>,
        offset: usize,
        options: TableOptions,
    ) -> Result<Self> {
        let mut map = Self::with_options(options);
        map.initialize(buffer, offset)?;
        Ok(map)
    }

    /// Map `path` and decode a table at `offset` in it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be mapped, otherwise see
    /// [`initialize`](Self::initialize).
    pub fn from_file<P: AsRef<Path>>(path: P, offset: usize, options: TableOptions) -> Result<Self> {
        Self::open_with(SharedBuffer::map_file(path)?, offset, options)
    }

    /// Bind this table to the record region at `offset` in `buffer`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The table is already initialized ([`Error::AlreadyInitialized`])
    /// - Fewer than 4 bytes remain at `offset` ([`Error::BufferTooShort`])
    /// - The count prefix is negative ([`Error::InvalidRecordCount`])
    /// - The bytes after the prefix are fewer than the declared count, or,
    ///   under [`RegionCheck::Records`], fewer than the declared records
    ///   ([`Error::BufferTooShort`])
    /// - Order validation is enabled and keys are not strictly increasing
    ///   ([`Error::UnsortedKeys`])
    pub fn initialize(&mut self, buffer: impl Into<SharedBuffer>, offset: usize) -> Result<()> {
        if self.region.is_some() {
            return Err(Error::AlreadyInitialized);
        }

        let region = Region::decode(buffer.into(), offset, self.options)?;
        self.region = Some(Arc::new(region));
        Ok(())
    }

    /// True once [`initialize`](Self::initialize) has succeeded
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.region.is_some()
    }

    /// Options this table was created with
    #[must_use]
    pub fn options(&self) -> TableOptions {
        self.options
    }

    /// The buffer this table borrows from, if initialized
    #[must_use]
    pub fn buffer(&self) -> Option<&SharedBuffer> {
        self.region.as_deref().map(|region| &region.buffer)
    }

    /// Number of addressable records
    #[must_use]
    pub fn len(&self) -> usize {
        self.region.as_deref().map_or(0, Region::len)
    }

    /// True if the table holds no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Record count as written in the prefix.
    ///
    /// Equal to [`len`](Self::len) except under [`RegionCheck::Bytes`] when
    /// the region cannot hold every declared record.
    #[must_use]
    pub fn declared_len(&self) -> usize {
        self.region.as_deref().map_or(0, |region| region.declared)
    }

    /// Record at position `index` in key order
    #[must_use]
    pub fn record(&self, index: usize) -> Option<Record> {
        self.region.as_deref()?.record(index)
    }

    /// All records in key order
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        (0..self.len()).filter_map(|index| self.record(index))
    }

    /// Full record for `key`, or `None` on a miss
    #[must_use]
    pub fn find_record(&self, key: u32) -> Option<Record> {
        self.region.as_deref()?.search(key)
    }

    /// Soft lookup: `(value1, value2)` for `key`, or `None` on a miss
    #[must_use]
    pub fn find(&self, key: u32) -> Option<(u32, u32)> {
        self.find_record(key).map(|record| record.values())
    }

    /// Strict lookup: `(value1, value2)` for `key`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::KeyNotFound`] carrying `key` on a miss.
    pub fn get(&self, key: u32) -> Result<(u32, u32)> {
        self.find(key).ok_or(Error::KeyNotFound(key))
    }

    /// True if `key` is present
    #[must_use]
    pub fn contains_key(&self, key: u32) -> bool {
        self.find_record(key).is_some()
    }

    /// Soft lookup with any integer key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyType`] if `key` does not fit in a `u32`.
    pub fn find_by<K>(&self, key: K) -> Result<Option<(u32, u32)>>
    where
        K: TryInto<u32> + Copy + Display,
    {
        Ok(self.find(key_from(key)?))
    }

    /// Strict lookup with any integer key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidKeyType`] if `key` does not fit in a `u32`,
    /// or [`Error::KeyNotFound`] on a miss.
    pub fn get_by<K>(&self, key: K) -> Result<(u32, u32)>
    where
        K: TryInto<u32> + Copy + Display,
    {
        self.get(key_from(key)?)
    }

    /// Iterate over keys
    #[must_use]
    pub fn iter_keys(&self) -> RecordIter {
        self.iter_projection(Projection::Keys)
    }

    /// Iterate over `(value1, value2)` pairs
    #[must_use]
    pub fn iter_values(&self) -> RecordIter {
        self.iter_projection(Projection::Values)
    }

    /// Iterate over `(key, (value1, value2))` items
    #[must_use]
    pub fn iter_items(&self) -> RecordIter {
        self.iter_projection(Projection::Items)
    }

    /// Iterate over `value1` only
    #[must_use]
    pub fn iter_first_values(&self) -> RecordIter {
        self.iter_projection(Projection::FirstValues)
    }

    /// Iterate over `(key, value1)` pairs
    #[must_use]
    pub fn iter_key_first_values(&self) -> RecordIter {
        self.iter_projection(Projection::KeyFirstValues)
    }

    /// Iterate with an explicit projection
    #[must_use]
    pub fn iter_projection(&self, projection: Projection) -> RecordIter {
        RecordIter::new(self.region.clone(), projection)
    }

    /// Iterate with a raw projection code (see [`Projection::code`]).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIterationMode`] if `code` is not in `0..=4`.
    pub fn iter_special(&self, code: i64) -> Result<RecordIter> {
        Ok(self.iter_projection(Projection::try_from(code)?))
    }
}

impl IntoIterator for &KeyMap {
    type Item = Projected;
    type IntoIter = RecordIter;

    fn into_iter(self) -> RecordIter {
        self.iter_keys()
    }
}
