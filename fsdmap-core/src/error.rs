//! Error type shared by every table, decode and builder operation.

use std::io;
use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while decoding or querying a keyed record buffer
#[derive(Error, Debug)]
pub enum Error {
    /// Not enough bytes for a prefix, a scalar or a declared region.
    ///
    /// `expected` is the declared size where one is known (the record-count
    /// prefix for a table region, the length prefix for a string).
    #[error("{context}: expected {expected} bytes, {available} available")]
    BufferTooShort {
        /// What was being read
        context: &'static str,
        /// Bytes required (or declared by the buffer)
        expected: u64,
        /// Bytes actually present
        available: u64,
    },

    /// Lookup key cannot be represented as an unsigned 32-bit integer
    #[error("key {key} is not an unsigned 32-bit integer")]
    InvalidKeyType {
        /// Rendered form of the rejected key
        key: String,
    },

    /// Strict lookup miss
    #[error("key not found: {0}")]
    KeyNotFound(u32),

    /// Projection selector outside `0..=4`
    #[error("invalid iteration mode: {0}")]
    InvalidIterationMode(i64),

    /// `initialize` called on a table that already holds a buffer
    #[error("table is already initialized")]
    AlreadyInitialized,

    /// Sort-order validation found a key not greater than its predecessor
    #[error("keys out of order at record {index}: {key} follows {previous}")]
    UnsortedKeys {
        /// Record index of the offending key
        index: usize,
        /// Key of the preceding record
        previous: u32,
        /// Offending key
        key: u32,
    },

    /// Count prefix decoded to a negative number
    #[error("invalid record count prefix: {0}")]
    InvalidRecordCount(i32),

    /// Builder received the same key twice
    #[error("duplicate key: {0}")]
    DuplicateKey(u32),

    /// I/O failure while mapping a file-backed buffer
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// True for the expected outcome of a strict lookup miss
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound(_))
    }

    pub(crate) fn too_short(context: &'static str, expected: u64, available: usize) -> Self {
        Self::BufferTooShort { context, expected, available: available as u64 }
    }
}
