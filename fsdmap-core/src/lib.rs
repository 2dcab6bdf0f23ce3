//! fsdmap - Zero-copy keyed record tables for FileStaticData buffers
//!
//! FileStaticData (FSD) blobs store indices as a flat run of fixed-width
//! `(key, value1, value2)` records behind a 4-byte count prefix. This crate
//! decodes those regions in place: a [`KeyMap`] binary searches the bytes
//! it was given and never copies them.
//!
//! # Features
//!
//! - Zero-copy lookups over any shared byte buffer, including read-only
//!   memory maps
//! - Soft ([`KeyMap::find`]) and strict ([`KeyMap::get`]) lookups
//! - Five iteration projections over the same records
//! - Bounds-checked decoding of untrusted or truncated input
//! - Optional sort-order validation at construction
//!
//! # Example
//!
//! ```
//! use fsdmap_core::{KeyMap, Projected};
//!
//! # fn main() -> anyhow::Result<()> {
//! // count = 2, then (1, 10, 20) and (5, 30, 40)
//! let mut bytes = 2i32.to_le_bytes().to_vec();
//! for word in [1u32, 10, 20, 5, 30, 40] {
//!     bytes.extend_from_slice(&word.to_le_bytes());
//! }
//!
//! let map = KeyMap::from_buffer(bytes, 0)?;
//! assert_eq!(map.get(5)?, (30, 40));
//!
//! let keys: Vec<_> = map.iter_keys().collect();
//! assert_eq!(keys, [Projected::Key(1), Projected::Key(5)]);
//! # Ok(())
//! # }
//! ```
//!
//! # Design Philosophy
//!
//! Tables are immutable once initialized. Loading blobs from disk or the
//! network, and turning value words into rich objects, is left to the
//! application layer. The buffer is shared by reference count: it lives as
//! long as its longest holder, whether that is the caller, a table or an
//! iterator.

mod buffer;
pub mod decode;
mod error;
mod iter;
mod table;

mod builder;

#[cfg(feature = "internals")]
pub mod layout;
#[cfg(not(feature = "internals"))]
pub(crate) mod layout;

pub use buffer::{BufferSource, MappedFile, SharedBuffer};
pub use builder::KeyMapBuilder;
pub use error::{Error, Result};
pub use iter::{Projected, Projection, RecordIter};
pub use layout::{PREFIX_SIZE, RECORD_SIZE, Record};
pub use table::{KeyMap, key_from};

/// How the declared record count is checked against the bytes present
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegionCheck {
    /// Require room for every declared record (`N * 12` bytes)
    #[default]
    Records,

    /// Only require `N` bytes, as legacy readers did.
    ///
    /// A region that passes this check may still be too short for `N`
    /// records; the table then exposes only the records that fit.
    Bytes,
}

/// Configuration options for [`KeyMap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TableOptions {
    /// Region length check applied at initialization
    pub region_check: RegionCheck,

    /// Scan keys once at initialization and reject unsorted or duplicate
    /// keys with [`Error::UnsortedKeys`]
    pub validate_order: bool,
}

impl TableOptions {
    /// Options that verify everything the format allows verifying
    #[must_use]
    pub const fn strict() -> Self {
        Self { region_check: RegionCheck::Records, validate_order: true }
    }
}
