//! Single-pass cursors over a [`KeyMap`](crate::KeyMap).
//!
//! A [`RecordIter`] walks the table's region record by record and yields one
//! of five projections of each record. The projection is fixed when the
//! iterator is created, so an invalid mode is rejected up front instead of
//! on every call to `next`.

use crate::error::{Error, Result};
use crate::layout::Record;
use crate::table::Region;
use std::iter::FusedIterator;
use std::sync::Arc;

/// Which fields of each record an iterator yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projection {
    /// `key`
    Keys,
    /// `(value1, value2)`
    Values,
    /// `(key, (value1, value2))`
    Items,
    /// `value1`
    FirstValues,
    /// `(key, value1)`
    KeyFirstValues,
}

impl Projection {
    /// Every projection, in code order
    pub const ALL: [Self; 5] =
        [Self::Keys, Self::Values, Self::Items, Self::FirstValues, Self::KeyFirstValues];

    /// Stable numeric selector (`0..=4`) used by foreign callers
    #[must_use]
    pub const fn code(self) -> i64 {
        match self {
            Self::Keys => 0,
            Self::Values => 1,
            Self::Items => 2,
            Self::FirstValues => 3,
            Self::KeyFirstValues => 4,
        }
    }

    /// Project one record
    #[must_use]
    pub const fn apply(self, record: Record) -> Projected {
        let Record { key, value1, value2 } = record;
        match self {
            Self::Keys => Projected::Key(key),
            Self::Values => Projected::Values(value1, value2),
            Self::Items => Projected::Item(key, (value1, value2)),
            Self::FirstValues => Projected::FirstValue(value1),
            Self::KeyFirstValues => Projected::KeyFirstValue(key, value1),
        }
    }
}

impl TryFrom<i64> for Projection {
    type Error = Error;

    fn try_from(code: i64) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|projection| projection.code() == code)
            .ok_or(Error::InvalidIterationMode(code))
    }
}

/// One projected record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Projected {
    /// [`Projection::Keys`]
    Key(u32),
    /// [`Projection::Values`]
    Values(u32, u32),
    /// [`Projection::Items`]
    Item(u32, (u32, u32)),
    /// [`Projection::FirstValues`]
    FirstValue(u32),
    /// [`Projection::KeyFirstValues`]
    KeyFirstValue(u32, u32),
}

impl Projected {
    /// The key, if this projection carries one
    #[must_use]
    pub const fn key(&self) -> Option<u32> {
        match *self {
            Self::Key(key) | Self::Item(key, _) | Self::KeyFirstValue(key, _) => Some(key),
            Self::Values(..) | Self::FirstValue(_) => None,
        }
    }

    /// The `(value1, value2)` pair, if this projection carries both values
    #[must_use]
    pub const fn values(&self) -> Option<(u32, u32)> {
        match *self {
            Self::Values(value1, value2) | Self::Item(_, (value1, value2)) => Some((value1, value2)),
            Self::Key(_) | Self::FirstValue(_) | Self::KeyFirstValue(..) => None,
        }
    }

    /// `value1`, if this projection carries it
    #[must_use]
    pub const fn first_value(&self) -> Option<u32> {
        match *self {
            Self::Values(value1, _)
            | Self::Item(_, (value1, _))
            | Self::FirstValue(value1)
            | Self::KeyFirstValue(_, value1) => Some(value1),
            Self::Key(_) => None,
        }
    }
}

/// Cursor over a table's records.
///
/// Holds a shared reference to the table's region, so it stays valid after
/// the [`KeyMap`](crate::KeyMap) it came from is dropped. Never mutates the
/// table and cannot be rewound.
#[derive(Debug, Clone)]
pub struct RecordIter {
    region: Option<Arc<Region>>,
    projection: Projection,

    /// Next record position
    index: usize,
}

impl RecordIter {
    pub(crate) fn new(region: Option<Arc<Region>>, projection: Projection) -> Self {
        Self { region, projection, index: 0 }
    }

    /// Projection this iterator yields
    #[must_use]
    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Position of the next record to be yielded
    #[must_use]
    pub fn position(&self) -> usize {
        self.index
    }

    fn total(&self) -> usize {
        self.region.as_deref().map_or(0, Region::len)
    }
}

impl Iterator for RecordIter {
    type Item = Projected;

    fn next(&mut self) -> Option<Projected> {
        let record = self.region.as_deref()?.record(self.index)?;
        self.index += 1;
        Some(self.projection.apply(record))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.total().saturating_sub(self.index);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for RecordIter {}

impl FusedIterator for RecordIter {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{KeyMap, KeyMapBuilder};

    fn sample() -> KeyMap {
        let mut builder = KeyMapBuilder::new();
        builder.insert(1, 10, 20).unwrap();
        builder.insert(5, 30, 40).unwrap();
        builder.build_map().unwrap()
    }

    #[test]
    fn test_projection_codes() {
        for projection in Projection::ALL {
            assert_eq!(Projection::try_from(projection.code()).unwrap(), projection);
        }
        assert!(matches!(Projection::try_from(5), Err(Error::InvalidIterationMode(5))));
        assert!(matches!(Projection::try_from(-1), Err(Error::InvalidIterationMode(-1))));
    }

    #[test]
    fn test_each_projection() {
        let map = sample();

        let keys: Vec<_> = map.iter_keys().collect();
        assert_eq!(keys, [Projected::Key(1), Projected::Key(5)]);

        let values: Vec<_> = map.iter_values().collect();
        assert_eq!(values, [Projected::Values(10, 20), Projected::Values(30, 40)]);

        let items: Vec<_> = map.iter_items().collect();
        assert_eq!(items, [Projected::Item(1, (10, 20)), Projected::Item(5, (30, 40))]);

        let firsts: Vec<_> = map.iter_first_values().collect();
        assert_eq!(firsts, [Projected::FirstValue(10), Projected::FirstValue(30)]);

        let pairs: Vec<_> = map.iter_key_first_values().collect();
        assert_eq!(pairs, [Projected::KeyFirstValue(1, 10), Projected::KeyFirstValue(5, 30)]);
    }

    #[test]
    fn test_cursor_advances_and_stays_exhausted() {
        let map = sample();
        let mut iter = map.iter_keys();

        assert_eq!(iter.len(), 2);
        assert_eq!(iter.next(), Some(Projected::Key(1)));
        assert_eq!(iter.position(), 1);
        assert_eq!(iter.len(), 1);
        assert_eq!(iter.next(), Some(Projected::Key(5)));
        assert_eq!(iter.next(), None);
        assert_eq!(iter.next(), None);
        assert_eq!(iter.position(), 2);
    }

    #[test]
    fn test_iter_special() {
        let map = sample();

        let iter = map.iter_special(2).unwrap();
        assert_eq!(iter.projection(), Projection::Items);

        assert!(matches!(map.iter_special(9), Err(Error::InvalidIterationMode(9))));
    }

    #[test]
    fn test_default_iteration_is_keys() {
        let map = sample();
        let keys: Vec<u32> = (&map).into_iter().filter_map(|p| p.key()).collect();
        assert_eq!(keys, [1, 5]);
    }

    #[test]
    fn test_uninitialized_iteration() {
        let map = KeyMap::new();
        assert_eq!(map.iter_items().count(), 0);
    }

    #[test]
    fn test_projected_accessors() {
        let item = Projected::Item(3, (4, 5));
        assert_eq!(item.key(), Some(3));
        assert_eq!(item.values(), Some((4, 5)));
        assert_eq!(item.first_value(), Some(4));

        assert_eq!(Projected::FirstValue(9).key(), None);
        assert_eq!(Projected::KeyFirstValue(1, 2).values(), None);
        assert_eq!(Projected::Key(1).first_value(), None);
    }
}
