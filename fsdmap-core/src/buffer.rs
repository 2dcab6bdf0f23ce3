//! Shared, immutable byte buffers that tables borrow from.
//!
//! A [`KeyMap`](crate::KeyMap) never copies the bytes it decodes. Instead it
//! holds a [`SharedBuffer`], a reference-counted handle to whatever owns the
//! memory. The backing store is released when the last table, iterator or
//! caller handle drops.

use crate::error::Result;
use fs2::FileExt;
use log::debug;
use memmap2::Mmap;
use std::fmt;
use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

/// Anything that can be read as one contiguous, immutable byte range.
///
/// Implementors must return the same bytes for their whole lifetime.
pub trait BufferSource: Send + Sync {
    /// The full contents of the buffer
    fn as_bytes(&self) -> &[u8];
}

impl BufferSource for Vec<u8> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for Box<[u8]> {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for &'static [u8] {
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl BufferSource for String {
    fn as_bytes(&self) -> &[u8] {
        str::as_bytes(self)
    }
}

/// Read-only memory map of a file.
///
/// Holds a shared advisory lock so cooperating writers cannot rewrite the
/// file while tables point into the mapping.
#[derive(Debug)]
pub struct MappedFile {
    /// File handle (owns the shared lock)
    file: File,

    /// Memory-mapped view of the file
    mmap: Mmap,
}

impl MappedFile {
    /// Maps `path` read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be opened
    /// - The file is exclusively locked by another process
    /// - The mapping fails
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = OpenOptions::new().read(true).open(path)?;
        FileExt::try_lock_shared(&file)?;

        // SAFETY: the mapping is read-only and the shared lock keeps
        // cooperating writers out for as long as `self` lives.
        let mmap = unsafe { Mmap::map(&file)? };

        debug!("mapped {} ({} bytes)", path.display(), mmap.len());
        Ok(Self { file, mmap })
    }

    /// Length of the mapping in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    /// True if the mapped file is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}

impl BufferSource for MappedFile {
    fn as_bytes(&self) -> &[u8] {
        &self.mmap
    }
}

impl Drop for MappedFile {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

/// Reference-counted handle to an immutable byte buffer.
///
/// Cloning is a reference-count bump; the bytes are never copied.
#[derive(Clone)]
pub struct SharedBuffer {
    inner: Arc<dyn BufferSource>,
}

impl SharedBuffer {
    /// Wraps any buffer source
    pub fn new<S: BufferSource + 'static>(source: S) -> Self {
        Self { inner: Arc::new(source) }
    }

    /// Maps a file and wraps the mapping.
    ///
    /// # Errors
    ///
    /// Same as [`MappedFile::open`].
    pub fn map_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(MappedFile::open(path)?))
    }

    /// The full contents of the buffer
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.inner.as_bytes()
    }

    /// Total length in bytes
    #[must_use]
    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    /// True if the buffer holds no bytes
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.as_bytes().is_empty()
    }

    /// Bytes in `start..end`, or `None` if the range leaves the buffer
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> Option<&[u8]> {
        self.as_bytes().get(start..end)
    }

    /// Number of live handles (tables, iterators and callers) on this buffer
    #[must_use]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl fmt::Debug for SharedBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedBuffer").field("len", &self.len()).finish()
    }
}

impl From<Vec<u8>> for SharedBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl From<Box<[u8]>> for SharedBuffer {
    fn from(bytes: Box<[u8]>) -> Self {
        Self::new(bytes)
    }
}

impl From<&'static [u8]> for SharedBuffer {
    fn from(bytes: &'static [u8]) -> Self {
        Self::new(bytes)
    }
}

impl From<String> for SharedBuffer {
    fn from(bytes: String) -> Self {
        Self::new(bytes)
    }
}

impl From<MappedFile> for SharedBuffer {
    fn from(file: MappedFile) -> Self {
        Self::new(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_bounds() {
        let buffer = SharedBuffer::from(vec![1u8, 2, 3, 4]);
        assert_eq!(buffer.len(), 4);
        assert_eq!(buffer.slice(1, 3), Some(&[2u8, 3][..]));
        assert_eq!(buffer.slice(2, 5), None);
        assert_eq!(buffer.slice(3, 2), None);
    }

    #[test]
    fn test_clone_shares_bytes() {
        let buffer = SharedBuffer::from(vec![9u8; 16]);
        let other = buffer.clone();

        assert_eq!(buffer.strong_count(), 2);
        assert!(std::ptr::eq(buffer.as_bytes().as_ptr(), other.as_bytes().as_ptr()));

        drop(other);
        assert_eq!(buffer.strong_count(), 1);
    }

    #[test]
    fn test_static_source() {
        static BYTES: [u8; 3] = [7, 8, 9];
        let buffer = SharedBuffer::from(&BYTES[..]);
        assert_eq!(buffer.as_bytes(), &[7, 8, 9]);
        assert!(!buffer.is_empty());
    }
}
