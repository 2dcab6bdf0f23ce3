//! FFI bindings for fsdmap keyed record tables
//!
//! This module provides a C-compatible interface to [`fsdmap_core::KeyMap`].
//! All functions are panic-safe and use thread-local error reporting.
//!
//! # Safety Guarantees
//!
//! - No panic may cross the FFI boundary (enforced by `ffi_guard`)
//! - Strict UTF-8 validation for path inputs
//! - Null pointer checks on all pointer arguments
//! - ABI stability via `#[repr(C)]` and `extern "C"`
//!
//! # Error Handling
//!
//! Errors are reported through:
//! - Return values: NULL for constructors, `-1` for lookups and reads
//! - Thread-local error message: `fsdmap_last_error_message()`
//!
//! # Thread Safety
//!
//! Tables are immutable: any number of threads may query the same
//! `FsdKeyMap` concurrently. An `FsdKeyMapIter` is a cursor and must only be
//! advanced by one thread at a time.

use anyhow::Context;
use fsdmap_core::{KeyMap, Projected, RecordIter, TableOptions, decode};
use libc::{c_char, c_int, size_t};
use log::debug;
use std::cell::RefCell;
use std::ffi::{CStr, CString};
use std::ptr;
use std::slice;

/// Opaque handle to a keyed record table (C-compatible)
///
/// C code only sees pointers to this type. The real data is a boxed
/// [`KeyMap`].
#[repr(C)]
pub struct FsdKeyMap {
    _private: [u8; 0],
}

/// Opaque handle to a table iterator (C-compatible)
#[repr(C)]
pub struct FsdKeyMapIter {
    _private: [u8; 0],
}

thread_local! {
    /// Thread-local storage for error messages
    static LAST_ERROR: RefCell<Option<CString>> = const { RefCell::new(None) };
}

/// Set the last error message for the current thread.
///
/// Interior NULs are escaped so reporting itself cannot fail.
fn set_last_error(err: impl std::fmt::Display) {
    LAST_ERROR.with(|cell| {
        let safe_msg = err.to_string().replace('\0', "\\0");
        let c_str = CString::new(safe_msg).unwrap_or_default();
        *cell.borrow_mut() = Some(c_str);
    });
}

/// Clear the last error message for the current thread
fn clear_last_error() {
    LAST_ERROR.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

/// Panic barrier that catches all panics at the FFI boundary.
///
/// Returns `None` on panic after recording the panic message as the
/// thread's last error.
fn ffi_guard<F, R>(f: F) -> Option<R>
where
    F: FnOnce() -> R,
{
    // The operation is abandoned on panic, never resumed.
    match std::panic::catch_unwind(std::panic::AssertUnwindSafe(f)) {
        Ok(result) => Some(result),
        Err(e) => {
            let msg = if let Some(s) = e.downcast_ref::<&str>() {
                format!("Panic: {s}")
            } else if let Some(s) = e.downcast_ref::<String>() {
                format!("Panic: {s}")
            } else {
                "Unknown panic".to_string()
            };
            set_last_error(msg);
            None
        }
    }
}

fn options(validate: c_int) -> TableOptions {
    if validate != 0 { TableOptions::strict() } else { TableOptions::default() }
}

fn into_handle(map: KeyMap) -> *mut FsdKeyMap {
    clear_last_error();
    Box::into_raw(Box::new(map)).cast::<FsdKeyMap>()
}

//
// === LIFECYCLE MANAGEMENT ===
//

/// Decode a table from a caller-owned buffer
///
/// The bytes are copied once into a buffer owned by the table, so `data`
/// may be released as soon as this call returns.
///
/// # Arguments
///
/// - `data`: Pointer to `len` bytes (must not be NULL)
/// - `len`: Buffer length in bytes
/// - `offset`: Byte offset of the count prefix
/// - `validate`: Non-zero to reject unsorted keys and partial regions
///
/// # Returns
///
/// - Non-NULL pointer on success
/// - NULL on failure (check `fsdmap_last_error_message()`)
///
/// # Example (C)
///
/// ```c
/// FsdKeyMap* map = fsdmap_keymap_open(blob, blob_len, 0, 1);
/// if (map == NULL) {
///     fprintf(stderr, "Error: %s\n", fsdmap_last_error_message());
/// }
/// ```
///
/// # Safety
///
/// - `data` must point to `len` readable bytes
/// - Caller must free the returned pointer with `fsdmap_keymap_free()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_keymap_open(
    data: *const u8,
    len: size_t,
    offset: size_t,
    validate: c_int,
) -> *mut FsdKeyMap {
    ffi_guard(|| {
        if data.is_null() {
            set_last_error("Data pointer cannot be NULL");
            return ptr::null_mut();
        }

        // SAFETY: Caller guarantees data points to len readable bytes
        let bytes = unsafe { slice::from_raw_parts(data, len) }.to_vec();

        match KeyMap::open_with(bytes, offset, options(validate)) {
            Ok(map) => into_handle(map),
            Err(e) => {
                set_last_error(e);
                ptr::null_mut()
            }
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// Map a file and decode the table at `offset`
///
/// # Arguments
///
/// - `path`: UTF-8 encoded path (must not be NULL)
/// - `offset`: Byte offset of the count prefix within the file
/// - `validate`: Non-zero to reject unsorted keys and partial regions
///
/// # Returns
///
/// - Non-NULL pointer on success
/// - NULL on failure (check `fsdmap_last_error_message()`)
///
/// # Safety
///
/// - `path` must be a valid, NUL-terminated string
/// - Caller must free the returned pointer with `fsdmap_keymap_free()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_keymap_open_file(
    path: *const c_char,
    offset: size_t,
    validate: c_int,
) -> *mut FsdKeyMap {
    ffi_guard(|| {
        if path.is_null() {
            set_last_error("Path cannot be NULL");
            return ptr::null_mut();
        }

        // SAFETY: Caller guarantees path is valid C string
        let c_path = unsafe { CStr::from_ptr(path) };

        // STRICT UTF-8 CHECK: Do not use to_string_lossy()
        let Ok(path_str) = c_path.to_str() else {
            set_last_error("Path must be valid UTF-8");
            return ptr::null_mut();
        };

        let opened = KeyMap::from_file(path_str, offset, options(validate))
            .with_context(|| format!("Failed to open keymap {path_str} at offset {offset}"));

        match opened {
            Ok(map) => {
                debug!("opened keymap {path_str} with {} records", map.len());
                into_handle(map)
            }
            Err(e) => {
                set_last_error(format!("{e:#}"));
                ptr::null_mut()
            }
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// Free a table
///
/// Iterators created from the table stay valid; the underlying buffer is
/// released once the last of them is freed too.
///
/// # Safety
///
/// - `ptr` must be NULL or a pointer returned by an `fsdmap_keymap_open*`
///   function that has not been freed yet
/// - Safe to call with NULL (no-op)
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_keymap_free(ptr: *mut FsdKeyMap) {
    if !ptr.is_null() {
        ffi_guard(|| {
            // SAFETY: Caller guarantees ptr came from fsdmap_keymap_open*
            let _ = unsafe { Box::from_raw(ptr.cast::<KeyMap>()) };
        });
    }
}

//
// === LOOKUPS ===
//

/// Number of records in the table
///
/// # Returns
///
/// - Record count, or 0 if `ptr` is NULL
///
/// # Safety
///
/// - `ptr` must be NULL or a valid table pointer
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_keymap_len(ptr: *const FsdKeyMap) -> size_t {
    ffi_guard(|| {
        // SAFETY: Caller guarantees ptr is NULL or valid
        let map = unsafe { ptr.cast::<KeyMap>().as_ref() };
        clear_last_error();
        map.map_or(0, KeyMap::len)
    })
    .unwrap_or(0)
}

/// Look up `key`
///
/// `key` is taken as a 64-bit signed integer so C callers can pass any
/// integer; values outside the unsigned 32-bit range are rejected.
///
/// # Returns
///
/// - `1` on a hit (`out_value1` / `out_value2` are written)
/// - `0` on a miss (outputs untouched)
/// - `-1` on error (check `fsdmap_last_error_message()`)
///
/// # Example (C)
///
/// ```c
/// uint32_t v1, v2;
/// switch (fsdmap_keymap_get(map, type_id, &v1, &v2)) {
///     case 1: use(v1, v2); break;
///     case 0: /* absent */ break;
///     default: fprintf(stderr, "%s\n", fsdmap_last_error_message());
/// }
/// ```
///
/// # Safety
///
/// - `ptr` must be a valid table pointer
/// - `out_value1` and `out_value2` must be valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_keymap_get(
    ptr: *const FsdKeyMap,
    key: i64,
    out_value1: *mut u32,
    out_value2: *mut u32,
) -> c_int {
    ffi_guard(|| {
        // SAFETY: Caller guarantees ptr is NULL or valid
        let Some(map) = (unsafe { ptr.cast::<KeyMap>().as_ref() }) else {
            set_last_error("Null keymap pointer");
            return -1;
        };

        if out_value1.is_null() || out_value2.is_null() {
            set_last_error("Null output pointers");
            return -1;
        }

        match map.find_by(key) {
            Ok(Some((value1, value2))) => {
                // SAFETY: Caller guarantees outputs are valid for writes
                unsafe {
                    *out_value1 = value1;
                    *out_value2 = value2;
                }
                clear_last_error();
                1
            }
            Ok(None) => {
                clear_last_error();
                0
            }
            Err(e) => {
                set_last_error(e);
                -1
            }
        }
    })
    .unwrap_or(-1)
}

//
// === ITERATION ===
//

/// Create an iterator over the table
///
/// # Arguments
///
/// - `ptr`: Valid table pointer
/// - `mode`: Projection code: 0 keys, 1 values, 2 items, 3 first values,
///   4 key + first value
///
/// # Returns
///
/// - Non-NULL iterator on success
/// - NULL on failure, including an unknown `mode`
///
/// # Safety
///
/// - `ptr` must be a valid table pointer
/// - Caller must free the iterator with `fsdmap_iter_free()`
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_keymap_iter(
    ptr: *const FsdKeyMap,
    mode: c_int,
) -> *mut FsdKeyMapIter {
    ffi_guard(|| {
        // SAFETY: Caller guarantees ptr is NULL or valid
        let Some(map) = (unsafe { ptr.cast::<KeyMap>().as_ref() }) else {
            set_last_error("Null keymap pointer");
            return ptr::null_mut();
        };

        match map.iter_special(i64::from(mode)) {
            Ok(iter) => {
                clear_last_error();
                Box::into_raw(Box::new(iter)).cast::<FsdKeyMapIter>()
            }
            Err(e) => {
                set_last_error(e);
                ptr::null_mut()
            }
        }
    })
    .unwrap_or(ptr::null_mut())
}

/// Advance an iterator
///
/// Fields the iterator's projection does not carry are written as 0.
///
/// # Returns
///
/// - `1` if a record was produced
/// - `0` when the iterator is exhausted
/// - `-1` on error
///
/// # Safety
///
/// - `iter` must be a valid iterator pointer, not shared across threads
/// - Each output pointer must be NULL or valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_iter_next(
    iter: *mut FsdKeyMapIter,
    out_key: *mut u32,
    out_value1: *mut u32,
    out_value2: *mut u32,
) -> c_int {
    ffi_guard(|| {
        // SAFETY: Caller guarantees iter is NULL or valid and unshared
        let Some(iter) = (unsafe { iter.cast::<RecordIter>().as_mut() }) else {
            set_last_error("Null iterator pointer");
            return -1;
        };

        clear_last_error();
        let Some(projected) = iter.next() else {
            return 0;
        };

        let (key, value1, value2) = match projected {
            Projected::Key(key) => (key, 0, 0),
            Projected::Values(value1, value2) => (0, value1, value2),
            Projected::Item(key, (value1, value2)) => (key, value1, value2),
            Projected::FirstValue(value1) => (0, value1, 0),
            Projected::KeyFirstValue(key, value1) => (key, value1, 0),
        };

        // SAFETY: Caller guarantees non-NULL outputs are valid for writes
        unsafe {
            if !out_key.is_null() {
                *out_key = key;
            }
            if !out_value1.is_null() {
                *out_value1 = value1;
            }
            if !out_value2.is_null() {
                *out_value2 = value2;
            }
        }
        1
    })
    .unwrap_or(-1)
}

/// Free an iterator
///
/// # Safety
///
/// - `iter` must be NULL or a pointer from `fsdmap_keymap_iter()` that has
///   not been freed yet
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_iter_free(iter: *mut FsdKeyMapIter) {
    if !iter.is_null() {
        ffi_guard(|| {
            // SAFETY: Caller guarantees iter came from fsdmap_keymap_iter
            let _ = unsafe { Box::from_raw(iter.cast::<RecordIter>()) };
        });
    }
}

//
// === SCALAR DECODING ===
//

/// # Safety
///
/// Same contract as the exported readers.
unsafe fn read_scalar<T>(
    data: *const u8,
    len: size_t,
    offset: size_t,
    out: *mut T,
    read: fn(&[u8], usize) -> fsdmap_core::Result<T>,
) -> c_int {
    ffi_guard(|| {
        if data.is_null() || out.is_null() {
            set_last_error("Null buffer pointers");
            return -1;
        }

        // SAFETY: Caller guarantees data points to len readable bytes
        let bytes = unsafe { slice::from_raw_parts(data, len) };

        match read(bytes, offset) {
            Ok(value) => {
                // SAFETY: Caller guarantees out is valid for writes
                unsafe { out.write(value) };
                clear_last_error();
                0
            }
            Err(e) => {
                set_last_error(e);
                -1
            }
        }
    })
    .unwrap_or(-1)
}

/// Read a little-endian `uint32_t` at `offset`
///
/// # Returns
///
/// - `0` on success (`out` is written)
/// - `-1` if fewer than 4 bytes remain at `offset`
///
/// # Safety
///
/// - `data` must point to `len` readable bytes
/// - `out` must be valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_read_u32(
    data: *const u8,
    len: size_t,
    offset: size_t,
    out: *mut u32,
) -> c_int {
    // SAFETY: Forwarded caller contract
    unsafe { read_scalar(data, len, offset, out, decode::read_u32) }
}

/// Read a little-endian `int32_t` at `offset`
///
/// Same contract as `fsdmap_read_u32()`.
///
/// # Safety
///
/// - `data` must point to `len` readable bytes
/// - `out` must be valid for writes
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fsdmap_read_i32(
    data: *const u8,
    len: size_t,
    offset: size_t,
    out: *mut i32,
) -> c_int {
    // SAFETY: Forwarded caller contract
    unsafe { read_scalar(data, len, offset, out, decode::read_i32) }
}

//
// === ERROR HANDLING ===
//

/// Get the last error message for the current thread
///
/// # Returns
///
/// - Pointer to NUL-terminated error string
/// - NULL if the last call succeeded
///
/// # Lifetime
///
/// The returned pointer is valid until the next FFI call on this thread.
/// **Do NOT** free the returned pointer.
#[unsafe(no_mangle)]
pub extern "C" fn fsdmap_last_error_message() -> *const c_char {
    LAST_ERROR.with(|cell| cell.borrow().as_ref().map_or(ptr::null(), |s| s.as_ptr()))
}

//
// === VERSIONING ===
//

/// Get the library version
///
/// The returned pointer is valid for the lifetime of the program.
/// **Do NOT** free the returned pointer.
#[unsafe(no_mangle)]
pub extern "C" fn fsdmap_version() -> *const c_char {
    // concat! appends the NUL terminator required by C.
    static VERSION: &str = concat!(env!("CARGO_PKG_VERSION"), "\0");

    VERSION.as_ptr().cast::<c_char>()
}

//
// === TESTS ===
//
