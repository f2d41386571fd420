// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The storage layer: a byte-addressable, append-growable arena with typed
//! read/write primitives.
//!
//! Everything above this layer — node layout, the Ukkonen builder, the
//! query surface — talks to the arena only through [`StorageProvider`]. It
//! never assumes the bytes live on the heap or in a mapped file; that's the
//! whole point of the abstraction.
//!
//! Two implementations ship here: [`heap::HeapStorage`] (a growable
//! `Vec<u8>`) and [`file::FileStorage`] / [`file::ReadOnlyFileStorage`]
//! (memory-mapped, growable via `set_len` + remap). Both honor the same
//! disposal contract: after `dispose()`, every method returns
//! [`SfxError::Disposed`], disposal is idempotent, and concurrent disposal
//! races with readers never fault (see each impl's module docs for how).

pub mod file;
pub mod heap;

use crate::error::{Result, SfxError};

/// Minimum growth floor. A pure doubling rule stalls forever starting from
/// zero capacity, so every `ensure_capacity` implementation grows by
/// `max(current * 2, GROWTH_FLOOR)`.
pub const GROWTH_FLOOR: i64 = 16;

/// Byte-addressable, append-growable arena with explicit typed primitives.
///
/// `size()` is always the *logical* length in use; it is never the
/// underlying physical capacity, which may be larger after growth or after
/// `trim_to_size()` has not yet run.
pub trait StorageProvider: Send + Sync {
    /// Logical bytes in use.
    fn size(&self) -> Result<i64>;

    /// Reserve `n` bytes at the current tail and return the starting
    /// offset. Fails with `InvalidArgument` if `n < 0`. On expansion
    /// failure the logical size must not have advanced.
    fn allocate(&self, n: i64) -> Result<i64>;

    /// Ensure physical capacity is at least `c`, growing by doubling with a
    /// [`GROWTH_FLOOR`] floor if needed. A no-op if already large enough.
    fn ensure_capacity(&self, c: i64) -> Result<()>;

    /// Shrink physical capacity down to `size()`. File-backed providers must
    /// preserve the data while doing so.
    fn trim_to_size(&self) -> Result<()>;

    fn read_i32(&self, offset: i64) -> Result<i32>;
    fn read_u32(&self, offset: i64) -> Result<u32>;
    fn read_i64(&self, offset: i64) -> Result<i64>;
    /// Reads a single UTF-16 code unit (as its raw `u16` value).
    fn read_char(&self, offset: i64) -> Result<u16>;
    fn read_bytes(&self, offset: i64, len: usize) -> Result<Vec<u8>>;

    fn write_i32(&self, offset: i64, value: i32) -> Result<()>;
    fn write_u32(&self, offset: i64, value: u32) -> Result<()>;
    fn write_i64(&self, offset: i64, value: i64) -> Result<()>;
    fn write_char(&self, offset: i64, value: u16) -> Result<()>;
    fn write_bytes(&self, offset: i64, bytes: &[u8]) -> Result<()>;

    fn is_read_only(&self) -> bool;

    /// Release underlying resources. Idempotent; safe to call concurrently
    /// from multiple threads.
    fn dispose(&self);

    fn is_disposed(&self) -> bool;
}

/// Shared bookkeeping every impl uses to validate bounds and disposal before
/// touching its own bytes. Not part of the trait so impls stay free to
/// represent their own storage however they like, but both provided impls
/// delegate their argument checks here to keep the checks identical.
pub(crate) fn check_read_bounds(size: i64, offset: i64, len: i64) -> Result<()> {
    if offset < 0 || len < 0 {
        return Err(SfxError::out_of_range(format!(
            "negative offset or length (offset={offset}, len={len})"
        )));
    }
    let end = offset
        .checked_add(len)
        .ok_or_else(|| SfxError::out_of_range("offset + len overflowed"))?;
    if end > size {
        return Err(SfxError::out_of_range(format!(
            "read [{offset}, {end}) crosses logical size {size}"
        )));
    }
    Ok(())
}

pub(crate) fn check_write_bounds(size: i64, offset: i64, len: i64) -> Result<()> {
    check_read_bounds(size, offset, len)
}

pub(crate) fn next_capacity(current: i64, required: i64) -> i64 {
    let mut cap = current.max(GROWTH_FLOOR);
    while cap < required {
        cap = (cap * 2).max(GROWTH_FLOOR);
    }
    cap
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_capacity_never_stalls_from_zero() {
        assert_eq!(next_capacity(0, 1), GROWTH_FLOOR);
        assert_eq!(next_capacity(0, 0), GROWTH_FLOOR);
    }

    #[test]
    fn next_capacity_doubles() {
        assert_eq!(next_capacity(16, 17), 32);
        assert_eq!(next_capacity(16, 100), 128);
    }

    #[test]
    fn read_bounds_reject_negative_and_overflow() {
        assert!(check_read_bounds(100, -1, 4).is_err());
        assert!(check_read_bounds(100, 50, i64::MAX).is_err());
        assert!(check_read_bounds(100, 96, 4).is_ok());
        assert!(check_read_bounds(100, 97, 4).is_err());
    }
}
