// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`StorageProvider`]: a growable byte buffer behind a
//! `RwLock`, for building and querying trees that never touch disk.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{check_read_bounds, check_write_bounds, next_capacity, StorageProvider};
use crate::error::{Result, SfxError};

/// Heap-backed arena. `size` is the logical length; the `Vec`'s own
/// capacity tracks physical capacity and may run ahead of it.
pub struct HeapStorage {
    bytes: RwLock<Vec<u8>>,
    size: std::sync::atomic::AtomicI64,
    disposed: AtomicBool,
    read_only: bool,
}

impl HeapStorage {
    pub fn new() -> Self {
        Self::with_capacity(super::GROWTH_FLOOR)
    }

    pub fn with_capacity(initial: i64) -> Self {
        let cap = initial.max(0) as usize;
        Self {
            bytes: RwLock::new(vec![0u8; cap]),
            size: std::sync::atomic::AtomicI64::new(0),
            disposed: AtomicBool::new(false),
            read_only: false,
        }
    }

    /// Wrap an already-built byte buffer as a read-only provider (used when
    /// a [`crate::builder::Builder`] hands its finished arena straight to a
    /// [`crate::tree::Tree`] without going through a file at all).
    pub fn from_built(bytes: Vec<u8>) -> Self {
        let len = bytes.len() as i64;
        Self {
            bytes: RwLock::new(bytes),
            size: std::sync::atomic::AtomicI64::new(len),
            disposed: AtomicBool::new(false),
            read_only: true,
        }
    }

    fn check_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(SfxError::Disposed)
        } else {
            Ok(())
        }
    }
}

impl Default for HeapStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageProvider for HeapStorage {
    fn size(&self) -> Result<i64> {
        self.check_disposed()?;
        Ok(self.size.load(Ordering::Acquire))
    }

    fn allocate(&self, n: i64) -> Result<i64> {
        self.check_disposed()?;
        if n < 0 {
            return Err(SfxError::invalid_argument(format!(
                "allocate: negative size {n}"
            )));
        }
        if self.read_only {
            return Err(SfxError::invalid_state("allocate on read-only storage"));
        }
        let start = self.size.load(Ordering::Acquire);
        let end = start
            .checked_add(n)
            .ok_or_else(|| SfxError::out_of_range("allocate overflowed logical size"))?;
        self.ensure_capacity(end)?;
        self.size.store(end, Ordering::Release);
        Ok(start)
    }

    fn ensure_capacity(&self, c: i64) -> Result<()> {
        self.check_disposed()?;
        let mut guard = self.bytes.write().unwrap();
        if (guard.len() as i64) < c {
            let new_cap = next_capacity(guard.len() as i64, c);
            guard.resize(new_cap as usize, 0);
        }
        Ok(())
    }

    fn trim_to_size(&self) -> Result<()> {
        self.check_disposed()?;
        let size = self.size.load(Ordering::Acquire) as usize;
        let mut guard = self.bytes.write().unwrap();
        guard.truncate(size);
        guard.shrink_to_fit();
        Ok(())
    }

    fn read_i32(&self, offset: i64) -> Result<i32> {
        let mut buf = [0u8; 4];
        self.read_into(offset, &mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    fn read_u32(&self, offset: i64) -> Result<u32> {
        let mut buf = [0u8; 4];
        self.read_into(offset, &mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    fn read_i64(&self, offset: i64) -> Result<i64> {
        let mut buf = [0u8; 8];
        self.read_into(offset, &mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    fn read_char(&self, offset: i64) -> Result<u16> {
        let mut buf = [0u8; 2];
        self.read_into(offset, &mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    fn read_bytes(&self, offset: i64, len: usize) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len];
        self.read_into(offset, &mut out)?;
        Ok(out)
    }

    fn write_i32(&self, offset: i64, value: i32) -> Result<()> {
        self.write_slice(offset, &value.to_le_bytes())
    }

    fn write_u32(&self, offset: i64, value: u32) -> Result<()> {
        self.write_slice(offset, &value.to_le_bytes())
    }

    fn write_i64(&self, offset: i64, value: i64) -> Result<()> {
        self.write_slice(offset, &value.to_le_bytes())
    }

    fn write_char(&self, offset: i64, value: u16) -> Result<()> {
        self.write_slice(offset, &value.to_le_bytes())
    }

    fn write_bytes(&self, offset: i64, bytes: &[u8]) -> Result<()> {
        self.write_slice(offset, bytes)
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        if let Ok(mut guard) = self.bytes.write() {
            guard.clear();
            guard.shrink_to_fit();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl HeapStorage {
    fn read_into(&self, offset: i64, buf: &mut [u8]) -> Result<()> {
        self.check_disposed()?;
        let size = self.size.load(Ordering::Acquire);
        check_read_bounds(size, offset, buf.len() as i64)?;
        let guard = self.bytes.read().unwrap();
        buf.copy_from_slice(&guard[offset as usize..offset as usize + buf.len()]);
        Ok(())
    }

    fn write_slice(&self, offset: i64, bytes: &[u8]) -> Result<()> {
        self.check_disposed()?;
        if self.read_only {
            return Err(SfxError::invalid_state("write on read-only storage"));
        }
        let size = self.size.load(Ordering::Acquire);
        check_write_bounds(size, offset, bytes.len() as i64)?;
        let mut guard = self.bytes.write().unwrap();
        guard[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_then_roundtrip() {
        let s = HeapStorage::new();
        let off = s.allocate(4).unwrap();
        assert_eq!(off, 0);
        s.write_i32(off, 42).unwrap();
        assert_eq!(s.read_i32(off).unwrap(), 42);
        assert_eq!(s.size().unwrap(), 4);
    }

    #[test]
    fn allocate_rejects_negative() {
        let s = HeapStorage::new();
        assert!(matches!(
            s.allocate(-1),
            Err(SfxError::InvalidArgument(_))
        ));
    }

    #[test]
    fn reads_past_size_fail() {
        let s = HeapStorage::new();
        s.allocate(4).unwrap();
        assert!(matches!(s.read_i32(4), Err(SfxError::OutOfRange(_))));
    }

    #[test]
    fn write_to_read_only_fails() {
        let s = HeapStorage::from_built(vec![0u8; 8]);
        assert!(matches!(
            s.write_i32(0, 1),
            Err(SfxError::InvalidState(_))
        ));
    }

    #[test]
    fn dispose_is_idempotent_and_blocks_further_use() {
        let s = HeapStorage::new();
        s.allocate(4).unwrap();
        s.dispose();
        s.dispose();
        assert!(matches!(s.size(), Err(SfxError::Disposed)));
    }

    #[test]
    fn concurrent_dispose_never_faults() {
        use std::sync::Arc;
        let s = Arc::new(HeapStorage::new());
        s.allocate(64).unwrap();
        let mut handles = Vec::new();
        for _ in 0..4 {
            let s = Arc::clone(&s);
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    s.dispose();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(s.is_disposed());
    }

    #[test]
    fn growth_never_stalls_from_zero_capacity() {
        let s = HeapStorage::with_capacity(0);
        let off = s.allocate(1).unwrap();
        assert_eq!(off, 0);
        assert_eq!(s.size().unwrap(), 1);
    }
}
