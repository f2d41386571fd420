// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! File-backed [`StorageProvider`] implementations.
//!
//! [`FileStorage`] is writable and growable: the builder allocates into it,
//! the file is `set_len`'d and remapped whenever physical capacity runs out.
//! [`ReadOnlyFileStorage`] is what `Factory::load` hands back: a read-only
//! `mmap` shared across reader threads behind an `Arc`, so that concurrent
//! `dispose()` can never race a reader into a use-after-free — every read
//! clones the `Arc` into a local before touching a byte (see `snapshot`
//! below), exactly the TOCTOU discipline the format's concurrency model
//! requires, without needing a lock held across the actual byte access.

use std::fs::{File, OpenOptions};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use memmap2::{Mmap, MmapMut};

use super::{check_read_bounds, check_write_bounds, next_capacity, StorageProvider};
use crate::error::{Result, SfxError};

/// Writable, growable, file-backed arena used while building.
pub struct FileStorage {
    file: Mutex<File>,
    map: Mutex<Option<MmapMut>>,
    capacity: AtomicI64,
    size: AtomicI64,
    disposed: AtomicBool,
}

impl FileStorage {
    /// Create (or truncate) the file at `path` and map an initial region.
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let initial = super::GROWTH_FLOOR;
        file.set_len(initial as u64)?;
        let map = map_mut(&file)?;
        Ok(Self {
            file: Mutex::new(file),
            map: Mutex::new(Some(map)),
            capacity: AtomicI64::new(initial),
            size: AtomicI64::new(0),
            disposed: AtomicBool::new(false),
        })
    }

    fn check_disposed(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            Err(SfxError::Disposed)
        } else {
            Ok(())
        }
    }

    fn with_map<R>(&self, f: impl FnOnce(&MmapMut) -> R) -> Result<R> {
        self.check_disposed()?;
        let guard = self.map.lock().unwrap();
        let m = guard.as_ref().ok_or(SfxError::Disposed)?;
        Ok(f(m))
    }

    fn with_map_mut<R>(&self, f: impl FnOnce(&mut MmapMut) -> R) -> Result<R> {
        self.check_disposed()?;
        let mut guard = self.map.lock().unwrap();
        let m = guard.as_mut().ok_or(SfxError::Disposed)?;
        Ok(f(m))
    }

    /// Consume self, returning the underlying file so a loader can re-open
    /// it read-only via [`ReadOnlyFileStorage::open`].
    pub fn into_file(self) -> Result<File> {
        self.check_disposed()?;
        drop(self.map.lock().unwrap().take());
        Ok(self.file.into_inner().unwrap())
    }
}

impl StorageProvider for FileStorage {
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
        if self.capacity.load(Ordering::Acquire) >= c {
            return Ok(());
        }
        let new_cap = next_capacity(self.capacity.load(Ordering::Acquire), c);
        let file = self.file.lock().unwrap();
        file.set_len(new_cap as u64)?;
        let new_map = map_mut(&file)?;
        *self.map.lock().unwrap() = Some(new_map);
        self.capacity.store(new_cap, Ordering::Release);
        Ok(())
    }

    fn trim_to_size(&self) -> Result<()> {
        self.check_disposed()?;
        let size = self.size.load(Ordering::Acquire);
        let file = self.file.lock().unwrap();
        file.set_len(size as u64)?;
        file.sync_all()?;
        let new_map = if size > 0 {
            Some(map_mut(&file)?)
        } else {
            None
        };
        *self.map.lock().unwrap() = new_map;
        self.capacity.store(size, Ordering::Release);
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
        false
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        if let Ok(mut guard) = self.map.lock() {
            guard.take();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

impl FileStorage {
    fn read_into(&self, offset: i64, buf: &mut [u8]) -> Result<()> {
        let size = self.size.load(Ordering::Acquire);
        check_read_bounds(size, offset, buf.len() as i64)?;
        self.with_map(|m| {
            buf.copy_from_slice(&m[offset as usize..offset as usize + buf.len()]);
        })
    }

    fn write_slice(&self, offset: i64, bytes: &[u8]) -> Result<()> {
        let size = self.size.load(Ordering::Acquire);
        check_write_bounds(size, offset, bytes.len() as i64)?;
        self.with_map_mut(|m| {
            m[offset as usize..offset as usize + bytes.len()].copy_from_slice(bytes);
        })
    }
}

/// Read-only, memory-mapped arena handed back by `Factory::load`.
///
/// Shared across reader threads behind an `Arc<Mmap>`; see the module docs
/// for the disposal discipline.
pub struct ReadOnlyFileStorage {
    map: Mutex<Option<Arc<Mmap>>>,
    size: i64,
    disposed: AtomicBool,
}

impl ReadOnlyFileStorage {
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).open(path)?;
        let size = file.metadata()?.len() as i64;
        let map = if size > 0 {
            Some(Arc::new(map_ro(&file)?))
        } else {
            None
        };
        Ok(Self {
            map: Mutex::new(map),
            size,
            disposed: AtomicBool::new(false),
        })
    }

    /// Take ownership of an already-open file (used when the builder wrote
    /// directly to the destination and the factory re-opens it read-only
    /// without a second path lookup).
    pub fn from_file(file: File) -> Result<Self> {
        let size = file.metadata()?.len() as i64;
        let map = if size > 0 {
            Some(Arc::new(map_ro(&file)?))
        } else {
            None
        };
        Ok(Self {
            map: Mutex::new(map),
            size,
            disposed: AtomicBool::new(false),
        })
    }

    /// Snapshot the current mapping into a local `Arc`, the TOCTOU-safe
    /// pattern: once cloned, the mapping stays alive for this reader even
    /// if another thread disposes concurrently.
    fn snapshot(&self) -> Result<Arc<Mmap>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        let guard = self.map.lock().unwrap();
        guard.clone().ok_or(SfxError::Disposed)
    }

    fn read_into(&self, offset: i64, buf: &mut [u8]) -> Result<()> {
        check_read_bounds(self.size, offset, buf.len() as i64)?;
        let m = self.snapshot()?;
        buf.copy_from_slice(&m[offset as usize..offset as usize + buf.len()]);
        Ok(())
    }
}

impl StorageProvider for ReadOnlyFileStorage {
    fn size(&self) -> Result<i64> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        Ok(self.size)
    }

    fn allocate(&self, _n: i64) -> Result<i64> {
        Err(SfxError::invalid_state("allocate on read-only storage"))
    }

    fn ensure_capacity(&self, _c: i64) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        Ok(())
    }

    fn trim_to_size(&self) -> Result<()> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
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

    fn write_i32(&self, _offset: i64, _value: i32) -> Result<()> {
        Err(SfxError::invalid_state("write on read-only storage"))
    }

    fn write_u32(&self, _offset: i64, _value: u32) -> Result<()> {
        Err(SfxError::invalid_state("write on read-only storage"))
    }

    fn write_i64(&self, _offset: i64, _value: i64) -> Result<()> {
        Err(SfxError::invalid_state("write on read-only storage"))
    }

    fn write_char(&self, _offset: i64, _value: u16) -> Result<()> {
        Err(SfxError::invalid_state("write on read-only storage"))
    }

    fn write_bytes(&self, _offset: i64, _bytes: &[u8]) -> Result<()> {
        Err(SfxError::invalid_state("write on read-only storage"))
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        if let Ok(mut guard) = self.map.lock() {
            guard.take();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}

/// The only two places this crate calls into `unsafe`: mapping a file is
/// unsafe because the OS gives no guarantee another process won't mutate
/// the backing file concurrently (that would be a data race visible as
/// normal Rust memory, which `mmap` cannot prevent). We accept that like
/// every other mmap-based store does; nothing above this line is unsafe.
#[allow(unsafe_code)]
fn map_mut(file: &File) -> Result<MmapMut> {
    unsafe { MmapMut::map_mut(file).map_err(|e| SfxError::IoFailure(e.to_string())) }
}

#[allow(unsafe_code)]
fn map_ro(file: &File) -> Result<Mmap> {
    unsafe { Mmap::map(file).map_err(|e| SfxError::IoFailure(e.to_string())) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn create_allocate_and_roundtrip() {
        let tmp = NamedTempFile::new().unwrap();
        let storage = FileStorage::create(tmp.path()).unwrap();
        let off = storage.allocate(8).unwrap();
        storage.write_i64(off, 123456789).unwrap();
        assert_eq!(storage.read_i64(off).unwrap(), 123456789);
    }

    #[test]
    fn growth_past_initial_capacity_preserves_data() {
        let tmp = NamedTempFile::new().unwrap();
        let storage = FileStorage::create(tmp.path()).unwrap();
        let first = storage.allocate(4).unwrap();
        storage.write_i32(first, 7).unwrap();
        // Force several growths past the initial floor.
        for _ in 0..10 {
            storage.allocate(64).unwrap();
        }
        assert_eq!(storage.read_i32(first).unwrap(), 7);
    }

    #[test]
    fn read_only_storage_rejects_writes() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let storage = FileStorage::create(tmp.path()).unwrap();
            let off = storage.allocate(4).unwrap();
            storage.write_i32(off, 99).unwrap();
            storage.trim_to_size().unwrap();
        }
        let ro = ReadOnlyFileStorage::open(tmp.path()).unwrap();
        assert_eq!(ro.read_i32(0).unwrap(), 99);
        assert!(matches!(
            ro.write_i32(0, 1),
            Err(SfxError::InvalidState(_))
        ));
    }

    #[test]
    fn concurrent_dispose_of_mmap_never_faults() {
        let tmp = NamedTempFile::new().unwrap();
        {
            let storage = FileStorage::create(tmp.path()).unwrap();
            let off = storage.allocate(256).unwrap();
            storage.write_bytes(off, &vec![7u8; 256]).unwrap();
            storage.trim_to_size().unwrap();
        }
        let ro = Arc::new(ReadOnlyFileStorage::open(tmp.path()).unwrap());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let ro = Arc::clone(&ro);
            handles.push(std::thread::spawn(move || {
                for _ in 0..200 {
                    match ro.read_i32(0) {
                        Ok(_) | Err(SfxError::Disposed) => {}
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                    ro.dispose();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert!(ro.is_disposed());
    }
}
