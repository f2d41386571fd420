// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Memory-mapped [`TextSource`], used when the text is persisted inside the
//! same file as the tree structure (or in its own file) and is large enough
//! that copying it into heap memory isn't worth the win.
//!
//! Each code unit is stored little-endian, two bytes apart, starting at
//! `base_offset`. Disposal follows the same Arc-snapshot discipline as
//! [`crate::storage::file::ReadOnlyFileStorage`]: see that module's docs.

use std::fs::File;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use memmap2::Mmap;

use super::{check_bounds, TextSource};
use crate::error::{Result, SfxError};

pub struct MmapText {
    map: Mutex<Option<Arc<Mmap>>>,
    base_offset: usize,
    len: usize,
    disposed: AtomicBool,
}

impl MmapText {
    /// Map `path` and expose `len` UTF-16 code units starting at
    /// `base_offset` bytes into the file.
    pub fn open(path: &Path, base_offset: usize, len: usize) -> Result<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len() as usize;
        let needed = base_offset
            .checked_add(len.checked_mul(2).ok_or_else(|| {
                SfxError::out_of_range("text length overflowed byte length")
            })?)
            .ok_or_else(|| SfxError::out_of_range("text region overflowed file"))?;
        if needed > file_len {
            return Err(SfxError::corruption(
                "text_region",
                format!("region [{base_offset}, {needed}) exceeds file length {file_len}"),
            ));
        }
        let map = if len > 0 { Some(Arc::new(map_ro(&file)?)) } else { None };
        Ok(Self {
            map: Mutex::new(map),
            base_offset,
            len,
            disposed: AtomicBool::new(false),
        })
    }

    /// Share an already-open mapping (e.g. the same file the tree structure
    /// lives in) instead of mapping the file a second time.
    pub fn from_mapping(mapping: Arc<Mmap>, base_offset: usize, len: usize) -> Self {
        Self {
            map: Mutex::new(Some(mapping)),
            base_offset,
            len,
            disposed: AtomicBool::new(false),
        }
    }

    fn snapshot(&self) -> Result<Arc<Mmap>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        let guard = self.map.lock().unwrap();
        guard.clone().ok_or(SfxError::Disposed)
    }

    fn unit_at(mapping: &Mmap, byte_offset: usize) -> u16 {
        u16::from_le_bytes([mapping[byte_offset], mapping[byte_offset + 1]])
    }
}

impl TextSource for MmapText {
    fn len(&self) -> Result<usize> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        Ok(self.len)
    }

    fn char_at(&self, index: usize) -> Result<u16> {
        check_bounds(self.len, index, index + 1)?;
        let mapping = self.snapshot()?;
        Ok(Self::unit_at(&mapping, self.base_offset + index * 2))
    }

    fn slice(&self, start: usize, end: usize) -> Result<Vec<u16>> {
        check_bounds(self.len, start, end)?;
        let mapping = self.snapshot()?;
        let mut out = Vec::with_capacity(end - start);
        for i in start..end {
            out.push(Self::unit_at(&mapping, self.base_offset + i * 2));
        }
        Ok(out)
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

/// The only other unsafe call site in the crate besides `storage::file`;
/// see that module's doc comment for why mapping a file requires `unsafe`.
#[allow(unsafe_code)]
fn map_ro(file: &File) -> Result<Mmap> {
    unsafe { Mmap::map(file).map_err(|e| SfxError::IoFailure(e.to_string())) }
}
