// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! In-memory [`TextSource`] over an owned `Vec<u16>`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use super::{check_bounds, TextSource};
use crate::error::{Result, SfxError};

pub struct OwnedText {
    units: RwLock<Option<Vec<u16>>>,
    len: usize,
    disposed: AtomicBool,
}

impl OwnedText {
    pub fn new(units: Vec<u16>) -> Self {
        let len = units.len();
        Self {
            units: RwLock::new(Some(units)),
            len,
            disposed: AtomicBool::new(false),
        }
    }

    /// Convert a Rust `&str` into its UTF-16 representation, then own it.
    pub fn from_str(s: &str) -> Self {
        Self::new(s.encode_utf16().collect())
    }
}

impl TextSource for OwnedText {
    fn len(&self) -> Result<usize> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        Ok(self.len)
    }

    fn char_at(&self, index: usize) -> Result<u16> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        check_bounds(self.len, index, index + 1)?;
        let guard = self.units.read().unwrap();
        let units = guard.as_ref().ok_or(SfxError::Disposed)?;
        Ok(units[index])
    }

    fn slice(&self, start: usize, end: usize) -> Result<Vec<u16>> {
        if self.disposed.load(Ordering::Acquire) {
            return Err(SfxError::Disposed);
        }
        check_bounds(self.len, start, end)?;
        let guard = self.units.read().unwrap();
        let units = guard.as_ref().ok_or(SfxError::Disposed)?;
        Ok(units[start..end].to_vec())
    }

    fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        if let Ok(mut guard) = self.units.write() {
            guard.take();
        }
    }

    fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }
}
