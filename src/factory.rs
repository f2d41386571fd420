// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Orchestrates [`crate::builder::Builder`] → [`crate::tree::Tree`]
//! construction and the reverse load path.
//!
//! `Factory::create` picks a storage backend (heap if no path is given, a
//! memory-mapped file otherwise), runs the builder, and on
//! [`SfxError::CompactOverflow`] discards the arena and rebuilds from
//! scratch with every node forced into the Large layout — the alternative
//! policy to mid-build hybrid promotion, which the builder already performs
//! proactively via `compact_offset_limit` and so should only be reached if
//! that budget was itself set unreasonably high. `Factory::load` reopens a
//! previously created file, validating the header and footer before
//! trusting a single offset in it.

use std::path::Path;
use std::sync::Arc;

use crate::builder::{Builder, BuilderOptions};
use crate::error::{Result, SfxError};
use crate::layout::header::{Footer, Header};
use crate::storage::file::{FileStorage, ReadOnlyFileStorage};
use crate::storage::heap::HeapStorage;
use crate::storage::StorageProvider;
use crate::text::mmap::MmapText;
use crate::text::owned::OwnedText;
use crate::text::TextSource;
use crate::tree::Tree;

pub struct Factory;

impl Factory {
    /// Build a tree over `text`, persisting it at `path` if given, or
    /// keeping it entirely in memory otherwise.
    pub fn create(text: Vec<u16>, path: Option<&Path>) -> Result<Tree> {
        Self::create_with_options(text, path, BuilderOptions::default())
    }

    /// Like [`Factory::create`], with caller-chosen builder tunables —
    /// mainly useful for forcing early hybrid promotion in tests.
    pub fn create_with_options(text: Vec<u16>, path: Option<&Path>, options: BuilderOptions) -> Result<Tree> {
        match Self::try_build(&text, path, options) {
            Ok(tree) => Ok(tree),
            Err(SfxError::CompactOverflow) => {
                let large_only = BuilderOptions {
                    compact_offset_limit: 0,
                    show_progress: false,
                };
                Self::try_build(&text, path, large_only)
            }
            Err(e) => Err(e),
        }
    }

    fn try_build(text: &[u16], path: Option<&Path>, options: BuilderOptions) -> Result<Tree> {
        match path {
            Some(p) => Self::build_to_file(text, p, options),
            None => Self::build_in_memory(text, options),
        }
    }

    fn build_in_memory(text: &[u16], options: BuilderOptions) -> Result<Tree> {
        let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
        let header_offset = storage.allocate(Header::SIZE as i64)?;
        debug_assert_eq!(header_offset, 0);

        let builder = Builder::new(text.to_vec(), options)?;
        let out = builder.build(&storage)?;

        let header = out.header();
        write_header_and_footer(storage.as_ref(), &header)?;
        storage.trim_to_size()?;

        let text_source: Arc<dyn TextSource> = Arc::new(OwnedText::new(text.to_vec()));
        Ok(Tree::new(storage, text_source, header))
    }

    fn build_to_file(text: &[u16], path: &Path, options: BuilderOptions) -> Result<Tree> {
        let file_storage = FileStorage::create(path)?;
        let storage: Arc<dyn StorageProvider> = Arc::new(file_storage);
        let header_offset = storage.allocate(Header::SIZE as i64)?;
        debug_assert_eq!(header_offset, 0);

        let builder = Builder::new(text.to_vec(), options)?;
        let out = builder.build(&storage)?;

        let header = out.header();
        write_header_and_footer(storage.as_ref(), &header)?;
        storage.trim_to_size()?;

        // Drop the writable mapping before reopening read-only, so the
        // finished tree never holds a writable view over its own bytes.
        drop(storage);

        let ro = ReadOnlyFileStorage::open(path)?;
        let text_source: Arc<dyn TextSource> = Arc::new(MmapText::open(path, header.text_offset as usize, header.text_len as usize)?);
        Ok(Tree::new(Arc::new(ro), text_source, header))
    }

    /// Reopen a previously created index file read-only. A file written by
    /// an older build with no trailing footer still loads; use
    /// [`Factory::load_strict`] where that should be a hard error instead.
    pub fn load(path: &Path) -> Result<Tree> {
        Self::load_with_options(path, false)
    }

    /// Like [`Factory::load`], but rejects a file that has no trailing
    /// footer instead of silently skipping the CRC check.
    pub fn load_strict(path: &Path) -> Result<Tree> {
        Self::load_with_options(path, true)
    }

    fn load_with_options(path: &Path, strict: bool) -> Result<Tree> {
        let storage = ReadOnlyFileStorage::open(path)?;
        let total_size = storage.size()?;
        if total_size < Header::SIZE as i64 {
            return Err(SfxError::corruption("header", "file shorter than the fixed header"));
        }

        let header_bytes = storage.read_bytes(0, Header::SIZE)?;
        let header = Header::read(&mut &header_bytes[..])
            .map_err(|e| SfxError::corruption("magic", e.to_string()))?;
        header.validate(total_size)?;

        // `validate` already confirmed total_size is either header.size
        // (no footer) or header.size + Footer::SIZE (a footer present);
        // there's no separate flag to consult.
        let has_footer = total_size == header.size + Footer::SIZE as i64;
        if has_footer {
            let footer_start = total_size - Footer::SIZE as i64;
            let footer_bytes = storage.read_bytes(footer_start, Footer::SIZE)?;
            let footer = Footer::read(&footer_bytes)?;
            let payload = storage.read_bytes(0, footer_start as usize)?;
            let expected = Footer::compute_crc32(&payload);
            if expected != footer.crc32 {
                return Err(SfxError::corruption(
                    "footer_crc",
                    format!("checksum mismatch (expected {expected:#010x}, found {:#010x})", footer.crc32),
                ));
            }
        } else if strict {
            return Err(SfxError::corruption("footer", "strict load requires a trailing footer"));
        }

        let text_source: Arc<dyn TextSource> =
            Arc::new(MmapText::open(path, header.text_offset as usize, header.text_len as usize)?);
        Ok(Tree::new(Arc::new(storage), text_source, header))
    }
}

/// Stamp the real header over the zero-filled placeholder at offset 0, then
/// append an 8-byte footer covering every byte written so far.
fn write_header_and_footer(storage: &dyn StorageProvider, header: &Header) -> Result<()> {
    let mut header_bytes = Vec::with_capacity(Header::SIZE);
    header.write(&mut header_bytes)?;
    storage.write_bytes(0, &header_bytes)?;

    let payload_len = storage.size()?;
    let payload = storage.read_bytes(0, payload_len as usize)?;
    let crc32 = Footer::compute_crc32(&payload);

    let footer = Footer { crc32 };
    let mut footer_bytes = Vec::with_capacity(Footer::SIZE);
    footer.write(&mut footer_bytes)?;
    let footer_offset = storage.allocate(Footer::SIZE as i64)?;
    storage.write_bytes(footer_offset, &footer_bytes)
}
