// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Builds a persisted suffix tree from UTF-16 text.
//!
//! [`Builder`] runs in three stages: Ukkonen construction over an in-memory
//! graph ([`ukkonen`]), flushing that graph into a [`crate::storage::StorageProvider`]
//! arena with Compact/Large promotion ([`materialize`]), then persisting
//! the text itself so the finished tree is self-contained. A `Builder` is
//! single-use: [`Builder::build`] consumes `self`, so the same instance can
//! never be driven twice.

mod materialize;
pub(crate) mod ukkonen;

use std::sync::Arc;

use crate::error::{Result, SfxError};
use crate::layout::header::Header;
use crate::storage::StorageProvider;

pub use ukkonen::TERMINATOR;

/// Tunables for a single build.
#[derive(Debug, Clone)]
pub struct BuilderOptions {
    /// Highest byte offset the Compact layout may address before the
    /// builder promotes to Large. Defaults to just under the Compact
    /// format's hard ceiling, leaving headroom for the jump table and text
    /// region that follow the structural data.
    pub compact_offset_limit: i64,
    /// Emit an indicatif progress bar while building (CLI use only; a
    /// library caller building programmatically should leave this off).
    pub show_progress: bool,
}

impl Default for BuilderOptions {
    fn default() -> Self {
        Self {
            compact_offset_limit: crate::layout::header::COMPACT_MAX_OFFSET as i64 - (1 << 20),
            show_progress: false,
        }
    }
}

/// The result of a successful build: everything [`crate::factory::Factory`]
/// needs to assemble a file [`Header`], plus a few build-time diagnostics
/// (`structure_len`, `jump_table_len`, `node_count`, `leaf_count`) that
/// never made it into the header itself.
pub struct BuildOutput {
    pub root_offset: i64,
    /// [`NULL`] unless the build promoted from Compact to Large mid-flush.
    pub transition_offset: i64,
    pub structure_len: i64,
    /// [`NULL`] alongside `jump_table_end` if no bridging entries exist.
    pub jump_table_start: i64,
    pub jump_table_end: i64,
    pub jump_table_len: u32,
    pub layout_version: i32,
    pub text_offset: i64,
    pub text_len: u32,
    pub node_count: u32,
    pub leaf_count: u32,
    pub deepest_offset: i64,
}

impl BuildOutput {
    /// Assemble the on-disk [`Header`] this build produces. `size` is the
    /// total payload byte length: everything up to and including the
    /// persisted text, but not the trailing footer.
    pub fn header(&self) -> Header {
        Header {
            version: self.layout_version,
            root_offset: self.root_offset,
            size: self.text_offset + self.text_len as i64 * 2,
            text_offset: self.text_offset,
            text_len: self.text_len,
            deepest_offset: self.deepest_offset,
            transition_offset: self.transition_offset,
            jump_table_start: self.jump_table_start,
            jump_table_end: self.jump_table_end,
        }
    }
}

pub struct Builder {
    text: Vec<u16>,
    options: BuilderOptions,
}

impl Builder {
    pub fn new(text: Vec<u16>, options: BuilderOptions) -> Result<Self> {
        if text.len() > u32::MAX as usize {
            return Err(SfxError::invalid_argument(
                "text exceeds the maximum addressable length (u32::MAX code units)",
            ));
        }
        if text.contains(&TERMINATOR) {
            return Err(SfxError::invalid_argument(
                "text contains U+FFFF, which this crate reserves as its internal end-of-text sentinel",
            ));
        }
        Ok(Self { text, options })
    }

    /// Construct the tree and flush it into `storage`, then persist the
    /// text right after the structural region. Consumes the builder.
    pub fn build(self, storage: &Arc<dyn StorageProvider>) -> Result<BuildOutput> {
        let mut augmented = self.text.clone();
        augmented.push(TERMINATOR);

        let progress = self.options.show_progress.then(|| {
            let bar = indicatif_bar(augmented.len() as u64);
            bar
        });

        let mut nodes = ukkonen::build(&augmented);
        ukkonen::prune_terminator(&mut nodes);

        if let Some(bar) = &progress {
            bar.set_message("flushing tree to storage");
        }

        let flushed = materialize::materialize(
            &nodes,
            storage.as_ref(),
            self.options.compact_offset_limit,
            self.text.len() as i64,
        )?;

        if let Some(bar) = &progress {
            bar.set_message("persisting text");
        }

        let text_offset = storage.allocate(self.text.len() as i64 * 2)?;
        for (i, &unit) in self.text.iter().enumerate() {
            storage.write_char(text_offset + i as i64 * 2, unit)?;
        }

        if let Some(bar) = progress {
            bar.finish_with_message("build complete");
        }

        Ok(BuildOutput {
            root_offset: flushed.root_offset,
            transition_offset: flushed.transition_offset,
            structure_len: flushed.structure_len,
            jump_table_start: flushed.jump_table_start,
            jump_table_end: flushed.jump_table_end,
            jump_table_len: flushed.jump_table_len,
            layout_version: flushed.layout_version,
            text_offset,
            text_len: self.text.len() as u32,
            node_count: flushed.node_count,
            leaf_count: flushed.leaf_count,
            deepest_offset: flushed.deepest_offset,
        })
    }
}

#[cfg(feature = "progress")]
fn indicatif_bar(len: u64) -> indicatif::ProgressBar {
    use indicatif::{ProgressBar, ProgressStyle};
    let bar = ProgressBar::new(len);
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg} [{bar:40}] {pos}/{len}") {
        bar.set_style(style);
    }
    bar
}

#[cfg(not(feature = "progress"))]
fn indicatif_bar(_len: u64) -> NullProgress {
    NullProgress
}

#[cfg(not(feature = "progress"))]
struct NullProgress;

#[cfg(not(feature = "progress"))]
impl NullProgress {
    fn set_message(&self, _msg: &str) {}
    fn finish_with_message(&self, _msg: &str) {}
}
