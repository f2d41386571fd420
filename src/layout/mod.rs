// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Node layout strategies: the byte-level shape of a node, in either of the
//! two wire formats this crate supports.
//!
//! A node is a fixed-size record: `parent`, `start`/`end` (the edge-label
//! range into the text), `suffix_link` (build-time only, not persisted),
//! `children_head` (offset of this node's child array, or the null
//! sentinel for a leaf), and `child_count`.
//!
//! Compact nodes are 28 bytes and address offsets with `u32` (4 bytes);
//! Large nodes are 40 bytes and address offsets with `i64` (8 bytes). Which
//! layout governs a given offset is never stored per-node: it is derived by
//! comparing the offset against [`crate::layout::header::Header::transition_offset`]
//! (see that module's docs). A hybrid tree promotes mid-build from Compact
//! to Large; see [`crate::builder`] for when that triggers.
//!
//! The high bit of a Compact node's `child_count` field (`JUMPED_FLAG`) is
//! repurposed to mean "`children_head` is not a direct Compact offset, it is
//! an index into the file's jump table, whose entries are full Large (i64)
//! offsets." This is the only bridging a promoted tree needs: child arrays
//! allocated after promotion are natively Large and hold direct Large
//! offsets already.

pub mod header;

use crate::error::{Result, SfxError};
use header::{Header, LAYOUT_VERSION_COMPACT};

/// Null sentinel shared by both layouts once decoded to `i64`.
pub const NULL: i64 = -1;

/// High bit of a Compact node's `child_count`, meaning `children_head`
/// is a jump-table index rather than a direct offset.
pub const JUMPED_FLAG: u32 = 0x8000_0000;

/// A decoded node, layout-agnostic from here on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Node {
    pub parent: i64,
    pub start: i64,
    /// Exclusive edge end; `i64::MAX` encodes "open" (extends to the
    /// current end of text during construction — `rend` in Ukkonen's own
    /// terms), resolved to a concrete value once the document is closed.
    pub end: i64,
    pub children_head: i64,
    pub child_count: u32,
    /// `true` for a Compact node whose `children_head` is a jump-table
    /// index, not a direct offset. Always `false` for Large nodes.
    pub jumped: bool,
    /// Cached size of this node's subtree in leaves, written by the
    /// builder's post-order pass once structural construction finishes.
    /// Lets `Tree::count` answer in O(1) instead of enumerating leaves.
    pub leaf_count: u32,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.children_head == NULL
    }

    pub fn edge_len(&self, text_len: i64) -> i64 {
        let end = if self.end == i64::MAX { text_len } else { self.end };
        end - self.start
    }
}

/// A child-array entry: the UTF-16 code unit the edge starts with, and the
/// offset of the child node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildEntry {
    pub first_char: u16,
    pub child_offset: i64,
}

/// Strategy object for one of the two wire layouts. Implementors read and
/// write through a [`crate::storage::StorageProvider`] at byte offsets they
/// alone understand; nothing above this module knows the field widths.
pub trait NodeLayout: Send + Sync {
    /// Size in bytes of one node record.
    fn node_size(&self) -> i64;
    /// Size in bytes of one child-array entry.
    fn entry_size(&self) -> i64;
    /// Highest offset this layout can address.
    fn max_offset(&self) -> i64;

    fn read_node(&self, storage: &dyn crate::storage::StorageProvider, offset: i64) -> Result<Node>;
    fn write_node(
        &self,
        storage: &dyn crate::storage::StorageProvider,
        offset: i64,
        node: &Node,
    ) -> Result<()>;

    /// Allocate a fresh node record, zero-initialized as a leaf with no
    /// parent/children yet, and return its offset.
    fn alloc_node(&self, storage: &dyn crate::storage::StorageProvider) -> Result<i64>;

    /// Allocate a child array able to hold `capacity` entries and return its
    /// offset.
    fn alloc_children(
        &self,
        storage: &dyn crate::storage::StorageProvider,
        capacity: u32,
    ) -> Result<i64>;

    fn read_entry(
        &self,
        storage: &dyn crate::storage::StorageProvider,
        array_offset: i64,
        index: u32,
    ) -> Result<ChildEntry>;

    fn write_entry(
        &self,
        storage: &dyn crate::storage::StorageProvider,
        array_offset: i64,
        index: u32,
        entry: ChildEntry,
    ) -> Result<()>;
}

/// Resolve which layout governs a given offset. A non-hybrid header (no
/// transition point recorded) is governed entirely by `header.version`;
/// a hybrid header splits at `header.transition_offset`, Compact below it
/// and Large at or past it. The one place either comparison happens;
/// everything else just asks this function.
pub fn layout_for_offset<'a>(
    offset: i64,
    header: &Header,
    compact: &'a CompactLayout,
    large: &'a LargeLayout,
) -> &'a dyn NodeLayout {
    if header.transition_offset == NULL {
        if header.version == LAYOUT_VERSION_COMPACT {
            compact
        } else {
            large
        }
    } else if offset < header.transition_offset {
        compact
    } else {
        large
    }
}

mod compact;
mod large;

pub use compact::CompactLayout;
pub use large::LargeLayout;

pub(crate) fn overflow(detail: impl Into<String>) -> SfxError {
    SfxError::corruption("offset", detail)
}
