// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Compact node layout: 28-byte nodes, `u32` offsets.
//!
//! Field layout (little-endian):
//! ```text
//! parent          u32   4
//! start           u32   4
//! end             u32   4   (0xFFFFFFFF means "open", resolved at close)
//! children_head   u32   4   (0xFFFFFFFF = leaf; JUMPED_FLAG bit of child_count
//!                            changes how this is interpreted, see module docs)
//! child_count     u32   4   (high bit = JUMPED_FLAG)
//! leaf_count      u32   4
//! reserved        u32   4   (alignment padding, always zero)
//! ```
//! Child-array entries are 6 bytes: a `u16` first character plus a `u32`
//! child offset.

use super::header::{COMPACT_MAX_OFFSET, COMPACT_NULL};
use super::{ChildEntry, Node, NodeLayout, JUMPED_FLAG};
use crate::error::Result;
use crate::storage::StorageProvider;

pub struct CompactLayout;

impl CompactLayout {
    pub fn new() -> Self {
        Self
    }

    fn to_wire_offset(&self, offset: i64) -> Result<u32> {
        if offset == super::NULL {
            return Ok(COMPACT_NULL);
        }
        if !(0..=COMPACT_MAX_OFFSET as i64).contains(&offset) {
            return Err(crate::error::SfxError::CompactOverflow);
        }
        Ok(offset as u32)
    }

    fn from_wire_offset(&self, raw: u32) -> i64 {
        if raw == COMPACT_NULL {
            super::NULL
        } else {
            raw as i64
        }
    }

    fn to_wire_end(&self, end: i64) -> Result<u32> {
        if end == i64::MAX {
            return Ok(COMPACT_NULL);
        }
        if !(0..=COMPACT_MAX_OFFSET as i64).contains(&end) {
            return Err(crate::error::SfxError::CompactOverflow);
        }
        Ok(end as u32)
    }

    fn from_wire_end(&self, raw: u32) -> i64 {
        if raw == COMPACT_NULL {
            i64::MAX
        } else {
            raw as i64
        }
    }
}

impl Default for CompactLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeLayout for CompactLayout {
    fn node_size(&self) -> i64 {
        28
    }

    fn entry_size(&self) -> i64 {
        6
    }

    fn max_offset(&self) -> i64 {
        COMPACT_MAX_OFFSET as i64
    }

    fn read_node(&self, storage: &dyn StorageProvider, offset: i64) -> Result<Node> {
        let parent = storage.read_u32(offset)?;
        let start = storage.read_u32(offset + 4)?;
        let end = storage.read_u32(offset + 8)?;
        let children_head = storage.read_u32(offset + 12)?;
        let child_count_raw = storage.read_u32(offset + 16)?;
        let jumped = child_count_raw & JUMPED_FLAG != 0;
        let child_count = child_count_raw & !JUMPED_FLAG;
        let leaf_count = storage.read_u32(offset + 20)?;
        Ok(Node {
            parent: self.from_wire_offset(parent),
            start: start as i64,
            end: self.from_wire_end(end),
            children_head: if jumped {
                children_head as i64
            } else {
                self.from_wire_offset(children_head)
            },
            child_count,
            jumped,
            leaf_count,
        })
    }

    fn write_node(&self, storage: &dyn StorageProvider, offset: i64, node: &Node) -> Result<()> {
        storage.write_u32(offset, self.to_wire_offset(node.parent)?)?;
        storage.write_u32(offset + 4, node.start as u32)?;
        storage.write_u32(offset + 8, self.to_wire_end(node.end)?)?;
        let children_head_wire = if node.jumped {
            node.children_head as u32
        } else {
            self.to_wire_offset(node.children_head)?
        };
        storage.write_u32(offset + 12, children_head_wire)?;
        let mut child_count = node.child_count;
        if node.jumped {
            child_count |= JUMPED_FLAG;
        }
        storage.write_u32(offset + 16, child_count)?;
        storage.write_u32(offset + 20, node.leaf_count)?;
        storage.write_u32(offset + 24, 0)?;
        Ok(())
    }

    fn alloc_node(&self, storage: &dyn StorageProvider) -> Result<i64> {
        let offset = storage.allocate(self.node_size())?;
        self.write_node(
            storage,
            offset,
            &Node {
                parent: super::NULL,
                start: 0,
                end: 0,
                children_head: super::NULL,
                child_count: 0,
                jumped: false,
                leaf_count: 0,
            },
        )?;
        Ok(offset)
    }

    fn alloc_children(&self, storage: &dyn StorageProvider, capacity: u32) -> Result<i64> {
        let bytes = self.entry_size() * capacity as i64;
        let offset = storage.allocate(bytes)?;
        for i in 0..capacity {
            self.write_entry(
                storage,
                offset,
                i,
                ChildEntry {
                    first_char: 0,
                    child_offset: super::NULL,
                },
            )?;
        }
        Ok(offset)
    }

    fn read_entry(
        &self,
        storage: &dyn StorageProvider,
        array_offset: i64,
        index: u32,
    ) -> Result<ChildEntry> {
        let base = array_offset + index as i64 * self.entry_size();
        let first_char = storage.read_char(base)?;
        let raw_offset = storage.read_u32(base + 2)?;
        Ok(ChildEntry {
            first_char,
            child_offset: self.from_wire_offset(raw_offset),
        })
    }

    fn write_entry(
        &self,
        storage: &dyn StorageProvider,
        array_offset: i64,
        index: u32,
        entry: ChildEntry,
    ) -> Result<()> {
        let base = array_offset + index as i64 * self.entry_size();
        storage.write_char(base, entry.first_char)?;
        storage.write_u32(base + 2, self.to_wire_offset(entry.child_offset)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::heap::HeapStorage;

    #[test]
    fn node_roundtrips_through_storage() {
        let storage = HeapStorage::new();
        let layout = CompactLayout::new();
        let offset = layout.alloc_node(&storage).unwrap();
        let node = Node {
            parent: 0,
            start: 3,
            end: 7,
            children_head: super::super::NULL,
            child_count: 0,
            jumped: false,
            leaf_count: 0,
        };
        layout.write_node(&storage, offset, &node).unwrap();
        let back = layout.read_node(&storage, offset).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn open_end_roundtrips_as_i64_max() {
        let storage = HeapStorage::new();
        let layout = CompactLayout::new();
        let offset = layout.alloc_node(&storage).unwrap();
        let node = Node {
            parent: super::super::NULL,
            start: 0,
            end: i64::MAX,
            children_head: super::super::NULL,
            child_count: 0,
            jumped: false,
            leaf_count: 0,
        };
        layout.write_node(&storage, offset, &node).unwrap();
        assert_eq!(layout.read_node(&storage, offset).unwrap().end, i64::MAX);
    }

    #[test]
    fn offset_past_compact_limit_overflows() {
        let layout = CompactLayout::new();
        assert!(matches!(
            layout.to_wire_offset(COMPACT_MAX_OFFSET as i64 + 1),
            Err(crate::error::SfxError::CompactOverflow)
        ));
    }

    #[test]
    fn children_roundtrip_with_first_chars() {
        let storage = HeapStorage::new();
        let layout = CompactLayout::new();
        let arr = layout.alloc_children(&storage, 3).unwrap();
        layout
            .write_entry(
                &storage,
                arr,
                1,
                ChildEntry {
                    first_char: b'a' as u16,
                    child_offset: 42,
                },
            )
            .unwrap();
        let entry = layout.read_entry(&storage, arr, 1).unwrap();
        assert_eq!(entry.first_char, b'a' as u16);
        assert_eq!(entry.child_offset, 42);
        let empty = layout.read_entry(&storage, arr, 0).unwrap();
        assert_eq!(empty.child_offset, super::super::NULL);
    }
}
