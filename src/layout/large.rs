// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Large node layout: 40-byte nodes, `i64` offsets.
//!
//! Field layout (little-endian):
//! ```text
//! parent          i64   8
//! start           i64   8
//! end             i64   8   (-1 means "open", resolved at close)
//! children_head   i64   8   (-1 = leaf)
//! child_count     u32   4
//! leaf_count      u32   4
//! ```
//! Child-array entries are 10 bytes: a `u16` first character plus an `i64`
//! child offset. Large nodes never set [`super::JUMPED_FLAG`]; that bit only
//! has meaning for a Compact node bridging into the Large zone.

use super::header::LARGE_NULL;
use super::{ChildEntry, Node, NodeLayout};
use crate::error::Result;
use crate::storage::StorageProvider;

pub struct LargeLayout;

impl LargeLayout {
    pub fn new() -> Self {
        Self
    }

    fn from_wire_offset(&self, raw: i64) -> i64 {
        if raw == LARGE_NULL {
            super::NULL
        } else {
            raw
        }
    }

    fn to_wire_offset(&self, offset: i64) -> i64 {
        if offset == super::NULL {
            LARGE_NULL
        } else {
            offset
        }
    }
}

impl Default for LargeLayout {
    fn default() -> Self {
        Self::new()
    }
}

impl NodeLayout for LargeLayout {
    fn node_size(&self) -> i64 {
        40
    }

    fn entry_size(&self) -> i64 {
        10
    }

    fn max_offset(&self) -> i64 {
        i64::MAX - 1
    }

    fn read_node(&self, storage: &dyn StorageProvider, offset: i64) -> Result<Node> {
        let parent = storage.read_i64(offset)?;
        let start = storage.read_i64(offset + 8)?;
        let end = storage.read_i64(offset + 16)?;
        let children_head = storage.read_i64(offset + 24)?;
        let child_count = storage.read_u32(offset + 32)?;
        let leaf_count = storage.read_u32(offset + 36)?;
        Ok(Node {
            parent: self.from_wire_offset(parent),
            start,
            end: if end == LARGE_NULL { i64::MAX } else { end },
            children_head: self.from_wire_offset(children_head),
            child_count,
            jumped: false,
            leaf_count,
        })
    }

    fn write_node(&self, storage: &dyn StorageProvider, offset: i64, node: &Node) -> Result<()> {
        storage.write_i64(offset, self.to_wire_offset(node.parent))?;
        storage.write_i64(offset + 8, node.start)?;
        let end_wire = if node.end == i64::MAX { LARGE_NULL } else { node.end };
        storage.write_i64(offset + 16, end_wire)?;
        storage.write_i64(offset + 24, self.to_wire_offset(node.children_head))?;
        storage.write_u32(offset + 32, node.child_count)?;
        storage.write_u32(offset + 36, node.leaf_count)?;
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
        let raw_offset = storage.read_i64(base + 2)?;
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
        storage.write_i64(base + 2, self.to_wire_offset(entry.child_offset))?;
        Ok(())
    }
}
