// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Flushes an in-memory [`RawNode`] graph into a [`crate::storage::StorageProvider`]
//! arena using the Compact layout, promoting to Large mid-flush if an
//! offset would exceed the configured limit.
//!
//! Two passes: the first allocates every reachable node's fixed-size
//! record (so every node has a known offset before any cross-references
//! are written), the second allocates each node's child array and patches
//! the node record with its real `children_head`/`child_count`. Promotion
//! can happen during either pass; once it happens every later allocation —
//! node record or array — uses the Large layout, never Compact again.
//!
//! A Compact node whose child array ends up allocated past
//! `transition_offset` (because the array pass ran long enough to cross
//! it) cannot hold that array's real offset in its narrow `children_head`
//! field. That case is bridged through the jump table: the real offset is
//! appended to the table and the node stores the table index instead, with
//! [`crate::layout::JUMPED_FLAG`] set on `child_count` so a reader knows to
//! indirect through the table.

use std::collections::HashMap;

use crate::builder::ukkonen::{RawNode, ROOT};
use crate::error::Result;
use crate::layout::header::{LAYOUT_VERSION_COMPACT, LAYOUT_VERSION_LARGE};
use crate::layout::{ChildEntry, CompactLayout, LargeLayout, Node, NodeLayout, NULL};
use crate::storage::StorageProvider;

pub struct Materialized {
    pub root_offset: i64,
    /// First offset governed by the Large layout, or [`NULL`] if the build
    /// never promoted (pure Compact or pure Large throughout).
    pub transition_offset: i64,
    pub structure_len: i64,
    /// [`NULL`] alongside `jump_table_end` if no entries were needed.
    pub jump_table_start: i64,
    pub jump_table_end: i64,
    pub jump_table_len: u32,
    /// [`LAYOUT_VERSION_COMPACT`] if any node in the tree is Compact,
    /// [`LAYOUT_VERSION_LARGE`] otherwise.
    pub layout_version: i32,
    pub node_count: u32,
    pub leaf_count: u32,
    /// Offset of the internal node with the greatest character depth, for
    /// O(1) `longest_repeated_substring` on load. `root_offset` itself on a
    /// tree with no internal node besides the root.
    pub deepest_offset: i64,
}

/// Per-node subtree leaf counts, computed bottom-up. `order` must be a
/// preorder DFS sequence (every node's descendants appear contiguously
/// right after it), so walking it in reverse processes every node's
/// children before the node itself.
fn subtree_leaf_counts(nodes: &[RawNode], order: &[usize]) -> HashMap<usize, u32> {
    let mut counts = HashMap::with_capacity(order.len());
    for &id in order.iter().rev() {
        let count = if nodes[id].children.is_empty() {
            1
        } else {
            nodes[id].children.values().map(|c| counts[c]).sum()
        };
        counts.insert(id, count);
    }
    counts
}

/// Character depth of every reachable node and the internal node reaching
/// the greatest depth (root if the tree has no other internal node).
/// `order` must be a preorder DFS sequence so a node's parent's depth is
/// always already known when the node itself is visited.
fn deepest_internal(nodes: &[RawNode], order: &[usize], text_len: i64) -> usize {
    let mut depth_of: HashMap<usize, i64> = HashMap::with_capacity(order.len());
    let mut deepest = ROOT;
    let mut deepest_depth = 0i64;
    for &id in order {
        let raw = &nodes[id];
        let depth = match raw.parent {
            None => 0,
            Some(p) => {
                let end = raw.end.map(|e| e as i64).unwrap_or(text_len).min(text_len);
                let start = (raw.start as i64).min(end);
                depth_of[&p] + (end - start)
            }
        };
        depth_of.insert(id, depth);
        if !raw.children.is_empty() && depth > deepest_depth {
            deepest_depth = depth;
            deepest = id;
        }
    }
    deepest
}

/// Visit every node reachable from the root in pre-order, sorted-children
/// order. Nodes left unreachable by [`super::ukkonen::prune_terminator`]
/// are simply never visited, so no renumbering of the raw graph is needed.
fn reachable_order(nodes: &[RawNode]) -> Vec<usize> {
    let mut order = Vec::new();
    let mut stack = vec![ROOT];
    while let Some(node) = stack.pop() {
        order.push(node);
        let mut kids: Vec<usize> = nodes[node].children.values().copied().collect();
        kids.reverse();
        stack.extend(kids);
    }
    order
}

pub fn materialize(
    nodes: &[RawNode],
    storage: &dyn StorageProvider,
    compact_offset_limit: i64,
    text_len: i64,
) -> Result<Materialized> {
    let compact = CompactLayout::new();
    let large = LargeLayout::new();

    let order = reachable_order(nodes);
    let seq_of: HashMap<usize, usize> = order.iter().enumerate().map(|(seq, &old)| (old, seq)).collect();
    let n = order.len();
    let leaf_counts = subtree_leaf_counts(nodes, &order);
    let deepest_old = deepest_internal(nodes, &order, text_len);

    let mut promoted = false;
    let mut transition_offset = i64::MAX;
    let mut offset_of = vec![0i64; n];
    let mut is_compact = vec![true; n];

    // Pass 1: node records.
    for seq in 0..n {
        let tail = storage.size()?;
        if !promoted && tail + compact.node_size() > compact_offset_limit {
            promoted = true;
            transition_offset = tail;
        }
        let layout: &dyn NodeLayout = if promoted { &large } else { &compact };
        is_compact[seq] = !promoted;
        offset_of[seq] = layout.alloc_node(storage)?;
    }

    // Pass 2: child arrays, then patch each node record with its real
    // parent/children_head/child_count.
    let mut jump_table: Vec<i64> = Vec::new();
    let mut leaf_count: u32 = 0;

    for seq in 0..n {
        let old = order[seq];
        let raw = &nodes[old];
        let node_off = offset_of[seq];
        let node_is_compact = is_compact[seq];
        let node_layout: &dyn NodeLayout = if node_is_compact { &compact } else { &large };

        let parent_off = raw.parent.map(|p| offset_of[seq_of[&p]]).unwrap_or(NULL);
        let end_val = raw.end.map(|e| e as i64).unwrap_or(i64::MAX);

        let (children_head, child_count, jumped) = if raw.children.is_empty() {
            leaf_count += 1;
            (NULL, 0u32, false)
        } else {
            let count = raw.children.len() as u32;
            let tail = storage.size()?;
            if !promoted && tail + compact.entry_size() * count as i64 > compact_offset_limit {
                promoted = true;
                transition_offset = tail;
            }
            let array_layout: &dyn NodeLayout = if promoted { &large } else { &compact };
            let arr_off = array_layout.alloc_children(storage, count)?;
            for (idx, (&first_char, &child_old)) in raw.children.iter().enumerate() {
                array_layout.write_entry(
                    storage,
                    arr_off,
                    idx as u32,
                    ChildEntry {
                        first_char,
                        child_offset: offset_of[seq_of[&child_old]],
                    },
                )?;
            }

            if node_is_compact && promoted && arr_off >= transition_offset {
                jump_table.push(arr_off);
                ((jump_table.len() - 1) as i64, count, true)
            } else {
                (arr_off, count, false)
            }
        };

        node_layout.write_node(
            storage,
            node_off,
            &Node {
                parent: parent_off,
                start: raw.start as i64,
                end: end_val,
                children_head,
                child_count,
                jumped,
                leaf_count: leaf_counts[&old],
            },
        )?;
    }

    let any_compact = is_compact.iter().any(|&c| c);
    let hybrid = promoted && any_compact;
    let layout_version = if any_compact { LAYOUT_VERSION_COMPACT } else { LAYOUT_VERSION_LARGE };

    let (jump_table_start, jump_table_end) = if jump_table.is_empty() {
        (NULL, NULL)
    } else {
        let off = storage.allocate(jump_table.len() as i64 * 8)?;
        for (i, &v) in jump_table.iter().enumerate() {
            storage.write_i64(off + i as i64 * 8, v)?;
        }
        (off, off + jump_table.len() as i64 * 8)
    };

    let structure_len = storage.size()?;

    Ok(Materialized {
        root_offset: offset_of[0],
        transition_offset: if hybrid { transition_offset } else { NULL },
        structure_len,
        jump_table_start,
        jump_table_end,
        jump_table_len: jump_table.len() as u32,
        layout_version,
        node_count: n as u32,
        leaf_count,
        deepest_offset: offset_of[seq_of[&deepest_old]],
    })
}
