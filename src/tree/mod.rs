// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! The read-only query surface over a persisted suffix tree: substring
//! containment, occurrence enumeration, longest repeated substring,
//! longest common substring, and structural traversal.
//!
//! [`Tree`] holds an `Arc<dyn StorageProvider>` and an `Arc<dyn TextSource>`
//! plus the parsed [`Header`]; every query walks the arena through
//! [`Navigator`], which is the one place that knows how to resolve a
//! [`crate::layout::ChildEntry`]'s array — direct, or bridged through the
//! jump table when [`Node::jumped`] is set. Nothing in this module ever
//! compares an offset to [`Header::transition_offset`] itself; it always
//! goes through [`crate::layout::layout_for_offset`].

pub mod lcs;
pub mod traverse;

use std::sync::Arc;

use crate::error::Result;
use crate::layout::header::Header;
use crate::layout::{layout_for_offset, ChildEntry, CompactLayout, LargeLayout, Node, NodeLayout};
use crate::storage::StorageProvider;
use crate::text::TextSource;
use crate::tree::traverse::Visitor;

/// A single occurrence of a matched pattern: the character offset into the
/// source text where it begins.
pub type Occurrence = usize;

pub struct Tree {
    storage: Arc<dyn StorageProvider>,
    text: Arc<dyn TextSource>,
    header: Header,
    compact: CompactLayout,
    large: LargeLayout,
}

/// Where a pattern match against a node's subtree landed, used internally
/// while walking.
struct Locate {
    /// Offset of the node the match ended at or within.
    node_offset: i64,
    /// String-depth (in code units) from the root to `node_offset`,
    /// including any partial distance into its incoming edge.
    depth: i64,
}

impl Tree {
    pub fn new(
        storage: Arc<dyn StorageProvider>,
        text: Arc<dyn TextSource>,
        header: Header,
    ) -> Self {
        Self {
            storage,
            text,
            header,
            compact: CompactLayout::new(),
            large: LargeLayout::new(),
        }
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn text_len(&self) -> Result<usize> {
        self.text.len()
    }

    /// Clone the underlying text source handle (cheap: an `Arc` bump).
    pub fn text_arc(&self) -> Arc<dyn TextSource> {
        Arc::clone(&self.text)
    }

    fn layout_for(&self, offset: i64) -> &dyn NodeLayout {
        layout_for_offset(offset, &self.header, &self.compact, &self.large)
    }

    fn read_node(&self, offset: i64) -> Result<Node> {
        self.layout_for(offset).read_node(self.storage.as_ref(), offset)
    }

    /// Resolve a node's child array to its real offset and the layout that
    /// governs its entries (which may differ from the layout governing the
    /// node record itself — see module docs).
    fn children_array(&self, node: &Node) -> Result<(i64, &dyn NodeLayout)> {
        let arr_off = if node.jumped {
            let idx = node.children_head;
            self.storage
                .read_i64(self.header.jump_table_start + idx * 8)?
        } else {
            node.children_head
        };
        Ok((arr_off, self.layout_for(arr_off)))
    }

    fn find_child(&self, node: &Node, first_char: u16) -> Result<Option<ChildEntry>> {
        if node.is_leaf() {
            return Ok(None);
        }
        let (arr_off, layout) = self.children_array(node)?;
        let mut lo = 0i64;
        let mut hi = node.child_count as i64 - 1;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            let entry = layout.read_entry(self.storage.as_ref(), arr_off, mid as u32)?;
            if entry.first_char == first_char {
                return Ok(Some(entry));
            } else if entry.first_char < first_char {
                lo = mid + 1;
            } else {
                hi = mid - 1;
            }
        }
        Ok(None)
    }

    fn all_children(&self, node: &Node) -> Result<Vec<ChildEntry>> {
        if node.is_leaf() {
            return Ok(Vec::new());
        }
        let (arr_off, layout) = self.children_array(node)?;
        let mut out = Vec::with_capacity(node.child_count as usize);
        for i in 0..node.child_count {
            out.push(layout.read_entry(self.storage.as_ref(), arr_off, i)?);
        }
        Ok(out)
    }

    /// Edge label length for `node`, resolving an open (leaf) end against
    /// the real persisted text length.
    fn edge_len(&self, node: &Node, text_len: i64) -> i64 {
        node.edge_len(text_len)
    }

    /// Walk from the root matching `pattern` one character at a time,
    /// descending edges and (conceptually) skipping along an edge once its
    /// first character matches. Returns the deepest point reached and
    /// whether the full pattern was consumed.
    fn locate(&self, pattern: &[u16]) -> Result<Option<Locate>> {
        if pattern.is_empty() {
            return Ok(Some(Locate {
                node_offset: self.header.root_offset,
                depth: 0,
            }));
        }
        let text_len = self.text.len()? as i64;
        let mut node_offset = self.header.root_offset;
        let mut node = self.read_node(node_offset)?;
        let mut consumed = 0usize;

        while consumed < pattern.len() {
            let entry = match self.find_child(&node, pattern[consumed])? {
                Some(e) => e,
                None => return Ok(None),
            };
            let child_offset = entry.child_offset;
            let child = self.read_node(child_offset)?;
            let edge_len = self.edge_len(&child, text_len) as usize;
            let edge_start = child.start as usize;
            let remaining = pattern.len() - consumed;
            let take = remaining.min(edge_len);
            for i in 0..take {
                let text_char = self.text.char_at(edge_start + i)?;
                if text_char != pattern[consumed + i] {
                    return Ok(None);
                }
            }
            consumed += take;
            node_offset = child_offset;
            node = child;
            if take < edge_len {
                // Pattern exhausted partway down this edge; still a match.
                break;
            }
        }

        let depth = consumed as i64;
        Ok(Some(Locate { node_offset, depth }))
    }

    /// Does `pattern` occur anywhere in the text?
    pub fn contains(&self, pattern: &[u16]) -> Result<bool> {
        Ok(self.locate(pattern)?.is_some())
    }

    /// Every starting offset where `pattern` occurs in the source text,
    /// sorted ascending.
    pub fn find_all_occurrences(&self, pattern: &[u16]) -> Result<Vec<Occurrence>> {
        let located = match self.locate(pattern)? {
            Some(l) => l,
            None => return Ok(Vec::new()),
        };
        let text_len = self.text.len()?;
        let mut out = Vec::new();
        self.collect_leaf_starts(located.node_offset, text_len, &mut out)?;
        out.sort_unstable();
        Ok(out)
    }

    /// Number of occurrences: the end-of-match node's cached `leaf_count`,
    /// O(1) after the `O(|pattern|)` navigation — no leaf enumeration.
    pub fn count_occurrences(&self, pattern: &[u16]) -> Result<usize> {
        match self.locate(pattern)? {
            None => Ok(0),
            Some(loc) => Ok(self.read_node(loc.node_offset)?.leaf_count as usize),
        }
    }

    /// Recursively collect the suffix-start offsets of every leaf in the
    /// subtree rooted at `node_offset`, computed as `text_len - depth`
    /// rather than stored per leaf (see [`crate::builder`] docs).
    fn collect_leaf_starts(&self, node_offset: i64, text_len: usize, out: &mut Vec<Occurrence>) -> Result<()> {
        self.collect_leaf_starts_at_depth(node_offset, self.depth_to(node_offset, text_len as i64)?, text_len, out)
    }

    fn depth_to(&self, node_offset: i64, text_len: i64) -> Result<i64> {
        let mut depth = 0i64;
        let mut offset = node_offset;
        loop {
            let node = self.read_node(offset)?;
            if node.parent == crate::layout::NULL {
                break;
            }
            depth += self.edge_len(&node, text_len);
            offset = node.parent;
        }
        Ok(depth)
    }

    fn collect_leaf_starts_at_depth(
        &self,
        node_offset: i64,
        depth: i64,
        text_len: usize,
        out: &mut Vec<Occurrence>,
    ) -> Result<()> {
        let node = self.read_node(node_offset)?;
        if node.is_leaf() {
            out.push(text_len - depth as usize);
            return Ok(());
        }
        for entry in self.all_children(&node)? {
            let child = self.read_node(entry.child_offset)?;
            let child_depth = depth + self.edge_len(&child, text_len as i64);
            self.collect_leaf_starts_at_depth(entry.child_offset, child_depth, text_len, out)?;
        }
        Ok(())
    }

    /// Longest substring that occurs at least twice in the text, and one
    /// of its occurrences. Ties broken by leftmost occurrence.
    ///
    /// The deepest internal node is precomputed by the builder and
    /// persisted in the header (see [`crate::layout::header::Header::deepest_offset`]),
    /// so this needs only a walk up to the root to learn its depth — no
    /// DFS over the tree, even on a freshly loaded index.
    pub fn longest_repeated_substring(&self) -> Result<Vec<u16>> {
        let text_len = self.text.len()? as i64;
        let deepest_offset = self.header.deepest_offset;
        let best_depth = self.depth_to(deepest_offset, text_len)?;

        if best_depth == 0 {
            return Ok(Vec::new());
        }
        let mut starts = Vec::new();
        self.collect_leaf_starts(deepest_offset, text_len as usize, &mut starts)?;
        let best_start = starts.into_iter().min().unwrap_or(0);
        Ok(self.text.slice(best_start, best_start + best_depth as usize)?)
    }

    /// Every suffix of the text, in strict lexicographic order. Free: a
    /// suffix tree's child arrays are already sorted by first character, so
    /// an in-order traversal yields leaves (and hence suffixes) in sorted
    /// order with no comparison sort of its own.
    pub fn enumerate_suffixes(&self) -> Result<Vec<Vec<u16>>> {
        let text_len = self.text.len()?;
        let mut starts = Vec::with_capacity(self.leaf_count()? as usize);
        self.collect_leaf_starts_in_order(self.header.root_offset, text_len, &mut starts)?;
        starts
            .into_iter()
            .map(|start| self.text.slice(start, text_len))
            .collect()
    }

    /// Like [`Tree::collect_leaf_starts_at_depth`], but visits children in
    /// their stored (sorted) order instead of depth alone, so the resulting
    /// leaf sequence is in lexicographic order of the suffixes they denote.
    fn collect_leaf_starts_in_order(&self, node_offset: i64, text_len: usize, out: &mut Vec<Occurrence>) -> Result<()> {
        let node = self.read_node(node_offset)?;
        if node.is_leaf() {
            let depth = self.depth_to(node_offset, text_len as i64)?;
            out.push(text_len - depth as usize);
            return Ok(());
        }
        for entry in self.all_children(&node)? {
            self.collect_leaf_starts_in_order(entry.child_offset, text_len, out)?;
        }
        Ok(())
    }

    /// Total node count, observed by a full traversal — the header carries
    /// no precomputed count, so this is O(n) rather than O(1).
    pub fn node_count(&self) -> Result<u32> {
        struct Counter(u32);
        impl Visitor for Counter {
            fn visit(&mut self, _offset: i64, _depth: i64, _node: &Node, _is_leaf: bool) {
                self.0 += 1;
            }
        }
        let mut counter = Counter(0);
        self.traverse(&mut counter)?;
        Ok(counter.0)
    }

    /// Leaf count: the root node's own cached `leaf_count` field, written
    /// by the builder's post-order pass — O(1), no traversal needed.
    pub fn leaf_count(&self) -> Result<u32> {
        Ok(self.read_node(self.header.root_offset)?.leaf_count)
    }

    pub fn is_disposed(&self) -> bool {
        self.storage.is_disposed() || self.text.is_disposed()
    }

    pub fn dispose(&self) {
        self.storage.dispose();
        self.text.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Builder, BuilderOptions};
    use crate::storage::heap::HeapStorage;
    use crate::text::owned::OwnedText;

    fn build_tree(s: &str) -> Tree {
        let units: Vec<u16> = s.encode_utf16().collect();
        let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
        let out = Builder::new(units.clone(), BuilderOptions::default())
            .unwrap()
            .build(&storage)
            .unwrap();
        let header = out.header();
        let text: Arc<dyn TextSource> = Arc::new(OwnedText::new(units));
        Tree::new(storage, text, header)
    }

    fn u16s(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn contains_and_find_basic_pattern() {
        let tree = build_tree("banana");
        assert!(tree.contains(&u16s("ana")).unwrap());
        assert!(!tree.contains(&u16s("xyz")).unwrap());
        let mut occ = tree.find_all_occurrences(&u16s("ana")).unwrap();
        occ.sort_unstable();
        assert_eq!(occ, vec![1, 3]);
    }

    #[test]
    fn find_single_character_pattern() {
        let tree = build_tree("mississippi");
        let mut occ = tree.find_all_occurrences(&u16s("s")).unwrap();
        occ.sort_unstable();
        assert_eq!(occ, vec![2, 3, 5, 6]);
    }

    #[test]
    fn find_whole_text_matches_position_zero_only() {
        let tree = build_tree("abcabc");
        assert_eq!(tree.find_all_occurrences(&u16s("abcabc")).unwrap(), vec![0]);
    }

    #[test]
    fn count_matches_find_len() {
        let tree = build_tree("aaaa");
        assert_eq!(tree.count_occurrences(&u16s("a")).unwrap(), 4);
        assert_eq!(tree.count_occurrences(&u16s("aa")).unwrap(), 3);
    }

    #[test]
    fn node_count_and_leaf_count_agree_with_manual_traversal() {
        let tree = build_tree("banana");
        let mut manual = 0u32;
        tree.traverse(&mut CountingVisitor(&mut manual)).unwrap();
        assert_eq!(tree.node_count().unwrap(), manual);
        assert_eq!(tree.leaf_count().unwrap(), 6);
    }

    struct CountingVisitor<'a>(&'a mut u32);
    impl Visitor for CountingVisitor<'_> {
        fn visit(&mut self, _offset: i64, _depth: i64, _node: &Node, _is_leaf: bool) {
            *self.0 += 1;
        }
    }

    #[test]
    fn longest_repeated_substring_of_banana_is_ana() {
        let tree = build_tree("banana");
        let lrs = tree.longest_repeated_substring().unwrap();
        assert_eq!(lrs, u16s("ana"));
    }

    #[test]
    fn no_repeats_yields_empty_lrs() {
        let tree = build_tree("abcdef");
        assert!(tree.longest_repeated_substring().unwrap().is_empty());
    }

    #[test]
    fn empty_pattern_matches_everywhere_trivially() {
        let tree = build_tree("banana");
        assert!(tree.contains(&[]).unwrap());
    }

    #[test]
    fn enumerate_suffixes_is_sorted_and_complete() {
        let tree = build_tree("banana");
        let suffixes = tree.enumerate_suffixes().unwrap();
        let rendered: Vec<String> = suffixes.iter().map(|s| String::from_utf16_lossy(s)).collect();
        let mut expected: Vec<&str> = vec!["banana", "anana", "nana", "ana", "na", "a"];
        expected.sort_unstable();
        assert_eq!(rendered, expected);
    }
}
