// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Structural traversal: a [`Visitor`] callback walk over every node, and
//! a `print_tree` dump built on top of it for the `sfxtree traverse` CLI
//! command. Leaf counting over a large subtree additionally offers a
//! `rayon`-parallel path, gated behind the `parallel` feature like every
//! other optional-parallelism code path in this crate.

use std::fmt::Write as _;

use super::Tree;
use crate::error::Result;
use crate::layout::Node;

/// Called once per node in pre-order (parent before children).
pub trait Visitor {
    /// `depth` is the string-depth (code units from the root), `is_leaf`
    /// tells you whether to expect further calls for this subtree.
    fn visit(&mut self, offset: i64, depth: i64, node: &Node, is_leaf: bool);

    /// Called just before the traversal descends into a child, named by
    /// `key` — the first UTF-16 code unit of that child's incoming edge.
    /// Default is a no-op; override to track a path stack alongside `visit`.
    fn enter(&mut self, _key: u16) {}

    /// Called immediately after the traversal returns from the child most
    /// recently announced via `enter`.
    fn exit(&mut self) {}
}

impl Tree {
    /// Pre-order walk of the whole tree, calling `visitor` once per node.
    ///
    /// `depth` passed to `visit` is the *parent's* cumulative character
    /// depth — the depth before consuming this node's own edge, not after.
    /// Root reports 0; every direct child of root also reports 0, since
    /// root's own (meaningless) edge has zero length. This is the
    /// counter-intuitive part: a node's depth argument says nothing about
    /// its own edge, only about how deep its parent already was.
    pub fn traverse(&self, visitor: &mut dyn Visitor) -> Result<()> {
        let text_len = self.text_len()? as i64;
        self.traverse_from(self.header().root_offset, 0, text_len, visitor)
    }

    fn traverse_from(&self, offset: i64, depth_before_own_edge: i64, text_len: i64, visitor: &mut dyn Visitor) -> Result<()> {
        let node = self.read_node(offset)?;
        visitor.visit(offset, depth_before_own_edge, &node, node.is_leaf());
        let cumulative_depth = depth_before_own_edge + self.edge_len(&node, text_len);
        for entry in self.all_children(&node)? {
            visitor.enter(entry.first_char);
            self.traverse_from(entry.child_offset, cumulative_depth, text_len, visitor)?;
            visitor.exit();
        }
        Ok(())
    }

    /// Render the tree as indented text, one line per node, showing each
    /// node's edge label and whether it is a leaf (with its suffix start)
    /// or internal (with its string-depth).
    pub fn print_tree(&self) -> Result<String> {
        struct Printer {
            text: std::sync::Arc<dyn crate::text::TextSource>,
            text_len: usize,
            out: String,
        }
        impl Visitor for Printer {
            fn visit(&mut self, _offset: i64, depth: i64, node: &Node, is_leaf: bool) {
                let indent = "  ".repeat(depth.max(0) as usize / 4 + 1);
                let label = if node.parent == crate::layout::NULL {
                    String::from("(root)")
                } else {
                    let end = if node.end == i64::MAX {
                        self.text_len as i64
                    } else {
                        node.end
                    };
                    let start = node.start.min(end) as usize;
                    let end = end.max(node.start) as usize;
                    match self.text.slice(start, end) {
                        Ok(units) => String::from_utf16_lossy(&units),
                        Err(_) => String::from("<err>"),
                    }
                };
                if is_leaf {
                    let start = self.text_len as i64 - depth;
                    let _ = writeln!(self.out, "{indent}\"{label}\" (leaf, suffix@{start})");
                } else {
                    let _ = writeln!(self.out, "{indent}\"{label}\" (depth={depth})");
                }
            }
        }

        let mut printer = Printer {
            text: self.text_arc(),
            text_len: self.text_len()?,
            out: String::new(),
        };
        self.traverse(&mut printer)?;
        Ok(printer.out)
    }

    /// Count leaves in the subtree rooted at `offset`. Uses `rayon` to
    /// fan out across top-level subtrees when the `parallel` feature is on
    /// and the node has enough children to make that worthwhile.
    pub fn count_leaves(&self, offset: i64) -> Result<u64> {
        let text_len = self.text_len()? as i64;
        self.count_leaves_from(offset, text_len)
    }

    #[cfg(feature = "parallel")]
    fn count_leaves_from(&self, offset: i64, text_len: i64) -> Result<u64> {
        use rayon::prelude::*;
        let node = self.read_node(offset)?;
        if node.is_leaf() {
            return Ok(1);
        }
        let children = self.all_children(&node)?;
        if children.len() < 8 {
            return children
                .iter()
                .try_fold(0u64, |acc, e| Ok(acc + self.count_leaves_from(e.child_offset, text_len)?));
        }
        children
            .par_iter()
            .map(|e| self.count_leaves_from(e.child_offset, text_len))
            .try_reduce(|| 0u64, |a, b| Ok(a + b))
    }

    #[cfg(not(feature = "parallel"))]
    fn count_leaves_from(&self, offset: i64, text_len: i64) -> Result<u64> {
        let node = self.read_node(offset)?;
        if node.is_leaf() {
            return Ok(1);
        }
        let mut total = 0u64;
        for entry in self.all_children(&node)? {
            total += self.count_leaves_from(entry.child_offset, text_len)?;
        }
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{Builder, BuilderOptions};
    use crate::storage::heap::HeapStorage;
    use crate::storage::StorageProvider;
    use crate::text::owned::OwnedText;
    use std::sync::Arc;

    fn build_tree(s: &str) -> Tree {
        let units: Vec<u16> = s.encode_utf16().collect();
        let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
        let out = Builder::new(units.clone(), BuilderOptions::default())
            .unwrap()
            .build(&storage)
            .unwrap();
        let header = out.header();
        let text: Arc<dyn crate::text::TextSource> = Arc::new(OwnedText::new(units));
        Tree::new(storage, text, header)
    }

    #[test]
    fn print_tree_mentions_every_leaf_label() {
        let tree = build_tree("banana");
        let dump = tree.print_tree().unwrap();
        assert!(dump.contains("leaf"));
        assert!(!dump.is_empty());
    }

    #[test]
    fn count_leaves_matches_root_leaf_count() {
        let tree = build_tree("mississippi");
        let total = tree.count_leaves(tree.header().root_offset).unwrap();
        assert_eq!(total, tree.leaf_count().unwrap() as u64);
    }

    struct Counter(usize);
    impl Visitor for Counter {
        fn visit(&mut self, _offset: i64, _depth: i64, _node: &Node, _is_leaf: bool) {
            self.0 += 1;
        }
    }

    #[test]
    fn traverse_visits_node_count_nodes() {
        let tree = build_tree("abcabc");
        let mut counter = Counter(0);
        tree.traverse(&mut counter).unwrap();
        assert_eq!(counter.0 as u32, tree.node_count().unwrap());
    }

    struct DepthRecorder {
        depth_by_offset: std::collections::HashMap<i64, i64>,
        root_offset: i64,
    }
    impl Visitor for DepthRecorder {
        fn visit(&mut self, offset: i64, depth: i64, _node: &Node, _is_leaf: bool) {
            self.depth_by_offset.insert(offset, depth);
            if depth == 0 && offset != self.root_offset {
                // only recorded for assertion below
            }
        }
    }

    struct PathRecorder {
        path: Vec<u16>,
        max_depth_seen: usize,
    }
    impl Visitor for PathRecorder {
        fn visit(&mut self, _offset: i64, _depth: i64, _node: &Node, _is_leaf: bool) {
            self.max_depth_seen = self.max_depth_seen.max(self.path.len());
        }
        fn enter(&mut self, key: u16) {
            self.path.push(key);
        }
        fn exit(&mut self) {
            self.path.pop();
        }
    }

    #[test]
    fn enter_and_exit_keep_the_path_stack_balanced() {
        let tree = build_tree("banana");
        let mut rec = PathRecorder { path: Vec::new(), max_depth_seen: 0 };
        tree.traverse(&mut rec).unwrap();
        assert!(rec.path.is_empty());
        assert!(rec.max_depth_seen > 0);
    }

    #[test]
    fn root_and_its_direct_children_report_depth_zero() {
        let tree = build_tree("banana");
        let root_offset = tree.header().root_offset;
        let root = tree.read_node(root_offset).unwrap();
        let mut rec = DepthRecorder {
            depth_by_offset: std::collections::HashMap::new(),
            root_offset,
        };
        tree.traverse(&mut rec).unwrap();

        assert_eq!(rec.depth_by_offset[&root_offset], 0);
        for entry in tree.all_children(&root).unwrap() {
            assert_eq!(rec.depth_by_offset[&entry.child_offset], 0);
        }
    }
}
