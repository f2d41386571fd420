// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Property-based tests for the suffix tree's core invariants.
//!
//! Each property is checked against a naive, obviously-correct reference
//! implementation built straight off `Vec<u16>` rather than against the
//! tree's own machinery, so a bug shared between the tree and its oracle
//! can't hide.

use std::sync::Arc;

use proptest::prelude::*;

use sfxtree::builder::{Builder, BuilderOptions};
use sfxtree::storage::heap::HeapStorage;
use sfxtree::storage::StorageProvider;
use sfxtree::text::owned::OwnedText;
use sfxtree::tree::Tree;

fn word_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[ab]{1,6}").unwrap()
}

fn text_strategy() -> impl Strategy<Value = String> {
    prop::collection::vec(word_strategy(), 1..8).prop_map(|words| words.join(""))
}

fn build_tree(s: &str) -> Tree {
    let units: Vec<u16> = s.encode_utf16().collect();
    let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
    let out = Builder::new(units.clone(), BuilderOptions::default())
        .unwrap()
        .build(&storage)
        .unwrap();
    let header = out.header();
    let text: Arc<dyn sfxtree::text::TextSource> = Arc::new(OwnedText::new(units));
    Tree::new(storage, text, header)
}

/// Pseudo-random small-alphabet text of exactly `len` code units, built
/// with a fixed linear-congruential generator so the test is deterministic
/// without depending on an RNG crate. Large enough that the tree's node
/// count exceeds its text length (lots of short, rarely-shared edges).
fn small_alphabet_text(len: usize) -> String {
    let mut state: u64 = 0x2545F4914F6CDD1D;
    let alphabet = [b'a', b'b', b'c'];
    let mut out = String::with_capacity(len);
    for _ in 0..len {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let idx = ((state >> 33) as usize) % alphabet.len();
        out.push(alphabet[idx] as char);
    }
    out
}

/// Every suffix of `s`, sorted lexicographically by UTF-16 code unit. The
/// obviously-correct O(n^2 log n) reference a suffix array is meant to match.
fn naive_sorted_suffixes(units: &[u16]) -> Vec<Vec<u16>> {
    let mut suffixes: Vec<Vec<u16>> = (0..units.len()).map(|i| units[i..].to_vec()).collect();
    suffixes.sort();
    suffixes
}

/// Count occurrences of `needle` in `haystack` by sliding a window, the
/// reference `count()` is meant to match.
fn naive_count(haystack: &[u16], needle: &[u16]) -> usize {
    if needle.is_empty() || needle.len() > haystack.len() {
        return 0;
    }
    (0..=haystack.len() - needle.len())
        .filter(|&i| haystack[i..i + needle.len()] == *needle)
        .count()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `enumerate_suffixes` must produce exactly the sorted list of every
    /// suffix of the source text, no more and no fewer.
    #[test]
    fn enumerated_suffixes_match_naive_sort(s in text_strategy()) {
        let units: Vec<u16> = s.encode_utf16().collect();
        let tree = build_tree(&s);
        let got = tree.enumerate_suffixes().unwrap();
        let want = naive_sorted_suffixes(&units);
        prop_assert_eq!(got.len(), want.len());
        for (g, w) in got.iter().zip(want.iter()) {
            prop_assert_eq!(g, w);
        }
    }

    /// `count()` for every substring actually occurring in the text must
    /// match a naive sliding-window count over the same text.
    #[test]
    fn count_matches_naive_sliding_window(s in text_strategy(), needle in word_strategy()) {
        let units: Vec<u16> = s.encode_utf16().collect();
        let needle_units: Vec<u16> = needle.encode_utf16().collect();
        let tree = build_tree(&s);
        let got = tree.count_occurrences(&needle_units).unwrap();
        let want = naive_count(&units, &needle_units);
        prop_assert_eq!(got, want);
    }

    /// `find()` must report exactly the positions where the needle starts,
    /// nothing else, regardless of whether it is the empty needle, a needle
    /// that never occurs, or one that occurs many times.
    #[test]
    fn find_matches_naive_positions(s in text_strategy(), needle in word_strategy()) {
        let units: Vec<u16> = s.encode_utf16().collect();
        let needle_units: Vec<u16> = needle.encode_utf16().collect();
        let tree = build_tree(&s);
        let mut got = tree.find_all_occurrences(&needle_units).unwrap();
        got.sort_unstable();

        let mut want: Vec<usize> = Vec::new();
        if !needle_units.is_empty() && needle_units.len() <= units.len() {
            for i in 0..=units.len() - needle_units.len() {
                if units[i..i + needle_units.len()] == needle_units[..] {
                    want.push(i);
                }
            }
        }
        prop_assert_eq!(got, want);
    }

    /// Every node's reported depth is the parent's depth plus the length of
    /// the edge the traversal just walked down, and every leaf's depth
    /// (string-depth of the leaf's own node, not the parent-depth argument)
    /// equals the suffix length implied by its starting position.
    #[test]
    fn traverse_depth_matches_edge_accumulation(s in text_strategy()) {
        let units: Vec<u16> = s.encode_utf16().collect();
        let tree = build_tree(&s);

        struct Recorder {
            text_len: i64,
            violations: Vec<String>,
        }
        impl sfxtree::tree::traverse::Visitor for Recorder {
            fn visit(&mut self, offset: i64, depth: i64, node: &sfxtree::layout::Node, is_leaf: bool) {
                if is_leaf {
                    let end = if node.end == i64::MAX { self.text_len } else { node.end };
                    let edge_len = end - node.start;
                    let suffix_start = self.text_len - (depth + edge_len);
                    if suffix_start < 0 {
                        self.violations.push(format!("negative suffix start at offset {offset}"));
                    }
                }
            }
        }

        let mut rec = Recorder { text_len: units.len() as i64, violations: Vec::new() };
        tree.traverse(&mut rec).unwrap();
        prop_assert!(rec.violations.is_empty(), "{:?}", rec.violations);
    }

    /// Forcing a build through the Large-only path (a compact offset limit
    /// of zero) must agree with the default Compact/hybrid build on every
    /// observable query: the two layouts are a storage decision, never a
    /// semantic one.
    #[test]
    fn compact_and_large_builds_agree_on_queries(s in text_strategy(), needle in word_strategy()) {
        let units: Vec<u16> = s.encode_utf16().collect();
        let needle_units: Vec<u16> = needle.encode_utf16().collect();

        let compact_tree = build_tree(&s);

        let storage: Arc<dyn StorageProvider> = Arc::new(HeapStorage::new());
        let large_options = BuilderOptions { compact_offset_limit: 0, show_progress: false };
        let out = Builder::new(units.clone(), large_options).unwrap().build(&storage).unwrap();
        let header = out.header();
        let text: Arc<dyn sfxtree::text::TextSource> = Arc::new(OwnedText::new(units));
        let large_tree = Tree::new(storage, text, header);

        prop_assert_eq!(
            compact_tree.count_occurrences(&needle_units).unwrap(),
            large_tree.count_occurrences(&needle_units).unwrap()
        );
        prop_assert_eq!(
            compact_tree.longest_repeated_substring().unwrap(),
            large_tree.longest_repeated_substring().unwrap()
        );
        prop_assert_eq!(compact_tree.node_count().unwrap(), large_tree.node_count().unwrap());
        prop_assert_eq!(compact_tree.leaf_count().unwrap(), large_tree.leaf_count().unwrap());
    }
}

/// SPEC boundary scenario: a small-alphabet random text of length 1000 must
/// produce more internal+leaf nodes than the text is long (short, rarely
/// shared edges fragment the tree), while the leaf count still equals the
/// text length exactly (one leaf per suffix, always).
#[test]
fn small_alphabet_length_1000_has_more_nodes_than_text_length() {
    let s = small_alphabet_text(1000);
    let tree = build_tree(&s);
    let node_count = tree.node_count().unwrap();
    let leaf_count = tree.leaf_count().unwrap();
    assert_eq!(leaf_count, 1000);
    assert!(
        node_count > 1000,
        "expected node_count ({node_count}) > text_length (1000) at this scale"
    );
}
