// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Longest common substring against a foreign (non-indexed) string.
//!
//! There is no suffix tree over `other`, so this is a greedy matching-
//! statistics walk: for each starting position in `other`, descend from
//! the root as far as the tree and `other` agree, then keep the longest
//! such run. This is `O(|other| · average match length)`, not the linear
//! matching-statistics algorithm a suffix-link-aware walk would give —
//! acceptable here since `other` is a caller-supplied query string, not
//! part of the persisted index.

use super::{Occurrence, Tree};
use crate::error::Result;

/// The best single match: the substring itself, and where it starts in
/// each string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcsInfo {
    pub substring: Vec<u16>,
    pub start_in_this: Occurrence,
    pub start_in_other: usize,
}

/// The best match plus every place it occurs in both strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcsOccurrences {
    pub substring: Vec<u16>,
    pub positions_in_this: Vec<Occurrence>,
    pub positions_in_other: Vec<usize>,
}

/// One maximal exact match of a substring of `query` against this text,
/// at least `min_length` characters long.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExactMatchAnchor {
    pub query_start: usize,
    pub length: usize,
    pub text_positions: Vec<Occurrence>,
}

impl Tree {
    /// Greedily match `pattern` against the tree starting at the root,
    /// stopping at the first mismatch, the first character with no
    /// matching child, or once `pattern` is exhausted. Returns how many
    /// characters matched and the node reached — which, even on a
    /// mismatch partway down an edge, is the child node whose subtree's
    /// leaves are exactly the occurrences of the matched prefix, since a
    /// compressed-trie edge never branches before its own end.
    fn greedy_match(&self, pattern: &[u16]) -> Result<(usize, i64)> {
        let text_len = self.text.len()? as i64;
        let mut node_offset = self.header.root_offset;
        let mut node = self.read_node(node_offset)?;
        let mut consumed = 0usize;

        while consumed < pattern.len() {
            let entry = match self.find_child(&node, pattern[consumed])? {
                Some(e) => e,
                None => break,
            };
            let child = self.read_node(entry.child_offset)?;
            let edge_len = self.edge_len(&child, text_len) as usize;
            let edge_start = child.start as usize;
            let remaining = pattern.len() - consumed;
            let take = remaining.min(edge_len);

            let mut matched_here = 0usize;
            for i in 0..take {
                let text_char = self.text.char_at(edge_start + i)?;
                if text_char != pattern[consumed + i] {
                    break;
                }
                matched_here += 1;
            }
            consumed += matched_here;
            node_offset = entry.child_offset;
            node = child;

            if matched_here < edge_len {
                // Either a mismatch inside the edge, or `pattern` ran out
                // partway down it — either way, nothing more to match.
                break;
            }
        }

        Ok((consumed, node_offset))
    }

    /// The longest substring common to this text and `other`. Empty if the
    /// two strings share no characters at all.
    pub fn longest_common_substring(&self, other: &[u16]) -> Result<Vec<u16>> {
        Ok(self
            .longest_common_substring_info(other)?
            .map(|info| info.substring)
            .unwrap_or_default())
    }

    /// The longest common substring plus one occurrence of it in each
    /// string (ties broken by the earliest starting position in `other`).
    pub fn longest_common_substring_info(&self, other: &[u16]) -> Result<Option<LcsInfo>> {
        let best = self.best_match(other)?;
        let Some((start_in_other, length, node_offset)) = best else {
            return Ok(None);
        };
        let text_len = self.text.len()? as usize;
        let mut starts = Vec::new();
        self.collect_leaf_starts(node_offset, text_len, &mut starts)?;
        let start_in_this = starts.into_iter().min().unwrap_or(0);
        Ok(Some(LcsInfo {
            substring: other[start_in_other..start_in_other + length].to_vec(),
            start_in_this,
            start_in_other,
        }))
    }

    /// The longest common substring plus every position it occurs at in
    /// both this text and `other`.
    pub fn longest_common_substring_occurrences(&self, other: &[u16]) -> Result<Option<LcsOccurrences>> {
        let best = self.best_match(other)?;
        let Some((start_in_other, length, node_offset)) = best else {
            return Ok(None);
        };
        let text_len = self.text.len()? as usize;
        let substring = other[start_in_other..start_in_other + length].to_vec();

        let mut positions_in_this = Vec::new();
        self.collect_leaf_starts(node_offset, text_len, &mut positions_in_this)?;
        positions_in_this.sort_unstable();

        let positions_in_other = find_all(other, &substring);

        Ok(Some(LcsOccurrences {
            substring,
            positions_in_this,
            positions_in_other,
        }))
    }

    /// The longest maximal exact match of any substring of `query` that is
    /// at least `min_length` characters long, one per distinct starting
    /// position in `query`. Used by higher-level alignment/anchoring tools
    /// built on top of this index; this crate only emits the anchors.
    pub fn find_exact_match_anchors(&self, query: &[u16], min_length: usize) -> Result<Vec<ExactMatchAnchor>> {
        let text_len = self.text.len()? as usize;
        let mut anchors = Vec::new();
        for start in 0..query.len() {
            let (matched, node_offset) = self.greedy_match(&query[start..])?;
            if matched < min_length {
                continue;
            }
            let mut text_positions = Vec::new();
            self.collect_leaf_starts(node_offset, text_len, &mut text_positions)?;
            text_positions.sort_unstable();
            anchors.push(ExactMatchAnchor {
                query_start: start,
                length: matched,
                text_positions,
            });
        }
        Ok(anchors)
    }

    /// Longest match over every starting position of `other`, returning
    /// `(start_in_other, length, node_offset)` of the best one. Ties
    /// broken by the earliest starting position.
    fn best_match(&self, other: &[u16]) -> Result<Option<(usize, usize, i64)>> {
        let mut best: Option<(usize, usize, i64)> = None;
        for start in 0..other.len() {
            let (matched, node_offset) = self.greedy_match(&other[start..])?;
            if matched == 0 {
                continue;
            }
            if best.map(|(_, len, _)| matched > len).unwrap_or(true) {
                best = Some((start, matched, node_offset));
            }
        }
        Ok(best)
    }
}

/// Every starting index of `needle` within `haystack`. `needle` is
/// typically short (a matched LCS substring), so a naive scan is fine.
fn find_all(haystack: &[u16], needle: &[u16]) -> Vec<usize> {
    if needle.is_empty() || needle.len() > haystack.len() {
        return Vec::new();
    }
    (0..=haystack.len() - needle.len())
        .filter(|&i| &haystack[i..i + needle.len()] == needle)
        .collect()
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

    fn u16s(s: &str) -> Vec<u16> {
        s.encode_utf16().collect()
    }

    #[test]
    fn finds_shared_middle_substring() {
        let tree = build_tree("abcdef");
        let lcs = tree.longest_common_substring(&u16s("xxcdefzz")).unwrap();
        assert_eq!(lcs, u16s("cdef"));
    }

    #[test]
    fn no_overlap_yields_empty() {
        let tree = build_tree("abcdef");
        let lcs = tree.longest_common_substring(&u16s("xyz")).unwrap();
        assert!(lcs.is_empty());
    }

    #[test]
    fn info_reports_positions_in_both_strings() {
        let tree = build_tree("banana");
        let info = tree
            .longest_common_substring_info(&u16s("zzananaqq"))
            .unwrap()
            .unwrap();
        assert_eq!(info.substring, u16s("anana"));
        assert_eq!(info.start_in_this, 1);
        assert_eq!(info.start_in_other, 2);
    }

    #[test]
    fn occurrences_enumerates_every_match_in_both_strings() {
        let tree = build_tree("abcabc");
        let occ = tree
            .longest_common_substring_occurrences(&u16s("xxabcyyabcz"))
            .unwrap()
            .unwrap();
        assert_eq!(occ.substring, u16s("abc"));
        let mut this_pos = occ.positions_in_this.clone();
        this_pos.sort_unstable();
        assert_eq!(this_pos, vec![0, 3]);
        let mut other_pos = occ.positions_in_other.clone();
        other_pos.sort_unstable();
        assert_eq!(other_pos, vec![2, 7]);
    }

    #[test]
    fn exact_match_anchors_respect_minimum_length() {
        let tree = build_tree("mississippi");
        let anchors = tree.find_exact_match_anchors(&u16s("ississi"), 4).unwrap();
        assert!(anchors.iter().any(|a| a.length >= 4));
        assert!(anchors.iter().all(|a| a.length >= 4));
    }

    #[test]
    fn anchors_below_minimum_length_are_excluded() {
        let tree = build_tree("banana");
        let anchors = tree.find_exact_match_anchors(&u16s("xyz"), 1).unwrap();
        assert!(anchors.is_empty());
    }
}
