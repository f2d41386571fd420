// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Child-array entry decoding under adversarial input.
//!
//! `NodeLayout::read_node`/`read_entry` are the only places a byte offset
//! pulled from disk turns into a value trusted enough to seek by. Arbitrary
//! bytes, and arbitrary offsets and indices into them, must only ever
//! produce an `Err` from out-of-bounds reads, never a panic.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sfxtree::layout::{CompactLayout, LargeLayout, NodeLayout};
use sfxtree::storage::heap::HeapStorage;

#[derive(Debug, Arbitrary)]
struct Input {
    large: bool,
    offset: i64,
    index: u32,
    bytes: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let storage = HeapStorage::from_built(input.bytes);

    if input.large {
        let layout = LargeLayout::new();
        let _ = layout.read_node(&storage, input.offset);
        let _ = layout.read_entry(&storage, input.offset, input.index);
    } else {
        let layout = CompactLayout::new();
        let _ = layout.read_node(&storage, input.offset);
        let _ = layout.read_entry(&storage, input.offset, input.index);
    }
});
