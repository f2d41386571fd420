// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! Header parsing and validation under adversarial input.
//!
//! `Header::read` runs on the first 80 bytes of every `.sfx` file before
//! anything else trusts a single offset in it. A crafted or truncated file
//! should only ever produce an `Err`, never a panic.

#![no_main]

use libfuzzer_sys::fuzz_target;
use sfxtree::layout::header::Header;

fuzz_target!(|data: &[u8]| {
    let mut cursor = data;
    if let Ok(header) = Header::read(&mut cursor) {
        // validate() is handed a total_size independent of the bytes that
        // produced the header: an attacker controls the file length as
        // freely as the header fields.
        for &total_size in &[0i64, data.len() as i64, i64::MAX] {
            let _ = header.validate(total_size);
        }
    }
});
