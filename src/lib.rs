// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! A persistent, arena-backed generalized suffix tree over UTF-16 text.
//!
//! The tree is built once, in memory or directly into a memory-mapped file,
//! by [`builder::Builder`]; once built it is read-only and every query on
//! [`tree::Tree`] is safe to call concurrently from any number of threads
//! with no external synchronization. [`factory::Factory`] is the entry
//! point that ties the two together and handles the on-disk header/footer.
//!
//! ```no_run
//! use sfxtree::factory::Factory;
//!
//! let text: Vec<u16> = "banana".encode_utf16().collect();
//! let tree = Factory::create(text, None).unwrap();
//! assert!(tree.contains(&"ana".encode_utf16().collect::<Vec<_>>()).unwrap());
//! ```

pub mod builder;
pub mod error;
pub mod factory;
pub mod layout;
pub mod storage;
pub mod text;
pub mod tree;

pub use error::{Result, SfxError};
pub use factory::Factory;
pub use tree::Tree;
