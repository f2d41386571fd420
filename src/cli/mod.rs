// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! CLI definitions for the sfxtree command-line interface.
//!
//! Six subcommands: `build` writes a `.sfx` index from a text file, `inspect`
//! prints its header and summary statistics, `find`/`lrs`/`lcs` run queries
//! against an already-built index, and `traverse` dumps its structure.

pub mod display;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sfxtree", about = "Persistent suffix tree builder and query tool", version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a .sfx index from a UTF-8 text file
    Build {
        /// Path to the source text
        text_file: PathBuf,
        /// Path the index is written to
        index_file: PathBuf,
    },
    /// Print the header fields and summary statistics of a .sfx file
    Inspect { index_file: PathBuf },
    /// Count and list occurrences of a pattern
    Find {
        index_file: PathBuf,
        pattern: String,
        /// Only report a match if at least this many code units are shared
        /// with some occurrence (exact-match anchor mode)
        #[arg(long)]
        min_length: Option<usize>,
    },
    /// Print the longest repeated substring
    Lrs { index_file: PathBuf },
    /// Print the longest substring shared with another text file
    Lcs {
        index_file: PathBuf,
        other_file: PathBuf,
    },
    /// Print a structural dump of the tree
    Traverse { index_file: PathBuf },
}
