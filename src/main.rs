// Copyright 2025-present Harīṣh Tummalachērla
// SPDX-License-Identifier: Apache-2.0

//! sfxtree CLI: build, inspect, and query `.sfx` suffix tree files.
//!
//! ```bash
//! sfxtree build corpus.txt corpus.sfx
//! sfxtree inspect corpus.sfx
//! sfxtree find corpus.sfx needle
//! sfxtree lrs corpus.sfx
//! sfxtree lcs corpus.sfx other.txt
//! sfxtree traverse corpus.sfx
//! ```

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;

use sfxtree::factory::Factory;
use sfxtree::tree::Tree;

mod cli;
use cli::display::{
    count_colored, double_footer, double_header, format_size, row, section_bot, section_top,
    title,
};
use cli::{Cli, Commands};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Build { text_file, index_file } => build(&text_file, &index_file),
        Commands::Inspect { index_file } => inspect(&index_file),
        Commands::Find { index_file, pattern, min_length } => {
            find(&index_file, &pattern, min_length)
        }
        Commands::Lrs { index_file } => lrs(&index_file),
        Commands::Lcs { index_file, other_file } => lcs(&index_file, &other_file),
        Commands::Traverse { index_file } => traverse(&index_file),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn read_text_units(path: &Path) -> Result<Vec<u16>, String> {
    let content = fs::read_to_string(path).map_err(|e| format!("reading {}: {e}", path.display()))?;
    Ok(content.encode_utf16().collect())
}

fn build(text_file: &Path, index_file: &Path) -> Result<(), String> {
    let units = read_text_units(text_file)?;
    let options = sfxtree::builder::BuilderOptions {
        show_progress: true,
        ..sfxtree::builder::BuilderOptions::default()
    };
    Factory::create_with_options(units, Some(index_file), options)
        .map_err(|e| format!("building {}: {e}", index_file.display()))?;
    println!("wrote {}", index_file.display());
    Ok(())
}

fn load(index_file: &Path) -> Result<Tree, String> {
    Factory::load(index_file).map_err(|e| format!("loading {}: {e}", index_file.display()))
}

fn inspect(index_file: &Path) -> Result<(), String> {
    let tree = load(index_file)?;
    let header = tree.header();
    let node_count = tree.node_count().map_err(|e| format!("counting nodes: {e}"))?;
    let leaf_count = tree.leaf_count().map_err(|e| format!("counting leaves: {e}"))?;

    title("sfxtree index");
    double_header();
    section_top("HEADER");
    row(&format!(" version           {}", header.version));
    row(&format!(" root_offset       {}", header.root_offset));
    row(&format!(" transition_offset {}", header.transition_offset));
    row(&format!(" size              {}", format_size(header.size as usize)));
    row(&format!(" text_offset       {}", header.text_offset));
    row(&format!(" text_len          {} code units", header.text_len));
    row(&format!(" node_count        {}", count_colored(node_count as usize)));
    row(&format!(" leaf_count        {}", count_colored(leaf_count as usize)));
    row(&format!(" deepest_offset    {}", header.deepest_offset));
    section_bot();
    double_footer();
    Ok(())
}

fn find(index_file: &Path, pattern: &str, min_length: Option<usize>) -> Result<(), String> {
    let tree = load(index_file)?;
    let units: Vec<u16> = pattern.encode_utf16().collect();

    if let Some(min_length) = min_length {
        let anchors = tree
            .find_exact_match_anchors(&units, min_length)
            .map_err(|e| format!("searching: {e}"))?;
        println!("anchors: {}", anchors.len());
        for anchor in &anchors {
            println!(
                "  query[{}..{}+{}] -> {:?}",
                anchor.query_start,
                anchor.query_start,
                anchor.length,
                anchor.text_positions
            );
        }
        return Ok(());
    }

    let occurrences = tree.find_all_occurrences(&units).map_err(|e| format!("searching: {e}"))?;
    println!("count: {}", occurrences.len());
    println!("positions: {occurrences:?}");
    Ok(())
}

fn lrs(index_file: &Path) -> Result<(), String> {
    let tree = load(index_file)?;
    let units = tree
        .longest_repeated_substring()
        .map_err(|e| format!("computing LRS: {e}"))?;
    println!("{}", String::from_utf16_lossy(&units));
    Ok(())
}

fn lcs(index_file: &Path, other_file: &Path) -> Result<(), String> {
    let tree = load(index_file)?;
    let other = read_text_units(other_file)?;
    let units = tree
        .longest_common_substring(&other)
        .map_err(|e| format!("computing LCS: {e}"))?;
    println!("{}", String::from_utf16_lossy(&units));
    Ok(())
}

fn traverse(index_file: &Path) -> Result<(), String> {
    let tree = load(index_file)?;
    let dump = tree.print_tree().map_err(|e| format!("printing tree: {e}"))?;
    print!("{dump}");
    Ok(())
}
