//! CLI module - Command-line interface definitions and handlers
//!
//! Uses clap v4 with derive macros for argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub mod commands;
pub mod output;
pub mod progress;

/// Shard selection over term statistics and a centralized sample index
#[derive(Parser, Debug)]
#[command(name = "shardsel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable machine-readable JSON output
    #[arg(long, short = 'm', global = true)]
    pub machine: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file path (default: ~/.config/shardsel/config.toml, then <root>/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Data root holding indexes and statistics
    #[arg(long, global = true, env = "SHARDSEL_ROOT", default_value = ".shardsel")]
    pub root: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load JSONL documents into the corpus or sample index
    Import(commands::import::ImportArgs),

    /// Rebuild term statistics from the corpus index
    Rebuild(commands::rebuild::RebuildArgs),

    /// Rank shards for a query
    Select(commands::select::SelectArgs),

    /// Document frequency of a term in a shard
    Df(commands::df::DfArgs),

    /// List shards and their sizes
    Shards(commands::shards::ShardsArgs),
}
