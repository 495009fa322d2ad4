//! shardsel shards - List shards with full and sample sizes

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_machine};
use crate::error::Result;
use crate::stats::ShardSet;

#[derive(Args, Debug)]
pub struct ShardsArgs {
    /// List topics instead of sources
    #[arg(long)]
    pub topics: bool,
}

#[derive(Debug, Serialize)]
struct ShardRow {
    shard: String,
    size: u64,
    sample_size: u64,
}

#[derive(Debug, Serialize)]
struct ShardsReport {
    shard_set: ShardSet,
    max_size: u64,
    total_docs: u64,
    shards: Vec<ShardRow>,
}

pub fn run(ctx: &AppContext, args: &ShardsArgs) -> Result<()> {
    let engine = ctx.engine()?;
    let set = ShardSet::from_topics(args.topics);
    let stats = engine.shard_stats(set);
    let sample = engine.sample_stats(set);

    let report = ShardsReport {
        shard_set: set,
        max_size: stats.max_size(),
        total_docs: stats.total_docs(),
        shards: stats
            .iter()
            .map(|(id, size)| ShardRow {
                shard: id.clone(),
                size,
                sample_size: sample.size(id).unwrap_or(0),
            })
            .collect(),
    };

    if ctx.machine {
        return emit_machine(&report);
    }
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("{} {set}", report.shards.len()))
        .kv("total docs", &report.total_docs.to_string())
        .kv("largest", &report.max_size.to_string())
        .blank();
    if report.shards.is_empty() {
        layout.push_line(format!("  {}", "no statistics; run `shardsel rebuild`".yellow()));
    }
    for row in &report.shards {
        layout.push_line(format!(
            "  {:<32} {:>10} {:>8}",
            row.shard.as_str().cyan(),
            row.size,
            format!("({})", row.sample_size).as_str().dimmed()
        ));
    }
    emit_human(layout);
    Ok(())
}
