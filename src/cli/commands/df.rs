//! shardsel df - Document frequency of a term in one shard

use clap::Args;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_machine};
use crate::error::{Result, ShardselError};
use crate::stats::ShardSet;

#[derive(Args, Debug)]
pub struct DfArgs {
    /// Source (or topic, with --topics)
    pub shard: String,

    /// Term; analyzed the same way as queries
    pub term: String,

    /// Look up a topic instead of a source
    #[arg(long)]
    pub topics: bool,
}

#[derive(Debug, Serialize)]
struct DfReport<'a> {
    shard: &'a str,
    shard_set: ShardSet,
    term: String,
    df: u64,
}

pub fn run(ctx: &AppContext, args: &DfArgs) -> Result<()> {
    let engine = ctx.engine()?;
    let Some(term) = engine.analyzer().terms(&args.term).into_iter().next() else {
        return Err(ShardselError::InvalidArgument(format!(
            "'{}' contains no indexable term",
            args.term
        )));
    };

    let set = ShardSet::from_topics(args.topics);
    let df = engine.shard_document_frequency(set, &args.shard, &term)?;
    let report = DfReport {
        shard: &args.shard,
        shard_set: set,
        term,
        df,
    };

    if ctx.machine {
        return emit_machine(&report);
    }
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("{} / {}", report.shard, report.term))
        .kv("df", &report.df.to_string());
    emit_human(layout);
    Ok(())
}
