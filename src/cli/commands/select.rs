//! shardsel select - Rank shards for a query

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_machine};
use crate::error::Result;
use crate::selection::{SelectRequest, SelectionMethod};

#[derive(Args, Debug)]
pub struct SelectArgs {
    /// Query text
    pub query: String,

    /// Selection method: taily, crcs-exp, crcs-lin, ranks, votes, sizes
    #[arg(long, default_value = "taily")]
    pub method: SelectionMethod,

    /// Taily budget (candidate documents) or shard limit for sample methods
    #[arg(long, short)]
    pub budget: Option<f64>,

    /// Rank topics instead of sources
    #[arg(long)]
    pub topics: bool,

    /// Score floor for ranks
    #[arg(long)]
    pub min_score: Option<f64>,
}

pub fn run(ctx: &AppContext, args: &SelectArgs) -> Result<()> {
    let engine = ctx.engine()?;

    let mut request = SelectRequest::new(&args.query, args.method).with_topics(args.topics);
    request.budget = args.budget;
    request.min_score = args.min_score;
    let selection = engine.select_request(&request)?;

    if ctx.machine {
        return emit_machine(&selection);
    }

    let mut layout = HumanLayout::new();
    layout.title(&format!(
        "{} shards for \"{}\" ({})",
        selection.ranking.len(),
        args.query,
        selection.method
    ));
    layout.kv("terms", &selection.terms.join(" "));
    if let Some(branch) = selection.branch {
        layout.kv("estimate", branch.as_str());
    }
    layout.blank();
    if selection.ranking.is_empty() {
        layout.push_line(format!("  {}", "no shard matches the query".yellow()));
    }
    for (rank, entry) in selection.ranking.iter().enumerate() {
        layout.push_line(format!(
            "  {:>3}. {:<32} {:>12.4}",
            rank + 1,
            entry.shard.as_str().cyan(),
            entry.score
        ));
    }
    emit_human(layout);
    Ok(())
}
