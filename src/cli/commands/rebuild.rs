//! shardsel rebuild - Rebuild term statistics

use clap::Args;
use colored::Colorize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_machine};
use crate::error::Result;
use crate::selection::SelectionEngine;

#[derive(Args, Debug)]
pub struct RebuildArgs {
    /// Override the Dirichlet smoothing parameter for this build
    #[arg(long)]
    pub mu: Option<f64>,
}

pub fn run(ctx: &AppContext, args: &RebuildArgs) -> Result<()> {
    let mut config = ctx.config.clone();
    if let Some(mu) = args.mu {
        config.taily.mu = mu;
    }

    let spinner = ctx.progress().spinner("Building term statistics");
    let report = SelectionEngine::rebuild(&config)?;
    spinner.finish("statistics rebuilt");

    if ctx.machine {
        return emit_machine(&report);
    }
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("{} Term statistics rebuilt", "✓".green()))
        .kv("directory", &report.stats_dir.display().to_string())
        .kv("documents", &report.num_docs.to_string())
        .kv("terms", &report.num_terms.to_string())
        .kv("sources", &report.sources.to_string())
        .kv("topics", &report.topics.to_string())
        .kv("elapsed", &format!("{} ms", report.elapsed.as_millis()));
    emit_human(layout);
    Ok(())
}
