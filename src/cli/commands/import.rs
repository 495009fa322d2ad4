//! shardsel import - Load JSONL documents into an index
//!
//! Each line is `{"id": ..., "shard": ..., "title"?: ..., "body": ...}`.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use clap::Args;
use colored::Colorize;
use serde::Serialize;

use crate::app::AppContext;
use crate::cli::output::{HumanLayout, emit_human, emit_machine};
use crate::corpus::{CorpusDocument, CorpusIndex, QueryAnalyzer};
use crate::error::{Result, ShardselError};

const BATCH_SIZE: usize = 1_000;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSONL file of documents
    pub file: PathBuf,

    /// Load into the centralized sample index instead of the corpus
    #[arg(long)]
    pub sample: bool,

    /// Remove existing documents first
    #[arg(long)]
    pub clear: bool,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    index: PathBuf,
    imported: usize,
    total_docs: u64,
}

pub fn run(ctx: &AppContext, args: &ImportArgs) -> Result<()> {
    let docs = read_documents(&args.file)?;
    let index_dir = if args.sample {
        ctx.config.sample_dir()
    } else {
        ctx.config.index_dir()
    };

    let index = CorpusIndex::open(&index_dir, &QueryAnalyzer::new())?;
    if args.clear {
        index.clear()?;
    }

    let mut progress = ctx.progress().progress(docs.len() as u64, "Importing documents");
    for batch in docs.chunks(BATCH_SIZE) {
        index.add_documents(batch)?;
        progress.inc(batch.len() as u64);
    }
    index.commit()?;
    progress.finish("import complete");

    let report = ImportReport {
        index: index_dir,
        imported: docs.len(),
        total_docs: index.num_docs(),
    };

    if ctx.machine {
        return emit_machine(&report);
    }
    let mut layout = HumanLayout::new();
    layout
        .title(&format!("{} Imported {} documents", "✓".green(), report.imported))
        .kv("index", &report.index.display().to_string())
        .kv("total docs", &report.total_docs.to_string());
    emit_human(layout);
    Ok(())
}

/// Parse a JSONL file, skipping blank lines.
pub fn read_documents(path: &Path) -> Result<Vec<CorpusDocument>> {
    let file = std::fs::File::open(path)?;
    let mut docs = Vec::new();
    for (lineno, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let doc: CorpusDocument = serde_json::from_str(&line).map_err(|e| {
            ShardselError::InvalidArgument(format!(
                "{}:{}: invalid document: {e}",
                path.display(),
                lineno + 1
            ))
        })?;
        if doc.shard.is_empty() {
            return Err(ShardselError::InvalidArgument(format!(
                "{}:{}: document {} has no shard",
                path.display(),
                lineno + 1,
                doc.id
            )));
        }
        docs.push(doc);
    }
    Ok(docs)
}
