use std::path::{Path, PathBuf};

use tempfile::TempDir;

use crate::config::Config;
use crate::corpus::{CorpusDocument, CorpusIndex, QueryAnalyzer};
use crate::selection::SelectionEngine;
use crate::stats::BuildReport;

/// Small labelled corpus: three sources, one of them off-topic.
pub fn sample_corpus() -> Vec<CorpusDocument> {
    let docs = [
        ("r1", "rust", "rust compiler borrow checker lifetimes"),
        ("r2", "rust", "rust cargo crates compiler"),
        ("r3", "rust", "async rust tokio runtime"),
        ("r4", "rust", "rust traits generics compiler errors"),
        ("p1", "python", "python interpreter bytecode compiler"),
        ("p2", "python", "python packaging pip wheels"),
        ("p3", "python", "python asyncio event loop"),
        ("c1", "cooking", "bread dough yeast flour"),
        ("c2", "cooking", "pasta sauce tomato basil"),
    ];
    docs.into_iter()
        .map(|(id, shard, body)| CorpusDocument::new(id, shard, body))
        .collect()
}

/// Layout grouping the programming sources into one topic.
pub const SAMPLE_LAYOUT: &str = r#"
[topics]
programming = ["rust", "python"]
food = ["cooking"]
"#;

/// Test fixture providing an isolated data root.
pub struct CorpusFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
    pub config: Config,
}

impl CorpusFixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join("data");
        std::fs::create_dir_all(&root).expect("Failed to create data root");
        let config = Config::with_root(&root);

        println!("[FIXTURE] Created data root: {}", root.display());

        Self {
            temp_dir,
            root,
            config,
        }
    }

    /// Corpus, sample and layout from [`sample_corpus`], statistics built.
    pub fn populated() -> Self {
        let fixture = Self::new();
        let docs = sample_corpus();
        fixture.write_layout(SAMPLE_LAYOUT);
        fixture.import(&docs);
        fixture.import_sample(&docs);
        fixture.rebuild();
        fixture
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn import(&self, docs: &[CorpusDocument]) {
        write_index(&self.config.index_dir(), docs);
    }

    pub fn import_sample(&self, docs: &[CorpusDocument]) {
        write_index(&self.config.sample_dir(), docs);
    }

    pub fn write_layout(&self, toml: &str) {
        std::fs::write(self.config.layout_file(), toml).expect("Failed to write layout");
    }

    pub fn rebuild(&self) -> BuildReport {
        SelectionEngine::rebuild(&self.config).expect("Failed to rebuild statistics")
    }

    pub fn engine(&self) -> SelectionEngine {
        SelectionEngine::open(&self.config).expect("Failed to open engine")
    }
}

impl Default for CorpusFixture {
    fn default() -> Self {
        Self::new()
    }
}

fn write_index(path: &Path, docs: &[CorpusDocument]) {
    let index = CorpusIndex::open(path, &QueryAnalyzer::new()).expect("Failed to open index");
    index.add_documents(docs).expect("Failed to add documents");
    index.commit().expect("Failed to commit index");
    println!("[FIXTURE] Indexed {} documents into {}", docs.len(), path.display());
}
