//! Corpus access: the tantivy-backed collection and sample indexes, the
//! shared query analyzer, and the source → topic layout.
//!
//! ```text
//! ┌──────────────────────┐        ┌──────────────────────┐
//! │  corpus index (full) │        │ sample index (CSI)   │
//! │  walked by rebuild() │        │ searched per query   │
//! └──────────────────────┘        └──────────────────────┘
//!            │                               │
//!            ▼                               ▼
//!    term statistics stores         content-sample strategies
//! ```

pub mod analyzer;
pub mod index;
pub mod layout;

use serde::{Deserialize, Serialize};

pub use analyzer::QueryAnalyzer;
pub use index::CorpusIndex;
pub use layout::ShardLayout;

/// Opaque shard identifier: a source name or a topic name.
pub type ShardId = String;

/// A document as imported into a corpus or sample index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpusDocument {
    pub id: String,
    /// Source shard the document belongs to.
    pub shard: ShardId,
    #[serde(default)]
    pub title: String,
    pub body: String,
}

impl CorpusDocument {
    pub fn new(id: impl Into<String>, shard: impl Into<ShardId>, body: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            shard: shard.into(),
            title: String::new(),
            body: body.into(),
        }
    }
}

/// One ranked result from the centralized sample index.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleHit {
    pub doc_id: String,
    pub shard: ShardId,
    pub score: f32,
    /// 0-based position in the result list.
    pub rank: usize,
}
