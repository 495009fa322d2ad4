//! Source → topic layout.
//!
//! A topic is a named set of sources. The layout file is TOML:
//!
//! ```toml
//! [topics]
//! science = ["arxiv", "nature"]
//! tech = ["arxiv", "hn"]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::corpus::ShardId;
use crate::error::{Result, ShardselError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardLayout {
    #[serde(default)]
    topics: BTreeMap<ShardId, BTreeSet<ShardId>>,
}

impl ShardLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a layout file; a missing file yields an empty layout.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no layout file, topics disabled");
            return Ok(Self::new());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml(&raw)
            .map_err(|e| ShardselError::Config(format!("{}: {e}", path.display())))
    }

    pub fn from_toml(raw: &str) -> Result<Self> {
        let layout: Self =
            toml::from_str(raw).map_err(|e| ShardselError::Config(format!("layout: {e}")))?;
        if let Some((topic, _)) = layout.topics.iter().find(|(_, m)| m.is_empty()) {
            return Err(ShardselError::Config(format!("topic {topic} has no sources")));
        }
        Ok(layout)
    }

    /// Add `source` to `topic`.
    pub fn assign(&mut self, topic: impl Into<ShardId>, source: impl Into<ShardId>) {
        self.topics
            .entry(topic.into())
            .or_default()
            .insert(source.into());
    }

    /// Topics containing `source`, in id order.
    pub fn topics_of<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a ShardId> + 'a {
        self.topics
            .iter()
            .filter(move |(_, members)| members.contains(source))
            .map(|(topic, _)| topic)
    }

    pub fn members(&self, topic: &str) -> Option<&BTreeSet<ShardId>> {
        self.topics.get(topic)
    }

    pub fn topics(&self) -> impl Iterator<Item = (&ShardId, &BTreeSet<ShardId>)> {
        self.topics.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.topics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.topics.len()
    }
}
