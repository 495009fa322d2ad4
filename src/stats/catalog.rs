//! On-disk layout of a statistics directory and read-only access to it.
//!
//! ```text
//! <stats_dir>/manifest.json
//! <stats_dir>/collection/stats.db
//! <stats_dir>/sources/<url-encoded id>/stats.db
//! <stats_dir>/topics/<url-encoded id>/stats.db
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::corpus::ShardId;
use crate::error::{Result, ShardselError};
use crate::stats::sizes::ShardStats;
use crate::stats::sqlite::SqliteStatStore;
use crate::stats::store::StatStore;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const STORE_FILE: &str = "stats.db";
pub const FORMAT_VERSION: u32 = 1;

/// Which family of shards a request addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShardSet {
    Sources,
    Topics,
}

impl ShardSet {
    pub const fn from_topics(use_topics: bool) -> Self {
        if use_topics { Self::Topics } else { Self::Sources }
    }

    pub const fn dir_name(self) -> &'static str {
        match self {
            Self::Sources => "sources",
            Self::Topics => "topics",
        }
    }
}

impl fmt::Display for ShardSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Paths inside one statistics directory.
#[derive(Debug, Clone)]
pub struct StatsPaths {
    root: PathBuf,
}

impl StatsPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn collection_store(&self) -> PathBuf {
        self.root.join("collection").join(STORE_FILE)
    }

    pub fn shard_store(&self, set: ShardSet, shard: &str) -> PathBuf {
        self.root
            .join(set.dir_name())
            .join(urlencoding::encode(shard).as_ref())
            .join(STORE_FILE)
    }
}

/// Topic entry of the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicEntry {
    pub size: u64,
    pub members: Vec<ShardId>,
}

/// Summary of a completed build; the persisted Shard Size Tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub format_version: u32,
    pub built_at: DateTime<Utc>,
    pub num_docs: u64,
    pub total_terms: u64,
    pub mu: f64,
    pub sources: BTreeMap<ShardId, u64>,
    #[serde(default)]
    pub topics: BTreeMap<ShardId, TopicEntry>,
}

impl BuildManifest {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let manifest: Self = serde_json::from_str(&raw)?;
        if manifest.format_version != FORMAT_VERSION {
            return Err(ShardselError::StatsUnavailable(format!(
                "manifest format {} is not supported (expected {FORMAT_VERSION}); rebuild statistics",
                manifest.format_version
            )));
        }
        Ok(manifest)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn source_stats(&self) -> ShardStats {
        ShardStats::from_sizes(self.sources.iter().map(|(id, n)| (id.clone(), *n)))
    }

    pub fn topic_stats(&self) -> ShardStats {
        ShardStats::from_sizes(self.topics.iter().map(|(id, t)| (id.clone(), t.size)))
    }

    pub fn stats(&self, set: ShardSet) -> ShardStats {
        match set {
            ShardSet::Sources => self.source_stats(),
            ShardSet::Topics => self.topic_stats(),
        }
    }
}

/// Sizes and stores of one shard set.
///
/// A shard listed in `stats` without a store matches nothing.
#[derive(Default, Clone)]
pub struct ShardStores {
    stats: ShardStats,
    stores: BTreeMap<ShardId, Arc<dyn StatStore>>,
}

impl fmt::Debug for ShardStores {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShardStores")
            .field("shards", &self.stats.len())
            .field("opened", &self.stores.len())
            .finish()
    }
}

impl ShardStores {
    pub fn new(stats: ShardStats) -> Self {
        Self {
            stats,
            stores: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, shard: impl Into<ShardId>, size: u64, store: Arc<dyn StatStore>) {
        let shard = shard.into();
        if !self.stats.contains(&shard) {
            self.stats.add(shard.clone(), size);
        }
        self.stores.insert(shard, store);
    }

    pub const fn stats(&self) -> &ShardStats {
        &self.stats
    }

    pub fn store(&self, shard: &str) -> Option<&dyn StatStore> {
        self.stores.get(shard).map(|s| &**s)
    }

    pub fn contains(&self, shard: &str) -> bool {
        self.stats.contains(shard)
    }

    /// Shards in id order with size and store.
    pub fn iter(&self) -> impl Iterator<Item = (&ShardId, u64, Option<&dyn StatStore>)> {
        self.stats
            .iter()
            .map(|(id, size)| (id, size, self.store(id)))
    }

    pub fn opened(&self) -> usize {
        self.stores.len()
    }
}

/// Every store of a statistics directory, opened for reading.
#[derive(Default, Clone)]
pub struct StatsCatalog {
    collection: Option<Arc<dyn StatStore>>,
    collection_size: u64,
    sources: ShardStores,
    topics: ShardStores,
    manifest: Option<BuildManifest>,
}

impl fmt::Debug for StatsCatalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StatsCatalog")
            .field("collection", &self.collection.is_some())
            .field("collection_size", &self.collection_size)
            .field("sources", &self.sources)
            .field("topics", &self.topics)
            .finish()
    }
}

impl StatsCatalog {
    /// A catalog without statistics; every query matches nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Assemble a catalog from stores built in-process.
    pub fn new(collection: Arc<dyn StatStore>, collection_size: u64) -> Self {
        Self {
            collection: Some(collection),
            collection_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_shard(
        mut self,
        set: ShardSet,
        shard: impl Into<ShardId>,
        size: u64,
        store: Arc<dyn StatStore>,
    ) -> Self {
        self.shards_mut(set).insert(shard, size, store);
        self
    }

    /// Open a statistics directory.
    ///
    /// A missing manifest yields an empty catalog. Stores that fail to open
    /// are logged and treated as holding no statistics.
    pub fn open(stats_dir: &Path) -> Result<Self> {
        let paths = StatsPaths::new(stats_dir);
        let manifest_path = paths.manifest();
        if !manifest_path.exists() {
            warn!(
                path = %stats_dir.display(),
                "no statistics manifest; run `shardsel rebuild`"
            );
            return Ok(Self::empty());
        }
        let manifest = BuildManifest::load(&manifest_path)?;

        let collection = open_tolerant(&paths.collection_store(), "collection");
        let mut sources = ShardStores::new(manifest.source_stats());
        let mut topics = ShardStores::new(manifest.topic_stats());

        for (set, stores) in [
            (ShardSet::Sources, &mut sources),
            (ShardSet::Topics, &mut topics),
        ] {
            let ids: Vec<ShardId> = stores.stats.shard_ids().cloned().collect();
            for id in ids {
                if let Some(store) = open_tolerant(&paths.shard_store(set, &id), &id) {
                    stores.stores.insert(id, store);
                }
            }
        }

        info!(
            sources = sources.opened(),
            topics = topics.opened(),
            docs = manifest.num_docs,
            "opened term statistics"
        );
        Ok(Self {
            collection,
            collection_size: manifest.num_docs,
            sources,
            topics,
            manifest: Some(manifest),
        })
    }

    pub fn collection(&self) -> Option<&dyn StatStore> {
        self.collection.as_deref()
    }

    pub const fn collection_size(&self) -> u64 {
        self.collection_size
    }

    pub const fn shards(&self, set: ShardSet) -> &ShardStores {
        match set {
            ShardSet::Sources => &self.sources,
            ShardSet::Topics => &self.topics,
        }
    }

    fn shards_mut(&mut self, set: ShardSet) -> &mut ShardStores {
        match set {
            ShardSet::Sources => &mut self.sources,
            ShardSet::Topics => &mut self.topics,
        }
    }

    pub const fn manifest(&self) -> Option<&BuildManifest> {
        self.manifest.as_ref()
    }
}

fn open_tolerant(path: &Path, label: &str) -> Option<Arc<dyn StatStore>> {
    match SqliteStatStore::open_read_only(path) {
        Ok(store) => {
            debug!(shard = label, "opened statistics store");
            Some(Arc::new(store))
        }
        Err(e) => {
            warn!(shard = label, error = %e, "statistics store unavailable, shard treated as empty");
            None
        }
    }
}
