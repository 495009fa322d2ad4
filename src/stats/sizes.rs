//! Shard Size Tracker
//!
//! Document counts per shard for one shard set (sources or topics), with the
//! derived maximum and total.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::ShardId;

/// Document counts for a set of shards.
///
/// `total_docs` always equals the sum of `sizes`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardStats {
    sizes: BTreeMap<ShardId, u64>,
    max_size: u64,
    total_docs: u64,
}

impl ShardStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_sizes<I, S>(sizes: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<ShardId>,
    {
        let mut stats = Self::new();
        for (shard, size) in sizes {
            stats.add(shard, size);
        }
        stats
    }

    /// Add `count` documents to `shard`.
    pub fn add(&mut self, shard: impl Into<ShardId>, count: u64) {
        let size = self.sizes.entry(shard.into()).or_insert(0);
        *size += count;
        self.total_docs += count;
        self.max_size = self.max_size.max(*size);
    }

    pub fn size(&self, shard: &str) -> Option<u64> {
        self.sizes.get(shard).copied()
    }

    pub fn contains(&self, shard: &str) -> bool {
        self.sizes.contains_key(shard)
    }

    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    pub const fn total_docs(&self) -> u64 {
        self.total_docs
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Shards in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&ShardId, u64)> {
        self.sizes.iter().map(|(k, v)| (k, *v))
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = &ShardId> {
        self.sizes.keys()
    }
}
