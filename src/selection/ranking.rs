//! Sorted shard → score result shared by every selection method.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::corpus::ShardId;

/// One shard of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShardScore {
    pub shard: ShardId,
    pub score: f64,
}

/// Shards sorted by descending score; equal scores keep insertion order.
///
/// Scores are never negative.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShardRanking {
    entries: Vec<ShardScore>,
}

impl ShardRanking {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_scores<I, S>(scores: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<ShardId>,
    {
        let mut entries: Vec<ShardScore> = scores
            .into_iter()
            .map(|(shard, score)| ShardScore {
                shard: shard.into(),
                score: if score.is_finite() { score.max(0.0) } else { 0.0 },
            })
            .collect();
        // sort_by is stable
        entries.sort_by(|a, b| b.score.total_cmp(&a.score));
        Self { entries }
    }

    /// Scale scores so they sum to `budget`.
    ///
    /// Returns `false` (and leaves every score at zero) when nothing scored.
    pub fn normalize(&mut self, budget: f64) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        let total = self.sum();
        if total <= 0.0 {
            warn!(
                shards = self.entries.len(),
                "every candidate shard scored zero, nothing selectable"
            );
            for entry in &mut self.entries {
                entry.score = 0.0;
            }
            return false;
        }
        let norm = budget / total;
        for entry in &mut self.entries {
            entry.score *= norm;
        }
        true
    }

    /// Keep the `k` best shards.
    pub fn truncate_top(&mut self, k: usize) {
        self.entries.truncate(k);
    }

    /// Keep shards while their score is at least `min_score`.
    pub fn truncate_below(&mut self, min_score: f64) {
        let keep = self
            .entries
            .iter()
            .position(|e| e.score < min_score)
            .unwrap_or(self.entries.len());
        self.entries.truncate(keep);
    }

    pub fn get(&self, shard: &str) -> Option<f64> {
        self.entries
            .iter()
            .find(|e| e.shard == shard)
            .map(|e| e.score)
    }

    pub fn sum(&self) -> f64 {
        self.entries.iter().map(|e| e.score).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ShardScore> {
        self.entries.iter()
    }

    pub fn shard_ids(&self) -> impl Iterator<Item = &ShardId> {
        self.entries.iter().map(|e| &e.shard)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_vec(self) -> Vec<ShardScore> {
        self.entries
    }
}

impl<'a> IntoIterator for &'a ShardRanking {
    type Item = &'a ShardScore;
    type IntoIter = std::slice::Iter<'a, ShardScore>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
