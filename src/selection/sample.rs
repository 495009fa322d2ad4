//! Content-sample selection strategies.
//!
//! Each strategy turns the ranked hits of a centralized sample index search
//! into per-shard scores. Only shards that appear in the hits are scored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::corpus::{SampleHit, ShardId, ShardLayout};
use crate::stats::sizes::ShardStats;

/// How a strategy's ranking is cut.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    /// Keep the caller's top-k shards.
    TopK,
    /// Keep shards while their score is at least the floor.
    ScoreFloor(f64),
}

/// Parameters of the sample strategies.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SampleParams {
    pub crcs_linear_window: f64,
    pub crcs_exp_alpha: f64,
    pub crcs_exp_beta: f64,
    pub ranks_base: f64,
    pub ranks_min_score: f64,
    pub votes_k: usize,
}

impl Default for SampleParams {
    fn default() -> Self {
        Self {
            crcs_linear_window: 100.0,
            crcs_exp_alpha: 1.2,
            crcs_exp_beta: 0.28,
            ranks_base: 5.0,
            ranks_min_score: 1e-4,
            votes_k: 50,
        }
    }
}

/// A sample-based shard scorer.
pub trait ResourceSelector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Score shards from sample hits. `full` holds full shard sizes.
    fn rank(&self, hits: &[SampleHit], full: &ShardStats) -> BTreeMap<ShardId, f64>;

    /// Adjust raw scores for shard sizes; identity by default.
    fn normalize(
        &self,
        scores: BTreeMap<ShardId, f64>,
        _sample: &ShardStats,
        _full: &ShardStats,
    ) -> BTreeMap<ShardId, f64> {
        scores
    }

    fn cutoff(&self) -> Cutoff {
        Cutoff::TopK
    }
}

/// Sum a per-rank weight into each hit's shard.
fn sum_weights(hits: &[SampleHit], weight: impl Fn(usize) -> f64) -> BTreeMap<ShardId, f64> {
    let mut scores = BTreeMap::new();
    for hit in hits {
        *scores.entry(hit.shard.clone()).or_insert(0.0) += weight(hit.rank);
    }
    scores
}

/// `score · C_i / (C_max · S_i)`: scale CRCS scores by how much of the
/// shard the sample covers.
fn crcs_normalize(
    mut scores: BTreeMap<ShardId, f64>,
    sample: &ShardStats,
    full: &ShardStats,
) -> BTreeMap<ShardId, f64> {
    let c_max = full.max_size() as f64;
    if c_max <= 0.0 {
        return scores;
    }
    for (shard, score) in &mut scores {
        match (full.size(shard), sample.size(shard)) {
            (Some(c_i), Some(s_i)) if s_i > 0 => {
                *score *= c_i as f64 / (c_max * s_i as f64);
            }
            _ => {}
        }
    }
    scores
}

/// CRCS with linear rank decay: `max(0, γ − r)`.
#[derive(Debug, Clone, Copy)]
pub struct CrcsLinear {
    pub window: f64,
}

impl ResourceSelector for CrcsLinear {
    fn name(&self) -> &'static str {
        "crcs-lin"
    }

    fn rank(&self, hits: &[SampleHit], _full: &ShardStats) -> BTreeMap<ShardId, f64> {
        sum_weights(hits, |r| (self.window - r as f64).max(0.0))
    }

    fn normalize(
        &self,
        scores: BTreeMap<ShardId, f64>,
        sample: &ShardStats,
        full: &ShardStats,
    ) -> BTreeMap<ShardId, f64> {
        crcs_normalize(scores, sample, full)
    }
}

/// CRCS with exponential rank decay: `α · e^(−β·r)`.
#[derive(Debug, Clone, Copy)]
pub struct CrcsExp {
    pub alpha: f64,
    pub beta: f64,
}

impl ResourceSelector for CrcsExp {
    fn name(&self) -> &'static str {
        "crcs-exp"
    }

    fn rank(&self, hits: &[SampleHit], _full: &ShardStats) -> BTreeMap<ShardId, f64> {
        sum_weights(hits, |r| self.alpha * (-self.beta * r as f64).exp())
    }

    fn normalize(
        &self,
        scores: BTreeMap<ShardId, f64>,
        sample: &ShardStats,
        full: &ShardStats,
    ) -> BTreeMap<ShardId, f64> {
        crcs_normalize(scores, sample, full)
    }
}

/// Best rank per shard, scored `B^(−r_best)`.
#[derive(Debug, Clone, Copy)]
pub struct RankS {
    pub base: f64,
    pub min_score: f64,
}

impl ResourceSelector for RankS {
    fn name(&self) -> &'static str {
        "ranks"
    }

    fn rank(&self, hits: &[SampleHit], _full: &ShardStats) -> BTreeMap<ShardId, f64> {
        let mut best: BTreeMap<ShardId, usize> = BTreeMap::new();
        for hit in hits {
            best.entry(hit.shard.clone())
                .and_modify(|r| *r = (*r).min(hit.rank))
                .or_insert(hit.rank);
        }
        best.into_iter()
            .map(|(shard, r)| (shard, self.base.powf(-(r as f64))))
            .collect()
    }

    fn cutoff(&self) -> Cutoff {
        Cutoff::ScoreFloor(self.min_score)
    }
}

/// One vote per top-k hit.
#[derive(Debug, Clone, Copy)]
pub struct Votes {
    pub k: usize,
}

impl ResourceSelector for Votes {
    fn name(&self) -> &'static str {
        "votes"
    }

    fn rank(&self, hits: &[SampleHit], _full: &ShardStats) -> BTreeMap<ShardId, f64> {
        let mut scores = BTreeMap::new();
        for hit in hits.iter().filter(|h| h.rank < self.k) {
            *scores.entry(hit.shard.clone()).or_insert(0.0) += 1.0;
        }
        scores
    }
}

/// Size prior: every shard in the sample scores its full size.
#[derive(Debug, Clone, Copy)]
pub struct Sizes;

impl ResourceSelector for Sizes {
    fn name(&self) -> &'static str {
        "sizes"
    }

    fn rank(&self, hits: &[SampleHit], full: &ShardStats) -> BTreeMap<ShardId, f64> {
        hits.iter()
            .map(|hit| {
                let size = full.size(&hit.shard).unwrap_or(0);
                (hit.shard.clone(), size as f64)
            })
            .collect()
    }
}

/// Re-label source hits with every topic containing their source.
///
/// A hit whose source belongs to no topic is dropped; ranks are kept.
pub fn attribute_to_topics(hits: &[SampleHit], layout: &ShardLayout) -> Vec<SampleHit> {
    hits.iter()
        .flat_map(|hit| {
            layout.topics_of(&hit.shard).map(|topic| SampleHit {
                shard: topic.clone(),
                ..hit.clone()
            })
        })
        .collect()
}

/// Per-topic sample document counts derived from per-source counts.
pub fn topic_sample_stats(sources: &ShardStats, layout: &ShardLayout) -> ShardStats {
    let mut stats = ShardStats::new();
    for (topic, members) in layout.topics() {
        let size = members.iter().filter_map(|m| sources.size(m)).sum();
        stats.add(topic.clone(), size);
    }
    stats
}
