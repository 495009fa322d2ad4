use std::collections::BTreeSet;

use proptest::prelude::*;

use shardsel::corpus::SampleHit;
use shardsel::selection::sample::{Cutoff, ResourceSelector, SampleParams};
use shardsel::selection::{SelectionMethod, ShardRanking};
use shardsel::stats::ShardStats;

const SHARDS: [&str; 5] = ["a", "b", "c", "d", "e"];

fn arb_hits() -> impl Strategy<Value = Vec<SampleHit>> {
    prop::collection::vec(0usize..SHARDS.len(), 0..60).prop_map(|labels| {
        labels
            .into_iter()
            .enumerate()
            .map(|(rank, s)| SampleHit {
                doc_id: format!("d{rank}"),
                shard: SHARDS[s].to_string(),
                score: 100.0 - rank as f32,
                rank,
            })
            .collect()
    })
}

fn stats(hits: &[SampleHit], scale: u64) -> (ShardStats, ShardStats) {
    let mut sample = ShardStats::new();
    for hit in hits {
        sample.add(hit.shard.clone(), 1);
    }
    let full = ShardStats::from_sizes(sample.iter().map(|(id, n)| (id.clone(), n * scale)));
    (sample, full)
}

fn selectors() -> Vec<Box<dyn ResourceSelector>> {
    let params = SampleParams::default();
    SelectionMethod::all()
        .filter_map(|m| m.selector(&params))
        .collect()
}

proptest! {
    #[test]
    fn scored_shards_come_from_hits(hits in arb_hits(), scale in 1u64..50) {
        let seen: BTreeSet<&str> = hits.iter().map(|h| h.shard.as_str()).collect();
        let (sample, full) = stats(&hits, scale);

        for selector in selectors() {
            let scores = selector.rank(&hits, &full);
            let scores = selector.normalize(scores, &sample, &full);
            for (shard, score) in &scores {
                prop_assert!(seen.contains(shard.as_str()), "{} scored {}", selector.name(), shard);
                prop_assert!(score.is_finite() && *score >= 0.0);
            }
        }
    }

    #[test]
    fn ranks_respects_floor(hits in arb_hits(), floor in 1e-6f64..1.0) {
        let params = SampleParams { ranks_min_score: floor, ..SampleParams::default() };
        let selector = SelectionMethod::RankS.selector(&params).unwrap();
        let (_, full) = stats(&hits, 1);

        let Cutoff::ScoreFloor(cut) = selector.cutoff() else {
            return Err(TestCaseError::fail("ranks must cut by score"));
        };
        let mut ranking = ShardRanking::from_scores(selector.rank(&hits, &full));
        ranking.truncate_below(cut);

        let values: Vec<f64> = ranking.iter().map(|s| s.score).collect();
        prop_assert!(values.iter().all(|v| *v >= floor));
        prop_assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn votes_count_hits_within_k(hits in arb_hits(), k in 0usize..80) {
        let params = SampleParams { votes_k: k, ..SampleParams::default() };
        let selector = SelectionMethod::Votes.selector(&params).unwrap();
        let (_, full) = stats(&hits, 1);

        let total: f64 = selector.rank(&hits, &full).values().sum();
        prop_assert_eq!(total as usize, hits.len().min(k));
    }
}
