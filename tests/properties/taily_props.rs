use proptest::prelude::*;

use shardsel::selection::taily::{TailyRanker, TailyShard};
use shardsel::stats::{MemoryStatStore, TermMoments};

const TERM: &str = "rust";

fn moments(df: u64, mean: f64, var: f64) -> TermMoments {
    let n = df as f64;
    TermMoments {
        df,
        sum_f: n * mean,
        sum_f2: n * (var + mean * mean),
        min_f: 0.0,
    }
}

fn scaled(m: TermMoments, k: u64) -> TermMoments {
    TermMoments {
        df: m.df * k,
        sum_f: m.sum_f * k as f64,
        sum_f2: m.sum_f2 * k as f64,
        min_f: m.min_f,
    }
}

fn raw_score(shard: TermMoments, size: u64, budget: f64) -> f64 {
    let collection = MemoryStatStore::with_moments(10_000, [(TERM, moments(2_000, 2.0, 1.0))]);
    let store = MemoryStatStore::with_moments(size, [(TERM, shard)]);
    let other = MemoryStatStore::with_moments(500, [(TERM, moments(40, 1.5, 0.5))]);

    let shards = [
        TailyShard { id: "x", size, store: Some(&store) },
        TailyShard { id: "other", size: 500, store: Some(&other) },
    ];
    let ranker = TailyRanker::new(budget, 1e-10).unwrap();
    let estimate = ranker
        .estimate(
            &[TERM.to_string()],
            TailyShard { id: "", size: 10_000, store: Some(&collection) },
            &shards,
        )
        .unwrap();
    estimate.scores[0].1
}

proptest! {
    #[test]
    fn more_matching_documents_never_lower_the_score(
        df in 1u64..100,
        k in 1u64..=4,
        mean in 0.1f64..5.0,
        var in 0.01f64..2.0,
        budget in 1.0f64..500.0,
    ) {
        let size = 400;
        let base = moments(df, mean, var);
        let before = raw_score(base, size, budget);
        let after = raw_score(scaled(base, k), size, budget);

        prop_assert!(before.is_finite() && after.is_finite());
        prop_assert!(after >= before - 1e-9 * before.abs().max(1.0),
            "before {} after {}", before, after);
    }

    #[test]
    fn ranking_sums_to_budget(
        df in 1u64..100,
        mean in 0.1f64..5.0,
        var in 0.01f64..2.0,
        budget in 1.0f64..500.0,
    ) {
        let collection = MemoryStatStore::with_moments(10_000, [(TERM, moments(2_000, 2.0, 1.0))]);
        let store = MemoryStatStore::with_moments(400, [(TERM, moments(df, mean, var))]);
        let empty = MemoryStatStore::with_moments(300, []);
        let shards = [
            TailyShard { id: "x", size: 400, store: Some(&store) },
            TailyShard { id: "y", size: 300, store: Some(&empty) },
        ];
        let ranker = TailyRanker::new(budget, 1e-10).unwrap();
        let (_, ranking) = ranker
            .rank(
                &[TERM.to_string()],
                TailyShard { id: "", size: 10_000, store: Some(&collection) },
                &shards,
            )
            .unwrap();

        if ranking.sum() > 0.0 {
            prop_assert!((ranking.sum() - budget).abs() <= 1e-6 * budget);
        }
        prop_assert_eq!(ranking.get("y").unwrap_or(0.0), 0.0);
    }
}
