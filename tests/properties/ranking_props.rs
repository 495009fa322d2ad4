use proptest::prelude::*;

use shardsel::selection::ShardRanking;

fn arb_scores() -> impl Strategy<Value = Vec<(String, f64)>> {
    prop::collection::btree_map(r"[a-z]{1,6}", 0.0f64..1_000.0, 1..20)
        .prop_map(|m| m.into_iter().collect())
}

proptest! {
    #[test]
    fn normalize_sums_to_budget(scores in arb_scores(), budget in 0.0f64..10_000.0) {
        prop_assume!(scores.iter().any(|(_, s)| *s > 1e-9));
        let mut ranking = ShardRanking::from_scores(scores);

        prop_assert!(ranking.normalize(budget));
        let tolerance = 1e-6 * budget.max(1.0);
        prop_assert!((ranking.sum() - budget).abs() <= tolerance,
            "sum {} budget {}", ranking.sum(), budget);
    }

    #[test]
    fn rankings_are_sorted_and_non_negative(
        scores in prop::collection::vec((r"[a-z]{1,4}", -10.0f64..10.0), 0..30)
    ) {
        let ranking = ShardRanking::from_scores(scores);
        let values: Vec<f64> = ranking.iter().map(|s| s.score).collect();

        prop_assert!(values.iter().all(|v| *v >= 0.0));
        prop_assert!(values.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn truncate_top_keeps_best(scores in arb_scores(), k in 0usize..25) {
        let full = ShardRanking::from_scores(scores.clone());
        let mut top = ShardRanking::from_scores(scores);
        top.truncate_top(k);

        prop_assert_eq!(top.len(), k.min(full.len()));
        let kept: Vec<_> = top.iter().cloned().collect();
        let prefix: Vec<_> = full.iter().take(k).cloned().collect();
        prop_assert_eq!(kept, prefix);
    }
}
