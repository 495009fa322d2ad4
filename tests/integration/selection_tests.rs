use shardsel::ShardselError;
use shardsel::selection::{SelectRequest, SelectionMethod, TailyBranch};
use shardsel::stats::ShardSet;
use shardsel::test_utils::CorpusFixture;

const EPS: f64 = 1e-6;

#[test]
fn taily_ranks_matching_source_first() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let selection = engine.select("compiler", 50.0, SelectionMethod::Taily, false).unwrap();
    assert_eq!(selection.shard_set, ShardSet::Sources);
    assert_eq!(selection.branch, Some(TailyBranch::Gamma));

    let ids: Vec<_> = selection.ranking.shard_ids().cloned().collect();
    assert_eq!(ids[0], "rust");
    assert_eq!(ids[1], "python");
    assert!((selection.ranking.sum() - 50.0).abs() < EPS);
    assert!(selection.ranking.get("cooking").unwrap_or(0.0).abs() < EPS);

    let rust = selection.ranking.get("rust").unwrap();
    let python = selection.ranking.get("python").unwrap();
    // python holds a single matching document, so it falls back to its mean.
    assert!(rust > python && python > 0.0, "rust={rust} python={python}");
}

#[test]
fn taily_over_topics() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let selection = engine.select("compiler", 10.0, SelectionMethod::Taily, true).unwrap();
    assert_eq!(selection.shard_set, ShardSet::Topics);
    assert!((selection.ranking.get("programming").unwrap() - 10.0).abs() < EPS);
    assert!(selection.ranking.get("food").unwrap_or(0.0).abs() < EPS);
}

#[test]
fn unmatched_query_selects_nothing() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let selection = engine.select("haskell monads", 50.0, SelectionMethod::Taily, false).unwrap();
    assert_eq!(selection.branch, Some(TailyBranch::NoMatch));
    assert!(selection.ranking.is_empty());

    let selection = engine.select("", 50.0, SelectionMethod::Taily, false).unwrap();
    assert!(selection.terms.is_empty());
    assert!(selection.ranking.is_empty());
}

#[test]
fn empty_statistics_select_nothing() {
    let fixture = CorpusFixture::new();
    let engine = fixture.engine();
    let selection = engine.select("rust", 50.0, SelectionMethod::Taily, false).unwrap();
    assert!(selection.ranking.is_empty());
}

#[test]
fn sample_methods_prefer_matching_source() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    for method in [
        SelectionMethod::CrcsExponential,
        SelectionMethod::CrcsLinear,
        SelectionMethod::RankS,
        SelectionMethod::Votes,
    ] {
        let selection = engine.select("python asyncio", 10.0, method, false).unwrap();
        assert!(selection.branch.is_none());
        let top = selection.ranking.shard_ids().next().cloned();
        assert_eq!(top.as_deref(), Some("python"), "method {method}");
    }
}

#[test]
fn sample_methods_accept_query_syntax_as_text() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    for method in SelectionMethod::all().filter(|m| m.uses_sample()) {
        let selection = engine.select("rust: compiler", 10.0, method, false).unwrap();
        assert_eq!(
            selection.ranking.shard_ids().next().map(String::as_str),
            Some("rust"),
            "method {method}"
        );

        let selection = engine.select("\"python asyncio", 10.0, method, false).unwrap();
        assert_eq!(
            selection.ranking.shard_ids().next().map(String::as_str),
            Some("python"),
            "method {method}"
        );

        // No document holds these terms.
        let selection = engine.select("what (is", 10.0, method, false).unwrap();
        assert!(selection.ranking.is_empty(), "method {method}");
    }
}

#[test]
fn sizes_method_orders_by_full_size() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let selection = engine.select("compiler", 10.0, SelectionMethod::Sizes, false).unwrap();
    let ranked: Vec<_> = selection.ranking.iter().map(|s| (s.shard.as_str(), s.score)).collect();
    assert_eq!(ranked, vec![("rust", 4.0), ("python", 3.0)]);
}

#[test]
fn sample_limit_truncates() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let selection = engine.select("compiler", 1.9, SelectionMethod::Votes, false).unwrap();
    assert_eq!(selection.ranking.len(), 1);

    let selection = engine.select("compiler", 0.0, SelectionMethod::Votes, false).unwrap();
    assert!(selection.ranking.is_empty());

    let err = engine.select("compiler", -1.0, SelectionMethod::Votes, false).unwrap_err();
    assert!(matches!(err, ShardselError::InvalidArgument(_)));
}

#[test]
fn ranks_floor_drops_low_scores() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let request = SelectRequest::new("compiler", SelectionMethod::RankS).with_min_score(0.5);
    let selection = engine.select_request(&request).unwrap();
    assert_eq!(selection.ranking.len(), 1);
    assert!((selection.ranking.iter().next().unwrap().score - 1.0).abs() < EPS);
}

#[test]
fn sample_methods_over_topics() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let selection = engine.select("pasta tomato", 5.0, SelectionMethod::Votes, true).unwrap();
    let top = selection.ranking.shard_ids().next().cloned();
    assert_eq!(top.as_deref(), Some("food"));
    assert!(selection.ranking.get("rust").is_none());
}

#[test]
fn negative_taily_budget_is_rejected() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();
    let err = engine.select("rust", -5.0, SelectionMethod::Taily, false).unwrap_err();
    assert!(matches!(err, ShardselError::InvalidArgument(_)));
}

#[test]
fn unknown_method_name() {
    let err = "cori".parse::<SelectionMethod>().unwrap_err();
    assert!(matches!(err, ShardselError::UnknownMethod(_)));
}
