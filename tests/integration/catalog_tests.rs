use shardsel::ShardselError;
use shardsel::selection::SelectionMethod;
use shardsel::stats::{ShardSet, StatsCatalog};
use shardsel::test_utils::{CorpusFixture, sample_corpus};

#[test]
fn missing_statistics_open_empty() {
    let fixture = CorpusFixture::new();
    let catalog = StatsCatalog::open(&fixture.config.stats_dir()).unwrap();
    assert!(catalog.collection().is_none());
    assert_eq!(catalog.collection_size(), 0);
    assert!(catalog.shards(ShardSet::Sources).stats().is_empty());
}

#[test]
fn catalog_opens_every_store() {
    let fixture = CorpusFixture::populated();
    let catalog = StatsCatalog::open(&fixture.config.stats_dir()).unwrap();

    assert_eq!(catalog.collection_size(), 9);
    assert!(catalog.collection().is_some());
    assert_eq!(catalog.shards(ShardSet::Sources).opened(), 3);
    assert_eq!(catalog.shards(ShardSet::Topics).opened(), 2);
}

#[test]
fn document_frequency_per_shard_and_topic() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();
    let term = engine.analyzer().terms("compiler").remove(0);

    assert_eq!(engine.document_frequency("rust", &term).unwrap(), 3);
    assert_eq!(engine.document_frequency("python", &term).unwrap(), 1);
    assert_eq!(engine.document_frequency("cooking", &term).unwrap(), 0);
    assert_eq!(engine.topic_document_frequency("programming", &term).unwrap(), 4);
    assert_eq!(engine.topic_document_frequency("food", &term).unwrap(), 0);
}

#[test]
fn unknown_shard_is_an_error() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();
    let err = engine.document_frequency("haskell", "monad").unwrap_err();
    assert!(matches!(err, ShardselError::UnknownShard(ref s) if s == "haskell"));
}

#[test]
fn estimate_cost_sums_frequencies() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();
    let terms = engine.analyzer().terms("rust compiler");
    let shards = vec!["rust".to_string(), "python".to_string()];

    // rust: 4 + 3, python: 0 + 1
    assert_eq!(engine.estimate_cost(ShardSet::Sources, &shards, &terms).unwrap(), 8);
}

#[test]
fn sample_sizes_follow_layout() {
    let fixture = CorpusFixture::populated();
    let engine = fixture.engine();

    let sources = engine.sample_stats(ShardSet::Sources);
    assert_eq!(sources.size("rust"), Some(4));
    let topics = engine.sample_stats(ShardSet::Topics);
    assert_eq!(topics.size("programming"), Some(7));
    assert_eq!(topics.size("food"), Some(2));
    assert_eq!(sources.total_docs(), sample_corpus().len() as u64);
}

#[test]
fn sample_methods_need_a_sample_index() {
    let fixture = CorpusFixture::new();
    fixture.import(&sample_corpus());
    fixture.rebuild();
    let engine = fixture.engine();

    let err = engine.select("rust", 5.0, SelectionMethod::RankS, false).unwrap_err();
    assert!(matches!(err, ShardselError::SampleIndexUnavailable(_)));
    // Taily only needs statistics.
    assert!(engine.select("rust", 5.0, SelectionMethod::Taily, false).is_ok());
}
