use shardsel::ShardselError;
use shardsel::selection::SelectionEngine;
use shardsel::stats::{BuildManifest, ShardSet};
use shardsel::test_utils::{CorpusFixture, sample_corpus};

#[test]
fn rebuild_reports_corpus_shape() {
    let fixture = CorpusFixture::new();
    fixture.write_layout("[topics]\nprogramming = [\"rust\", \"python\"]\n");
    fixture.import(&sample_corpus());

    let report = fixture.rebuild();
    assert_eq!(report.num_docs, 9);
    assert_eq!(report.sources, 3);
    assert_eq!(report.topics, 1);
    assert!(report.total_terms > report.num_docs);
    assert!(report.num_terms > 0);
    assert_eq!(report.stats_dir, fixture.config.stats_dir());
}

#[test]
fn rebuild_writes_manifest_with_sizes() {
    let fixture = CorpusFixture::populated();
    let manifest_path = fixture.config.stats_dir().join("manifest.json");
    let manifest = BuildManifest::load(&manifest_path).unwrap();

    let sources = manifest.stats(ShardSet::Sources);
    assert_eq!(sources.size("rust"), Some(4));
    assert_eq!(sources.size("python"), Some(3));
    assert_eq!(sources.size("cooking"), Some(2));
    assert_eq!(sources.total_docs(), 9);

    let topics = manifest.stats(ShardSet::Topics);
    assert_eq!(topics.size("programming"), Some(7));
    assert_eq!(topics.size("food"), Some(2));
}

#[test]
fn rebuild_without_corpus_fails() {
    let fixture = CorpusFixture::new();
    let err = SelectionEngine::rebuild(&fixture.config).unwrap_err();
    assert!(matches!(err, ShardselError::BuildFailed(_)));
}

#[test]
fn rebuild_replaces_previous_statistics() {
    let fixture = CorpusFixture::populated();
    let before = fixture.engine();
    let term = before.analyzer().terms("compiler").remove(0);
    assert_eq!(before.document_frequency("rust", &term).unwrap(), 3);

    let mut extra = sample_corpus();
    extra.retain(|d| d.shard == "cooking");
    for doc in &mut extra {
        doc.id = format!("{}-x", doc.id);
        doc.shard = "rust".to_string();
        doc.body.push_str(" compiler");
    }
    fixture.import(&extra);
    fixture.rebuild();

    // Open engines keep their snapshot.
    assert_eq!(before.document_frequency("rust", &term).unwrap(), 3);

    let after = fixture.engine();
    assert_eq!(after.document_frequency("rust", &term).unwrap(), 5);
    assert_eq!(after.shard_stats(ShardSet::Sources).size("rust"), Some(6));
}

#[test]
fn rebuild_is_repeatable() {
    let fixture = CorpusFixture::populated();
    let first = fixture.engine().select("rust compiler", 10.0, "taily".parse().unwrap(), false);
    fixture.rebuild();
    let second = fixture.engine().select("rust compiler", 10.0, "taily".parse().unwrap(), false);

    assert_eq!(first.unwrap().ranking, second.unwrap().ranking);
}
