//! Criterion benchmarks for the per-query selection paths.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use shardsel::config::Config;
use shardsel::corpus::{CorpusDocument, CorpusIndex, QueryAnalyzer, SampleHit, ShardLayout};
use shardsel::selection::sample::SampleParams;
use shardsel::selection::{SelectionEngine, SelectionMethod, ShardRanking};
use shardsel::stats::{MemoryStatStore, ShardSet, ShardStats, StatsCatalog, TermMoments};

const TERMS: [&str; 4] = ["rust", "compil", "borrow", "async"];

fn moments(seed: u64) -> TermMoments {
    let df = 5 + seed % 200;
    let mean = 1.0 + (seed % 7) as f64 * 0.3;
    let var = 0.2 + (seed % 5) as f64 * 0.1;
    TermMoments {
        df,
        sum_f: df as f64 * mean,
        sum_f2: df as f64 * (var + mean * mean),
        min_f: 0.05,
    }
}

fn catalog(shards: u64) -> StatsCatalog {
    let mut total = TermMoments::default();
    let mut per_shard = Vec::new();
    for s in 0..shards {
        let terms: Vec<(&str, TermMoments)> = TERMS
            .iter()
            .enumerate()
            .map(|(t, term)| (*term, moments(s * 31 + t as u64)))
            .collect();
        for (_, m) in &terms {
            total.merge(m);
        }
        per_shard.push((format!("shard-{s:04}"), terms));
    }

    let size = 1_000;
    let collection: Vec<(&str, TermMoments)> = TERMS.iter().map(|t| (*t, total)).collect();
    let mut catalog = StatsCatalog::new(
        Arc::new(MemoryStatStore::with_moments(size * shards, collection)),
        size * shards,
    );
    for (id, terms) in per_shard {
        catalog = catalog.with_shard(
            ShardSet::Sources,
            id,
            size,
            Arc::new(MemoryStatStore::with_moments(size, terms)),
        );
    }
    catalog
}

// =============================================================================
// Taily
// =============================================================================

fn taily_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("taily");

    for shards in [10u64, 100, 1000] {
        let engine = SelectionEngine::from_parts(
            catalog(shards),
            ShardLayout::new(),
            QueryAnalyzer::new(),
            None,
            &Config::default(),
        )
        .unwrap();

        group.throughput(Throughput::Elements(shards));
        group.bench_with_input(BenchmarkId::new("shards", shards), &engine, |b, engine| {
            b.iter(|| {
                engine
                    .select(black_box("rust borrow async"), 50.0, SelectionMethod::Taily, false)
                    .unwrap()
            })
        });
    }

    group.finish();
}

// =============================================================================
// Sample strategies
// =============================================================================

fn sample_strategy_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("sample_strategies");

    let hits: Vec<SampleHit> = (0..1000)
        .map(|rank| SampleHit {
            doc_id: format!("d{rank}"),
            shard: format!("shard-{:03}", rank % 97),
            score: 1000.0 - rank as f32,
            rank,
        })
        .collect();
    let full = ShardStats::from_sizes((0..97).map(|s| (format!("shard-{s:03}"), 1_000 + s * 10)));
    let sample = ShardStats::from_sizes((0..97).map(|s| (format!("shard-{s:03}"), 10 + s % 13)));
    let params = SampleParams::default();

    group.throughput(Throughput::Elements(hits.len() as u64));
    for method in SelectionMethod::all() {
        let Some(selector) = method.selector(&params) else {
            continue;
        };
        group.bench_function(method.name(), |b| {
            b.iter(|| {
                let scores = selector.rank(black_box(&hits), &full);
                let scores = selector.normalize(scores, &sample, &full);
                let mut ranking = ShardRanking::from_scores(scores);
                ranking.truncate_top(10);
                ranking
            })
        });
    }

    group.finish();
}

// =============================================================================
// Sample index search
// =============================================================================

fn sample_search_benchmarks(c: &mut Criterion) {
    let index = CorpusIndex::open_in_memory(&QueryAnalyzer::new()).unwrap();
    let words = ["rust", "compiler", "borrow", "async", "python", "bread", "tokio", "cargo"];
    let docs: Vec<CorpusDocument> = (0..5_000)
        .map(|i| {
            let body = (0..12).map(|j| words[(i * 7 + j * 3) % words.len()]).collect::<Vec<_>>();
            CorpusDocument::new(format!("d{i}"), format!("shard-{}", i % 50), body.join(" "))
        })
        .collect();
    index.add_documents(&docs).unwrap();
    index.commit().unwrap();

    c.bench_function("sample_search_top100", |b| {
        b.iter(|| index.search_sample(black_box("rust compiler"), 100).unwrap())
    });
}

criterion_group!(
    benches,
    taily_benchmarks,
    sample_strategy_benchmarks,
    sample_search_benchmarks
);
criterion_main!(benches);
