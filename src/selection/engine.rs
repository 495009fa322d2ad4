//! Selection façade.
//!
//! Resolves a method name to the statistical ranker or a sample strategy,
//! runs it against the shared read-only state, and returns a uniform
//! [`Selection`].

use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Config, SampleConfig, TailyConfig};
use crate::corpus::{CorpusIndex, QueryAnalyzer, ShardId, ShardLayout};
use crate::error::{Result, ShardselError};
use crate::selection::SelectionMethod;
use crate::selection::ranking::ShardRanking;
use crate::selection::sample::{Cutoff, attribute_to_topics, topic_sample_stats};
use crate::selection::taily::{TailyBranch, TailyRanker, TailyShard};
use crate::stats::builder::{BuildReport, CorpusStatsBuilder};
use crate::stats::catalog::{ShardSet, StatsCatalog};
use crate::stats::sizes::ShardStats;
use crate::stats::store::document_frequency;

/// A selection call.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectRequest {
    pub query: String,
    pub method: SelectionMethod,
    /// Taily budget `n_c`, or the shard limit of a sample strategy.
    /// `None` uses the configured default.
    pub budget: Option<f64>,
    pub use_topics: bool,
    /// Score floor for RankS; `None` uses the configured floor.
    pub min_score: Option<f64>,
}

impl SelectRequest {
    pub fn new(query: impl Into<String>, method: SelectionMethod) -> Self {
        Self {
            query: query.into(),
            method,
            budget: None,
            use_topics: false,
            min_score: None,
        }
    }

    #[must_use]
    pub const fn with_budget(mut self, budget: f64) -> Self {
        self.budget = Some(budget);
        self
    }

    #[must_use]
    pub const fn with_topics(mut self, use_topics: bool) -> Self {
        self.use_topics = use_topics;
        self
    }

    #[must_use]
    pub const fn with_min_score(mut self, min_score: f64) -> Self {
        self.min_score = Some(min_score);
        self
    }
}

/// Result of one selection.
#[derive(Debug, Clone, Serialize)]
pub struct Selection {
    pub method: SelectionMethod,
    pub shard_set: ShardSet,
    /// Analyzed query terms, in first-seen order.
    pub terms: Vec<String>,
    /// Estimate used by Taily; absent for sample strategies.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<TailyBranch>,
    pub ranking: ShardRanking,
}

/// Shared read-only selection state.
pub struct SelectionEngine {
    catalog: StatsCatalog,
    layout: ShardLayout,
    analyzer: QueryAnalyzer,
    sample: Option<CorpusIndex>,
    sample_sizes: ShardStats,
    taily: TailyConfig,
    sample_config: SampleConfig,
}

impl std::fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("catalog", &self.catalog)
            .field("topics", &self.layout.len())
            .field("sample", &self.sample.is_some())
            .finish_non_exhaustive()
    }
}

impl SelectionEngine {
    /// Open statistics, layout and the sample index named by `config`.
    ///
    /// Missing statistics or a missing sample index are not fatal: the
    /// engine then matches nothing, or rejects sample methods.
    pub fn open(config: &Config) -> Result<Self> {
        let analyzer = QueryAnalyzer::new();
        let catalog = StatsCatalog::open(&config.stats_dir())?;

        // Topics recorded at build time win over the current layout file.
        let layout = match catalog.manifest() {
            Some(manifest) if !manifest.topics.is_empty() => {
                let mut layout = ShardLayout::new();
                for (topic, entry) in &manifest.topics {
                    for member in &entry.members {
                        layout.assign(topic.clone(), member.clone());
                    }
                }
                layout
            }
            _ => ShardLayout::load(&config.layout_file())?,
        };

        let sample = match CorpusIndex::open_existing(config.sample_dir(), &analyzer) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(error = %e, "sample index unavailable");
                None
            }
        };

        Self::from_parts(catalog, layout, analyzer, sample, config)
    }

    /// Assemble an engine from already-opened parts.
    pub fn from_parts(
        catalog: StatsCatalog,
        layout: ShardLayout,
        analyzer: QueryAnalyzer,
        sample: Option<CorpusIndex>,
        config: &Config,
    ) -> Result<Self> {
        let sample_sizes = match &sample {
            Some(index) => index.label_counts()?,
            None => ShardStats::new(),
        };
        Ok(Self {
            catalog,
            layout,
            analyzer,
            sample,
            sample_sizes,
            taily: config.taily.clone(),
            sample_config: config.sample.clone(),
        })
    }

    /// Rebuild the statistics directory from the corpus index.
    ///
    /// Already-open engines keep serving the previous statistics until
    /// they are reopened.
    pub fn rebuild(config: &Config) -> Result<BuildReport> {
        let analyzer = QueryAnalyzer::new();
        let index_dir = config.index_dir();
        let Some(index) = CorpusIndex::open_existing(&index_dir, &analyzer)? else {
            return Err(ShardselError::BuildFailed(format!(
                "no corpus index at {}",
                index_dir.display()
            )));
        };
        let layout = ShardLayout::load(&config.layout_file())?;
        CorpusStatsBuilder::new(&index, &layout)
            .with_mu(config.taily.mu)
            .build(&config.stats_dir())
    }

    pub const fn catalog(&self) -> &StatsCatalog {
        &self.catalog
    }

    pub const fn layout(&self) -> &ShardLayout {
        &self.layout
    }

    pub const fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    /// Full shard sizes of a shard set.
    pub const fn shard_stats(&self, set: ShardSet) -> &ShardStats {
        self.catalog.shards(set).stats()
    }

    /// Per-shard document counts of the sample index.
    pub fn sample_stats(&self, set: ShardSet) -> ShardStats {
        match set {
            ShardSet::Sources => self.sample_sizes.clone(),
            ShardSet::Topics => topic_sample_stats(&self.sample_sizes, &self.layout),
        }
    }

    /// Rank shards for `query`.
    pub fn select(
        &self,
        query: &str,
        budget_or_limit: f64,
        method: SelectionMethod,
        use_topics: bool,
    ) -> Result<Selection> {
        self.select_request(
            &SelectRequest::new(query, method)
                .with_budget(budget_or_limit)
                .with_topics(use_topics),
        )
    }

    pub fn select_request(&self, request: &SelectRequest) -> Result<Selection> {
        let start = Instant::now();
        let set = ShardSet::from_topics(request.use_topics);
        let terms = self.analyzer.terms(&request.query);

        let selection = if request.method == SelectionMethod::Taily {
            let budget = request.budget.unwrap_or(self.taily.budget);
            let ranker = TailyRanker::new(budget, self.taily.epsilon)?;
            let (branch, ranking) = self.rank_taily(&ranker, &terms, set)?;
            Selection {
                method: request.method,
                shard_set: set,
                terms,
                branch: Some(branch),
                ranking,
            }
        } else {
            let limit = match request.budget {
                Some(limit) => shard_limit(limit)?,
                None => self.sample_config.top_k,
            };
            let ranking = self.rank_sample(request, set, limit)?;
            Selection {
                method: request.method,
                shard_set: set,
                terms,
                branch: None,
                ranking,
            }
        };

        info!(
            method = %selection.method,
            shard_set = %set,
            terms = selection.terms.len(),
            shards = selection.ranking.len(),
            elapsed_us = start.elapsed().as_micros() as u64,
            "selection complete"
        );
        Ok(selection)
    }

    fn rank_taily(
        &self,
        ranker: &TailyRanker,
        terms: &[String],
        set: ShardSet,
    ) -> Result<(TailyBranch, ShardRanking)> {
        let collection = TailyShard {
            id: "",
            size: self.catalog.collection_size(),
            store: self.catalog.collection(),
        };
        let shards: Vec<TailyShard<'_>> = self
            .catalog
            .shards(set)
            .iter()
            .map(|(id, size, store)| TailyShard {
                id: id.as_str(),
                size,
                store,
            })
            .collect();
        ranker.rank(terms, collection, &shards)
    }

    fn rank_sample(
        &self,
        request: &SelectRequest,
        set: ShardSet,
        limit: usize,
    ) -> Result<ShardRanking> {
        let params = self.sample_config.params();
        let Some(selector) = request.method.selector(&params) else {
            return Err(ShardselError::UnknownMethod(request.method.to_string()));
        };
        let Some(sample) = &self.sample else {
            return Err(ShardselError::SampleIndexUnavailable(format!(
                "{} needs a sample index; import documents with `shardsel import --sample`",
                request.method
            )));
        };

        let mut hits = sample.search_sample(&request.query, self.sample_config.limit)?;
        if set == ShardSet::Topics {
            hits = attribute_to_topics(&hits, &self.layout);
        }
        let full = self.shard_stats(set);
        let scores = selector.rank(&hits, full);
        let scores = selector.normalize(scores, &self.sample_stats(set), full);
        debug!(
            method = selector.name(),
            hits = hits.len(),
            shards = scores.len(),
            "sample strategy scored"
        );

        let mut ranking = ShardRanking::from_scores(scores);
        match selector.cutoff() {
            Cutoff::TopK => ranking.truncate_top(limit),
            Cutoff::ScoreFloor(floor) => ranking.truncate_below(request.min_score.unwrap_or(floor)),
        }
        Ok(ranking)
    }

    fn known_shard(&self, set: ShardSet, shard: &str) -> Result<()> {
        if self.catalog.shards(set).contains(shard) {
            Ok(())
        } else {
            Err(ShardselError::UnknownShard(shard.to_string()))
        }
    }

    /// Documents of source `shard` containing `term`; 0 when absent.
    pub fn document_frequency(&self, shard: &str, term: &str) -> Result<u64> {
        self.shard_document_frequency(ShardSet::Sources, shard, term)
    }

    /// Documents of topic `topic` containing `term`; 0 when absent.
    pub fn topic_document_frequency(&self, topic: &str, term: &str) -> Result<u64> {
        self.shard_document_frequency(ShardSet::Topics, topic, term)
    }

    pub fn shard_document_frequency(&self, set: ShardSet, shard: &str, term: &str) -> Result<u64> {
        self.known_shard(set, shard)?;
        match self.catalog.shards(set).store(shard) {
            Some(store) => document_frequency(store, term),
            None => Ok(0),
        }
    }

    /// Upper bound on documents touched when searching `shards` for `terms`.
    pub fn estimate_cost(&self, set: ShardSet, shards: &[ShardId], terms: &[String]) -> Result<u64> {
        let mut cost = 0;
        for shard in shards {
            for term in terms {
                cost += self.shard_document_frequency(set, shard, term)?;
            }
        }
        Ok(cost)
    }
}

fn shard_limit(limit: f64) -> Result<usize> {
    if !limit.is_finite() || limit < 0.0 {
        return Err(ShardselError::InvalidArgument(format!(
            "shard limit must be a finite non-negative number, got {limit}"
        )));
    }
    Ok(limit.floor() as usize)
}
