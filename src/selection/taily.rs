//! Statistical shard ranking (Taily).
//!
//! Estimates how many documents of each shard would score above the
//! collection-wide threshold that yields roughly `budget` candidates,
//! using only per-term moments. Query feature scores are modelled per shard
//! as a Gamma distribution fitted by the method of moments.
//!
//! Index `0` in every per-shard vector is the whole collection; shards
//! follow in the order they were supplied.

use serde::Serialize;
use statrs::distribution::{ContinuousCDF, Gamma};
use tracing::{debug, trace};

use crate::corpus::ShardId;
use crate::error::{Result, ShardselError};
use crate::selection::ranking::ShardRanking;
use crate::stats::store::{StatStore, read_moments};

/// Default retrieval-cost budget.
pub const DEFAULT_BUDGET: f64 = 50.0;
/// Default variance threshold below which a distribution is degenerate.
pub const DEFAULT_EPSILON: f64 = 1e-10;

/// Which estimate produced a ranking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TailyBranch {
    /// No collection document contains any query term.
    NoMatch,
    /// Collection variance is zero: raw document frequencies.
    SingleMatch,
    /// No document is estimated to contain every term: shifted means.
    NoFullMatch,
    /// Full Gamma tail estimate.
    Gamma,
}

impl TailyBranch {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoMatch => "no_match",
            Self::SingleMatch => "single_match",
            Self::NoFullMatch => "no_full_match",
            Self::Gamma => "gamma",
        }
    }
}

/// A shard as seen by the ranker.
#[derive(Clone, Copy)]
pub struct TailyShard<'a> {
    pub id: &'a str,
    pub size: u64,
    /// `None` when the shard has no statistics; it then matches nothing.
    pub store: Option<&'a dyn StatStore>,
}

/// Aggregated moments of one query over the collection and every shard.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFeatures {
    pub query_mean: Vec<f64>,
    pub query_var: Vec<f64>,
    pub has_a_term: Vec<bool>,
    pub df_term: Vec<f64>,
    /// `term_df[i][t]`: df of term `t` in shard `i`, 0 when absent.
    pub term_df: Vec<Vec<f64>>,
    pub sizes: Vec<f64>,
}

impl QueryFeatures {
    /// Read and aggregate moments for `terms`.
    ///
    /// Each term's per-shard mean is shifted by the term's collection-wide
    /// minimum so aggregated means stay non-negative.
    pub fn gather(
        terms: &[String],
        collection: TailyShard<'_>,
        shards: &[TailyShard<'_>],
    ) -> Result<Self> {
        let n = shards.len() + 1;
        let mut features = Self {
            query_mean: vec![0.0; n],
            query_var: vec![0.0; n],
            has_a_term: vec![false; n],
            df_term: vec![0.0; n],
            term_df: vec![vec![0.0; terms.len()]; n],
            sizes: std::iter::once(collection.size)
                .chain(shards.iter().map(|s| s.size))
                .map(|s| s as f64)
                .collect(),
        };

        let mut shift = vec![None; terms.len()];
        if let Some(store) = collection.store {
            for (t, term) in terms.iter().enumerate() {
                shift[t] = read_moments(store, term)?.map(|m| m.min_f);
            }
        }

        let all = std::iter::once(&collection).chain(shards.iter());
        for (i, shard) in all.enumerate() {
            let Some(store) = shard.store else {
                continue;
            };
            for (t, term) in terms.iter().enumerate() {
                let Some(m) = read_moments(store, term)? else {
                    continue;
                };
                let df = m.df as f64;
                let mean = m.sum_f / df;
                let var = (m.sum_f2 / df - mean * mean).max(0.0);
                let min_f = shift[t].unwrap_or(m.min_f);

                features.query_mean[i] += mean - min_f;
                features.query_var[i] += var;
                features.has_a_term[i] = true;
                features.df_term[i] += df;
                features.term_df[i][t] = df;
            }
        }
        Ok(features)
    }

    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Estimated number of documents in shard `i` containing every term.
    pub fn all_terms_estimate(&self, i: usize) -> f64 {
        let size = self.sizes[i];
        let dfs = &self.term_df[i];
        if size <= 0.0 || dfs.is_empty() || dfs.iter().any(|&df| df <= 0.0) {
            return 0.0;
        }
        let miss: f64 = dfs.iter().map(|&df| 1.0 - (df / size).min(1.0)).product();
        let any = size * (1.0 - miss);
        if any <= 0.0 {
            return 0.0;
        }
        any * dfs.iter().map(|&df| (df / any).min(1.0)).product::<f64>()
    }
}

/// Method-of-moments Gamma fit; `None` when the moments cannot describe one.
pub fn fit_gamma(mean: f64, var: f64, epsilon: f64) -> Option<Gamma> {
    if !(var >= epsilon && mean > 0.0 && mean.is_finite() && var.is_finite()) {
        return None;
    }
    let shape = mean * mean / var;
    let scale = var / mean;
    Gamma::new(shape, 1.0 / scale).ok()
}

/// Un-normalized Taily output.
#[derive(Debug, Clone, PartialEq)]
pub struct TailyEstimate {
    pub branch: TailyBranch,
    /// Raw score per shard, in input order.
    pub scores: Vec<(ShardId, f64)>,
}

impl TailyEstimate {
    /// Sort and scale to `budget`; empty for [`TailyBranch::NoMatch`].
    pub fn into_ranking(self, budget: f64) -> ShardRanking {
        if self.branch == TailyBranch::NoMatch {
            return ShardRanking::empty();
        }
        let mut ranking = ShardRanking::from_scores(self.scores);
        ranking.normalize(budget);
        ranking
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TailyRanker {
    budget: f64,
    epsilon: f64,
}

impl Default for TailyRanker {
    fn default() -> Self {
        Self {
            budget: DEFAULT_BUDGET,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl TailyRanker {
    /// Ranker with budget `n_c`; rejects a negative or non-finite budget.
    pub fn new(budget: f64, epsilon: f64) -> Result<Self> {
        if !budget.is_finite() || budget < 0.0 {
            return Err(ShardselError::InvalidArgument(format!(
                "budget must be a finite non-negative number, got {budget}"
            )));
        }
        if !(epsilon.is_finite() && epsilon > 0.0) {
            return Err(ShardselError::InvalidArgument(format!(
                "epsilon must be positive, got {epsilon}"
            )));
        }
        Ok(Self { budget, epsilon })
    }

    pub const fn budget(&self) -> f64 {
        self.budget
    }

    /// Rank `shards` for `terms` and normalize to the budget.
    pub fn rank(
        &self,
        terms: &[String],
        collection: TailyShard<'_>,
        shards: &[TailyShard<'_>],
    ) -> Result<(TailyBranch, ShardRanking)> {
        let estimate = self.estimate(terms, collection, shards)?;
        let branch = estimate.branch;
        Ok((branch, estimate.into_ranking(self.budget)))
    }

    /// Raw per-shard scores before normalization.
    pub fn estimate(
        &self,
        terms: &[String],
        collection: TailyShard<'_>,
        shards: &[TailyShard<'_>],
    ) -> Result<TailyEstimate> {
        let features = QueryFeatures::gather(terms, collection, shards)?;
        let (branch, raw) = self.score(&features);
        debug!(
            terms = terms.len(),
            shards = shards.len(),
            branch = branch.as_str(),
            "taily estimate"
        );
        Ok(TailyEstimate {
            branch,
            scores: shards
                .iter()
                .zip(raw)
                .map(|(s, score)| (s.id.to_string(), score))
                .collect(),
        })
    }

    /// Score shards `1..` of `features`.
    pub fn score(&self, features: &QueryFeatures) -> (TailyBranch, Vec<f64>) {
        let n = features.len();
        let shard_range = 1..n;

        if !features.has_a_term.first().copied().unwrap_or(false) {
            return (TailyBranch::NoMatch, vec![0.0; n.saturating_sub(1)]);
        }

        if features.query_var[0] < self.epsilon {
            let scores = shard_range.map(|i| features.df_term[i]).collect();
            return (TailyBranch::SingleMatch, scores);
        }

        let mean_fallback = |features: &QueryFeatures| -> Vec<f64> {
            (1..n)
                .map(|i| {
                    if features.has_a_term[i] {
                        features.query_mean[i]
                    } else {
                        0.0
                    }
                })
                .collect()
        };

        let all: Vec<f64> = (0..n).map(|i| features.all_terms_estimate(i)).collect();
        if all[0] < self.epsilon {
            return (TailyBranch::NoFullMatch, mean_fallback(features));
        }

        let Some(collection_fit) =
            fit_gamma(features.query_mean[0], features.query_var[0], self.epsilon)
        else {
            debug!(
                mean = features.query_mean[0],
                var = features.query_var[0],
                "collection gamma fit invalid, using means"
            );
            return (TailyBranch::NoFullMatch, mean_fallback(features));
        };

        let p_c = (self.budget / all[0]).min(1.0);
        let s_c = if p_c >= 1.0 {
            0.0
        } else if p_c <= 0.0 {
            f64::INFINITY
        } else {
            collection_fit.inverse_cdf(1.0 - p_c)
        };
        trace!(p_c, s_c, all0 = all[0], "collection threshold");

        let scores = shard_range
            .map(|i| {
                if !features.has_a_term[i] {
                    return 0.0;
                }
                if features.query_var[i] < self.epsilon {
                    return features.query_mean[i];
                }
                match fit_gamma(features.query_mean[i], features.query_var[i], self.epsilon) {
                    Some(_) if s_c.is_infinite() => 0.0,
                    Some(fit) => all[i] * fit.sf(s_c),
                    None => features.query_mean[i],
                }
            })
            .collect();
        (TailyBranch::Gamma, scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::keys::TermMoments;
    use crate::stats::store::MemoryStatStore;

    fn moments(df: u64, sum_f: f64, sum_f2: f64, min_f: f64) -> TermMoments {
        TermMoments {
            df,
            sum_f,
            sum_f2,
            min_f,
        }
    }

    fn terms(ts: &[&str]) -> Vec<String> {
        ts.iter().map(|t| (*t).to_string()).collect()
    }

    struct Fixture {
        collection: MemoryStatStore,
        shards: Vec<(&'static str, u64, MemoryStatStore)>,
    }

    impl Fixture {
        fn collection_view(&self) -> TailyShard<'_> {
            TailyShard {
                id: "",
                size: self.shards.iter().map(|(_, n, _)| n).sum(),
                store: Some(&self.collection),
            }
        }

        fn shard_views(&self) -> Vec<TailyShard<'_>> {
            self.shards
                .iter()
                .map(|(id, size, store)| TailyShard {
                    id,
                    size: *size,
                    store: Some(store),
                })
                .collect()
        }
    }

    /// A(df=10), B(df=2), C(no match) for the term "q".
    fn abc() -> Fixture {
        let a = moments(10, 5.0, 3.0, 0.1);
        let b = moments(2, 1.0, 0.6, 0.2);
        let mut c = a;
        c.merge(&b);
        Fixture {
            collection: MemoryStatStore::with_moments(180, [("q", c)]),
            shards: vec![
                ("A", 100, MemoryStatStore::with_moments(100, [("q", a)])),
                ("B", 50, MemoryStatStore::with_moments(50, [("q", b)])),
                ("C", 30, MemoryStatStore::with_moments(30, [])),
            ],
        }
    }

    #[test]
    fn gamma_fit_matches_moments() {
        let fit = fit_gamma(2.0, 0.5, DEFAULT_EPSILON).unwrap();
        assert!((fit.shape() - 8.0).abs() < 1e-12);
        assert!((fit.rate() - 4.0).abs() < 1e-12);
        assert!(fit_gamma(0.0, 0.5, DEFAULT_EPSILON).is_none());
        assert!(fit_gamma(1.0, 0.0, DEFAULT_EPSILON).is_none());
    }

    #[test]
    fn abc_scenario() {
        let fx = abc();
        let ranker = TailyRanker::new(5.0, DEFAULT_EPSILON).unwrap();
        let (branch, ranking) = ranker
            .rank(&terms(&["q"]), fx.collection_view(), &fx.shard_views())
            .unwrap();

        assert_eq!(branch, TailyBranch::Gamma);
        let a = ranking.get("A").unwrap();
        let b = ranking.get("B").unwrap();
        assert!(a > b);
        assert!(b > 0.0);
        assert_eq!(ranking.get("C"), Some(0.0));
        assert!((a + b - 5.0).abs() < 1e-6);
        let order: Vec<&str> = ranking.shard_ids().map(String::as_str).collect();
        assert_eq!(order, ["A", "B", "C"]);
    }

    #[test]
    fn features_shift_by_collection_minimum() {
        // Each term's mean is shifted by that term's collection minimum,
        // never by the shard-local one, and the shifts add up over terms.
        let fx = Fixture {
            collection: MemoryStatStore::with_moments(
                30,
                [
                    ("a", moments(4, 6.0, 11.0, 0.5)),
                    ("b", moments(4, 8.0, 17.0, 1.0)),
                ],
            ),
            shards: vec![
                (
                    "A",
                    20,
                    MemoryStatStore::with_moments(
                        20,
                        [
                            ("a", moments(2, 2.0, 2.5, 0.8)),
                            ("b", moments(4, 8.0, 17.0, 1.5)),
                        ],
                    ),
                ),
                (
                    "B",
                    10,
                    MemoryStatStore::with_moments(10, [("a", moments(2, 4.0, 8.5, 1.5))]),
                ),
            ],
        };
        let f = QueryFeatures::gather(&terms(&["a", "b"]), fx.collection_view(), &fx.shard_views())
            .unwrap();

        // collection: (1.5 - 0.5) + (2.0 - 1.0)
        assert!((f.query_mean[0] - 2.0).abs() < 1e-12);
        // A: (1.0 - 0.5) + (2.0 - 1.0)
        assert!((f.query_mean[1] - 1.5).abs() < 1e-12);
        // B holds only "a": 2.0 - 0.5
        assert!((f.query_mean[2] - 1.5).abs() < 1e-12);
        assert!((f.query_var[1] - 0.5).abs() < 1e-12);
        assert_eq!(f.df_term, [8.0, 6.0, 2.0]);
        assert_eq!(f.term_df[1], [2.0, 4.0]);
        assert_eq!(f.term_df[2], [2.0, 0.0]);
    }

    #[test]
    fn features_single_term() {
        let fx = abc();
        let f = QueryFeatures::gather(&terms(&["q"]), fx.collection_view(), &fx.shard_views())
            .unwrap();
        assert!((f.query_mean[0] - 0.4).abs() < 1e-12);
        assert!((f.query_mean[1] - 0.4).abs() < 1e-12);
        assert!((f.query_var[1] - 0.05).abs() < 1e-12);
        assert_eq!(f.has_a_term, [true, true, true, false]);
        assert_eq!(f.df_term, [12.0, 10.0, 2.0, 0.0]);
    }

    #[test]
    fn no_match_is_empty() {
        let fx = abc();
        let ranker = TailyRanker::default();
        let (branch, ranking) = ranker
            .rank(&terms(&["absent"]), fx.collection_view(), &fx.shard_views())
            .unwrap();
        assert_eq!(branch, TailyBranch::NoMatch);
        assert!(ranking.is_empty());
    }

    #[test]
    fn empty_query_is_no_match() {
        let fx = abc();
        let (branch, ranking) = TailyRanker::default()
            .rank(&[], fx.collection_view(), &fx.shard_views())
            .unwrap();
        assert_eq!(branch, TailyBranch::NoMatch);
        assert!(ranking.is_empty());
    }

    #[test]
    fn single_collection_match_uses_df() {
        let m = moments(1, -3.0, 9.0, -3.0);
        let fx = Fixture {
            collection: MemoryStatStore::with_moments(20, [("rare", m)]),
            shards: vec![
                ("x", 10, MemoryStatStore::with_moments(10, [])),
                ("y", 10, MemoryStatStore::with_moments(10, [("rare", m)])),
            ],
        };
        let (branch, ranking) = TailyRanker::new(10.0, DEFAULT_EPSILON)
            .unwrap()
            .rank(&terms(&["rare"]), fx.collection_view(), &fx.shard_views())
            .unwrap();

        assert_eq!(branch, TailyBranch::SingleMatch);
        assert_eq!(ranking.get("x"), Some(0.0));
        assert!((ranking.get("y").unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn disjoint_terms_fall_back_to_means() {
        // Each term lives in a different shard: no shard holds both.
        let p = moments(4, 2.0, 1.2, 0.1);
        let q = moments(3, 3.0, 3.5, 0.5);
        let fx = Fixture {
            collection: MemoryStatStore::with_moments(20, [("p", p), ("q", q)]),
            shards: vec![
                ("x", 10, MemoryStatStore::with_moments(10, [("p", p)])),
                ("y", 10, MemoryStatStore::with_moments(10, [("q", q)])),
            ],
        };
        let features = QueryFeatures::gather(
            &terms(&["p", "q"]),
            TailyShard {
                id: "",
                size: 20,
                store: Some(&fx.collection),
            },
            &fx.shard_views(),
        )
        .unwrap();
        assert_eq!(features.all_terms_estimate(1), 0.0);
        assert_eq!(features.all_terms_estimate(2), 0.0);

        // A collection without "q" estimates no full match at all.
        let partial = MemoryStatStore::with_moments(20, [("p", p)]);
        let mut views = fx.shard_views();
        views.truncate(1);
        let (branch, ranking) = TailyRanker::new(5.0, DEFAULT_EPSILON)
            .unwrap()
            .rank(
                &terms(&["p", "q"]),
                TailyShard {
                    id: "",
                    size: 20,
                    store: Some(&partial),
                },
                &views,
            )
            .unwrap();
        assert_eq!(branch, TailyBranch::NoFullMatch);
        assert!((ranking.sum() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn missing_store_matches_nothing() {
        let fx = abc();
        let mut views = fx.shard_views();
        views[0].store = None;
        let (_, ranking) = TailyRanker::new(5.0, DEFAULT_EPSILON)
            .unwrap()
            .rank(&terms(&["q"]), fx.collection_view(), &views)
            .unwrap();
        assert_eq!(ranking.get("A"), Some(0.0));
        assert!(ranking.get("B").unwrap() > 0.0);
    }

    #[test]
    fn all_terms_estimate_single_term_is_df() {
        let features = QueryFeatures {
            sizes: vec![100.0],
            term_df: vec![vec![7.0]],
            ..QueryFeatures::default()
        };
        assert!((features.all_terms_estimate(0) - 7.0).abs() < 1e-9);
    }

    #[test]
    fn large_budget_selects_everything_matching() {
        let fx = abc();
        let (branch, ranking) = TailyRanker::new(1_000.0, DEFAULT_EPSILON)
            .unwrap()
            .rank(&terms(&["q"]), fx.collection_view(), &fx.shard_views())
            .unwrap();
        assert_eq!(branch, TailyBranch::Gamma);
        // p_c = 1: every matching document counts, so scores follow df.
        let a = ranking.get("A").unwrap();
        let b = ranking.get("B").unwrap();
        assert!((a / b - 5.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_budget_is_rejected() {
        assert!(matches!(
            TailyRanker::new(-1.0, DEFAULT_EPSILON),
            Err(ShardselError::InvalidArgument(_))
        ));
        assert!(TailyRanker::new(f64::NAN, DEFAULT_EPSILON).is_err());
        assert!(TailyRanker::new(f64::INFINITY, DEFAULT_EPSILON).is_err());
        assert!(TailyRanker::new(5.0, 0.0).is_err());
    }
}
