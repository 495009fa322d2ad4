//! Store key layout and per-term moment records.
//!
//! Every value lives under `term + suffix`. Shard-wide values use an empty
//! term, so they cannot collide with analyzer output (tokens never contain
//! `#`).

use serde::{Deserialize, Serialize};

/// Document frequency of the term in the shard.
pub const DF: &str = "#df";
/// Sum of the feature value over documents containing the term.
pub const SUM_F: &str = "#sf";
/// Sum of squared feature values.
pub const SUM_F2: &str = "#sf2";
/// Minimum observed feature value.
pub const MIN_F: &str = "#min";
/// Total term frequency (collection store only).
pub const CTF: &str = "#ctf";

/// Number of documents in the shard.
pub const SHARD_SIZE: &str = "#size";
/// Number of tokens in the shard.
pub const SHARD_TERMS: &str = "#terms";

/// Build the key for one moment of a term.
#[must_use]
pub fn term_key(term: &str, suffix: &str) -> String {
    let mut key = String::with_capacity(term.len() + suffix.len());
    key.push_str(term);
    key.push_str(suffix);
    key
}

/// Moment statistics of one term within one shard (or the collection).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TermMoments {
    pub df: u64,
    pub sum_f: f64,
    pub sum_f2: f64,
    pub min_f: f64,
}

impl Default for TermMoments {
    fn default() -> Self {
        Self {
            df: 0,
            sum_f: 0.0,
            sum_f2: 0.0,
            min_f: f64::INFINITY,
        }
    }
}

impl TermMoments {
    /// Fold one document's feature value into the moments.
    pub fn observe(&mut self, f: f64) {
        self.df += 1;
        self.sum_f += f;
        self.sum_f2 += f * f;
        if f < self.min_f {
            self.min_f = f;
        }
    }

    /// Combine moments of two disjoint document sets.
    pub fn merge(&mut self, other: &Self) {
        self.df += other.df;
        self.sum_f += other.sum_f;
        self.sum_f2 += other.sum_f2;
        self.min_f = self.min_f.min(other.min_f);
    }

    /// Mean feature value, `None` when no document holds the term.
    #[must_use]
    pub fn mean(&self) -> Option<f64> {
        (self.df > 0).then(|| self.sum_f / self.df as f64)
    }

    /// Population variance, clamped at zero against rounding.
    #[must_use]
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        Some((self.sum_f2 / self.df as f64 - mean * mean).max(0.0))
    }

    /// Key/value pairs persisted for `term`.
    #[must_use]
    pub fn entries(&self, term: &str) -> [(String, f64); 4] {
        [
            (term_key(term, DF), self.df as f64),
            (term_key(term, SUM_F), self.sum_f),
            (term_key(term, SUM_F2), self.sum_f2),
            (term_key(term, MIN_F), self.min_f),
        ]
    }
}
