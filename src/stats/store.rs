//! The term statistics store contract and its in-memory implementation.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::error::Result;
use crate::stats::keys::{self, TermMoments};

/// Point-lookup key/value store holding moment statistics for one shard.
///
/// Implementations must allow concurrent readers; query-time ranking only
/// calls [`StatStore::get`].
pub trait StatStore: Send + Sync {
    /// Read a value, `Ok(None)` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<f64>>;

    /// Overwrite a value.
    fn put(&self, key: &str, value: f64) -> Result<()>;

    /// Add `delta` to a value, creating it when absent.
    fn add_value(&self, key: &str, delta: f64) -> Result<()>;

    /// Overwrite many values at once.
    fn put_batch(&self, entries: &[(String, f64)]) -> Result<()> {
        for (key, value) in entries {
            self.put(key, *value)?;
        }
        Ok(())
    }

    /// Accumulate many deltas at once.
    fn add_batch(&self, deltas: &[(String, f64)]) -> Result<()> {
        for (key, delta) in deltas {
            self.add_value(key, *delta)?;
        }
        Ok(())
    }

    /// All entries sorted by key.
    fn entries(&self) -> Result<Vec<(String, f64)>>;
}

/// Read the full moment record of `term`.
///
/// A missing `df` (or `df == 0`) means the shard holds no document with the
/// term; other moments are then not consulted.
pub fn read_moments(store: &dyn StatStore, term: &str) -> Result<Option<TermMoments>> {
    let Some(df) = store.get(&keys::term_key(term, keys::DF))? else {
        return Ok(None);
    };
    if df <= 0.0 {
        return Ok(None);
    }

    let sum_f = store.get(&keys::term_key(term, keys::SUM_F))?.unwrap_or(0.0);
    let sum_f2 = store.get(&keys::term_key(term, keys::SUM_F2))?.unwrap_or(0.0);
    let min_f = store.get(&keys::term_key(term, keys::MIN_F))?.unwrap_or(0.0);

    Ok(Some(TermMoments {
        df: df as u64,
        sum_f,
        sum_f2,
        min_f,
    }))
}

/// Write the full moment record of `term`.
pub fn write_moments(store: &dyn StatStore, term: &str, moments: &TermMoments) -> Result<()> {
    store.put_batch(&moments.entries(term))
}

/// Document frequency of `term`, 0 when absent.
pub fn document_frequency(store: &dyn StatStore, term: &str) -> Result<u64> {
    Ok(store
        .get(&keys::term_key(term, keys::DF))?
        .map_or(0, |df| df.max(0.0) as u64))
}

/// In-memory store, used for tests and for callers that assemble
/// statistics themselves.
#[derive(Debug, Default)]
pub struct MemoryStatStore {
    values: RwLock<BTreeMap<String, f64>>,
}

impl MemoryStatStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with term moments and a shard size.
    pub fn with_moments<'a>(
        size: u64,
        terms: impl IntoIterator<Item = (&'a str, TermMoments)>,
    ) -> Self {
        let store = Self::new();
        {
            let mut values = store.values.write();
            values.insert(keys::SHARD_SIZE.to_string(), size as f64);
            for (term, moments) in terms {
                for (key, value) in moments.entries(term) {
                    values.insert(key, value);
                }
            }
        }
        store
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl StatStore for MemoryStatStore {
    fn get(&self, key: &str) -> Result<Option<f64>> {
        Ok(self.values.read().get(key).copied())
    }

    fn put(&self, key: &str, value: f64) -> Result<()> {
        self.values.write().insert(key.to_string(), value);
        Ok(())
    }

    fn add_value(&self, key: &str, delta: f64) -> Result<()> {
        *self.values.write().entry(key.to_string()).or_insert(0.0) += delta;
        Ok(())
    }

    fn entries(&self) -> Result<Vec<(String, f64)>> {
        Ok(self
            .values
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect())
    }
}
