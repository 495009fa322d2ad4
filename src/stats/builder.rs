//! Corpus Statistics Builder
//!
//! Walks the corpus index twice and writes one statistics store for the
//! collection, one per source and one per topic.
//!
//! Pass 1 reads every body-field posting list for collection term
//! frequencies and exact document lengths. Pass 2 revisits the postings,
//! computes the Dirichlet-smoothed feature value of each (term, document)
//! pair, and folds it into the collection and source moments. Topic stores
//! are then summed from their member sources.
//!
//! The build writes into a temporary sibling of the statistics directory and
//! swaps it into place only after every store is complete, so an existing
//! directory is never left half-written.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use rayon::prelude::*;
use serde::Serialize;
use tantivy::postings::Postings;
use tantivy::schema::IndexRecordOption;
use tantivy::{DocSet, SegmentReader, TERMINATED};
use tracing::{debug, info, warn};

use crate::corpus::index::for_each_label;
use crate::corpus::{CorpusIndex, ShardId, ShardLayout};
use crate::error::{Result, ShardselError};
use crate::stats::catalog::{
    BuildManifest, FORMAT_VERSION, ShardSet, StatsPaths, TopicEntry,
};
use crate::stats::keys::{self, TermMoments};
use crate::stats::lock::RebuildLock;
use crate::stats::sqlite::SqliteStatStore;
use crate::stats::store::StatStore;

/// Default Dirichlet smoothing parameter.
pub const DEFAULT_MU: f64 = 2500.0;

const LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Dirichlet-smoothed language-model score of a term in a document.
#[must_use]
pub fn feature_value(tf: u32, doc_len: u64, ctf: u64, collection_terms: u64, mu: f64) -> f64 {
    let background = ctf as f64 / collection_terms as f64;
    ((f64::from(tf) + mu * background) / (doc_len as f64 + mu)).ln()
}

/// Statistics of one shard, held in memory before it is written.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShardSnapshot {
    pub size: u64,
    pub terms: u64,
    pub moments: BTreeMap<String, TermMoments>,
}

impl ShardSnapshot {
    fn write(&self, store: &dyn StatStore) -> Result<()> {
        let mut entries = Vec::with_capacity(self.moments.len() * 4 + 2);
        entries.push((keys::SHARD_SIZE.to_string(), self.size as f64));
        entries.push((keys::SHARD_TERMS.to_string(), self.terms as f64));
        for (term, moments) in &self.moments {
            entries.extend(moments.entries(term));
        }
        store.put_batch(&entries)
    }
}

/// Every statistic of one build, before persistence.
#[derive(Debug, Clone, Default)]
pub struct CorpusSnapshot {
    pub collection: ShardSnapshot,
    pub ctf: BTreeMap<String, u64>,
    pub sources: BTreeMap<ShardId, ShardSnapshot>,
    pub topics: BTreeMap<ShardId, Vec<ShardId>>,
}

/// Outcome of a rebuild.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub stats_dir: PathBuf,
    pub num_docs: u64,
    pub total_terms: u64,
    pub num_terms: usize,
    pub sources: usize,
    pub topics: usize,
    #[serde(with = "duration_ms")]
    pub elapsed: Duration,
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u128(d.as_millis())
    }
}

/// Per-segment data gathered in pass 1.
struct SegmentPass {
    doc_len: Vec<u64>,
    /// Source index of each document, `None` for unlabelled or deleted docs.
    label: Vec<Option<usize>>,
}

pub struct CorpusStatsBuilder<'a> {
    index: &'a CorpusIndex,
    layout: &'a ShardLayout,
    mu: f64,
    lock_timeout: Duration,
}

impl<'a> CorpusStatsBuilder<'a> {
    pub fn new(index: &'a CorpusIndex, layout: &'a ShardLayout) -> Self {
        Self {
            index,
            layout,
            mu: DEFAULT_MU,
            lock_timeout: LOCK_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_mu(mut self, mu: f64) -> Self {
        self.mu = mu;
        self
    }

    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    /// Compute all statistics in memory.
    pub fn collect(&self) -> Result<CorpusSnapshot> {
        if !(self.mu.is_finite() && self.mu > 0.0) {
            return Err(ShardselError::InvalidArgument(format!(
                "smoothing mu must be positive, got {}",
                self.mu
            )));
        }

        let searcher = self.index.searcher();
        let fields = self.index.fields();
        let segments = searcher.segment_readers();

        // Source labels, globally sorted.
        let mut segment_labels: Vec<Vec<(String, Vec<u32>)>> = Vec::with_capacity(segments.len());
        let mut source_ids: BTreeSet<ShardId> = BTreeSet::new();
        for segment in segments {
            let mut labels = Vec::new();
            for_each_label(segment, fields.shard, |label, docs| {
                source_ids.insert(label.to_string());
                labels.push((label.to_string(), docs.to_vec()));
            })?;
            segment_labels.push(labels);
        }
        let sources: Vec<ShardId> = source_ids.into_iter().collect();

        let mut snapshot = CorpusSnapshot {
            sources: sources
                .iter()
                .map(|id| (id.clone(), ShardSnapshot::default()))
                .collect(),
            ..CorpusSnapshot::default()
        };

        // Pass 1: lengths, ctf, sizes.
        let mut passes = Vec::with_capacity(segments.len());
        for (segment, labels) in segments.iter().zip(&segment_labels) {
            let mut pass = SegmentPass {
                doc_len: vec![0; segment.max_doc() as usize],
                label: vec![None; segment.max_doc() as usize],
            };
            for (label, docs) in labels {
                let Ok(source) = sources.binary_search(label) else {
                    continue;
                };
                for &doc in docs {
                    pass.label[doc as usize] = Some(source);
                }
            }

            walk_postings(segment, fields.body, |term, doc, tf| {
                pass.doc_len[doc as usize] += u64::from(tf);
                *snapshot.ctf.entry(term.to_string()).or_insert(0) += u64::from(tf);
            })?;

            let alive = segment.alive_bitset();
            for doc in 0..segment.max_doc() {
                if alive.is_some_and(|bits| !bits.is_alive(doc)) {
                    continue;
                }
                let len = pass.doc_len[doc as usize];
                snapshot.collection.size += 1;
                snapshot.collection.terms += len;
                if let Some(source) = pass.label[doc as usize] {
                    let shard = snapshot_mut(&mut snapshot.sources, &sources[source]);
                    shard.size += 1;
                    shard.terms += len;
                }
            }
            passes.push(pass);
        }
        debug!(
            docs = snapshot.collection.size,
            tokens = snapshot.collection.terms,
            terms = snapshot.ctf.len(),
            "pass 1 complete"
        );

        // Pass 2: feature moments.
        let collection_terms = snapshot.collection.terms;
        for (segment, pass) in segments.iter().zip(&passes) {
            walk_postings(segment, fields.body, |term, doc, tf| {
                let ctf = snapshot.ctf.get(term).copied().unwrap_or(0);
                let f = feature_value(tf, pass.doc_len[doc as usize], ctf, collection_terms, self.mu);
                snapshot
                    .collection
                    .moments
                    .entry(term.to_string())
                    .or_default()
                    .observe(f);
                if let Some(source) = pass.label[doc as usize] {
                    snapshot_mut(&mut snapshot.sources, &sources[source])
                        .moments
                        .entry(term.to_string())
                        .or_default()
                        .observe(f);
                }
            })?;
        }

        for (topic, members) in self.layout.topics() {
            let mut known = Vec::with_capacity(members.len());
            for member in members {
                if snapshot.sources.contains_key(member) {
                    known.push(member.clone());
                } else {
                    warn!(topic = %topic, source = %member, "topic member has no documents");
                }
            }
            snapshot.topics.insert(topic.clone(), known);
        }

        debug!(
            sources = snapshot.sources.len(),
            topics = snapshot.topics.len(),
            "pass 2 complete"
        );
        Ok(snapshot)
    }

    /// Rebuild the statistics directory at `stats_dir`.
    pub fn build(&self, stats_dir: &Path) -> Result<BuildReport> {
        let start = Instant::now();
        let parent = stats_dir
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let _lock = RebuildLock::acquire_timeout(parent, self.lock_timeout)?;

        let snapshot = self.collect()?;

        let staging = tempfile::Builder::new()
            .prefix(".stats-build-")
            .tempdir_in(parent)?;
        let manifest = self.write_snapshot(&snapshot, staging.path())?;
        swap_into_place(staging.keep(), stats_dir)?;

        let report = BuildReport {
            stats_dir: stats_dir.to_path_buf(),
            num_docs: manifest.num_docs,
            total_terms: manifest.total_terms,
            num_terms: snapshot.collection.moments.len(),
            sources: manifest.sources.len(),
            topics: manifest.topics.len(),
            elapsed: start.elapsed(),
        };
        info!(
            docs = report.num_docs,
            terms = report.num_terms,
            sources = report.sources,
            topics = report.topics,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "term statistics rebuilt"
        );
        Ok(report)
    }

    /// Write a snapshot as a complete statistics directory under `dir`.
    pub fn write_snapshot(&self, snapshot: &CorpusSnapshot, dir: &Path) -> Result<BuildManifest> {
        let paths = StatsPaths::new(dir);

        let collection = SqliteStatStore::create(paths.collection_store())?;
        snapshot.collection.write(&collection)?;
        let ctf: Vec<(String, f64)> = snapshot
            .ctf
            .iter()
            .map(|(term, n)| (keys::term_key(term, keys::CTF), *n as f64))
            .collect();
        collection.put_batch(&ctf)?;
        collection.finish()?;

        snapshot
            .sources
            .par_iter()
            .map(|(id, shard)| {
                let store = SqliteStatStore::create(paths.shard_store(ShardSet::Sources, id))?;
                shard.write(&store)?;
                store.finish()
            })
            .collect::<Result<Vec<()>>>()?;

        let mut topics = BTreeMap::new();
        for (topic, members) in &snapshot.topics {
            let store = SqliteStatStore::create(paths.shard_store(ShardSet::Topics, topic))?;
            let size = write_topic(&store, members, &snapshot.sources)?;
            store.finish()?;
            topics.insert(
                topic.clone(),
                TopicEntry {
                    size,
                    members: members.clone(),
                },
            );
        }

        let manifest = BuildManifest {
            format_version: FORMAT_VERSION,
            built_at: Utc::now(),
            num_docs: snapshot.collection.size,
            total_terms: snapshot.collection.terms,
            mu: self.mu,
            sources: snapshot
                .sources
                .iter()
                .map(|(id, s)| (id.clone(), s.size))
                .collect(),
            topics,
        };
        manifest.save(&paths.manifest())?;
        Ok(manifest)
    }
}

fn snapshot_mut<'s>(
    sources: &'s mut BTreeMap<ShardId, ShardSnapshot>,
    id: &str,
) -> &'s mut ShardSnapshot {
    sources.entry(id.to_string()).or_default()
}

/// Sum member moments into a topic store; returns the topic size.
fn write_topic(
    store: &dyn StatStore,
    members: &[ShardId],
    sources: &BTreeMap<ShardId, ShardSnapshot>,
) -> Result<u64> {
    let mut size = 0;
    let mut min_f: BTreeMap<&str, f64> = BTreeMap::new();
    for member in members {
        let Some(shard) = sources.get(member) else {
            continue;
        };
        size += shard.size;
        let mut deltas = Vec::with_capacity(shard.moments.len() * 3 + 2);
        deltas.push((keys::SHARD_SIZE.to_string(), shard.size as f64));
        deltas.push((keys::SHARD_TERMS.to_string(), shard.terms as f64));
        for (term, m) in &shard.moments {
            deltas.push((keys::term_key(term, keys::DF), m.df as f64));
            deltas.push((keys::term_key(term, keys::SUM_F), m.sum_f));
            deltas.push((keys::term_key(term, keys::SUM_F2), m.sum_f2));
            let min = min_f.entry(term.as_str()).or_insert(f64::INFINITY);
            *min = min.min(m.min_f);
        }
        store.add_batch(&deltas)?;
    }
    let mins: Vec<(String, f64)> = min_f
        .into_iter()
        .map(|(term, min)| (keys::term_key(term, keys::MIN_F), min))
        .collect();
    store.put_batch(&mins)?;
    Ok(size)
}

/// Visit every (term, live doc, tf) of `field` in a segment.
fn walk_postings(
    segment: &SegmentReader,
    field: tantivy::schema::Field,
    mut visit: impl FnMut(&str, u32, u32),
) -> Result<()> {
    let inverted = segment.inverted_index(field)?;
    let alive = segment.alive_bitset();
    let mut stream = inverted.terms().stream()?;
    while stream.advance() {
        let Ok(term) = std::str::from_utf8(stream.key()) else {
            continue;
        };
        let mut postings =
            inverted.read_postings_from_terminfo(stream.value(), IndexRecordOption::WithFreqs)?;
        let mut doc = postings.doc();
        while doc != TERMINATED {
            if alive.is_none_or(|bits| bits.is_alive(doc)) {
                visit(term, doc, postings.term_freq());
            }
            doc = postings.advance();
        }
    }
    Ok(())
}

/// Replace `target` with `staged`. Readers see either directory, never a
/// partial one.
fn swap_into_place(staged: PathBuf, target: &Path) -> Result<()> {
    if !target.exists() {
        std::fs::rename(&staged, target)?;
        return Ok(());
    }
    let mut retired = target.as_os_str().to_owned();
    retired.push(format!(".old-{}", std::process::id()));
    let retired = PathBuf::from(retired);

    std::fs::rename(target, &retired)?;
    if let Err(e) = std::fs::rename(&staged, target) {
        // Put the previous statistics back before failing.
        std::fs::rename(&retired, target)?;
        return Err(ShardselError::BuildFailed(format!(
            "swap {} into place: {e}",
            staged.display()
        )));
    }
    if let Err(e) = std::fs::remove_dir_all(&retired) {
        warn!(path = %retired.display(), error = %e, "could not remove previous statistics");
    }
    Ok(())
}
