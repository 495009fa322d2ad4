//! Tantivy corpus index
//!
//! Holds documents labelled with their source shard. The same schema backs
//! the full collection (walked by the statistics builder) and the
//! centralized sample index (searched by content-sample strategies).

use std::collections::BTreeMap;
use std::path::Path;

use parking_lot::Mutex;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, IndexRecordOption, STORED, STRING, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::{
    DocId, DocSet, Index, IndexReader, IndexWriter, ReloadPolicy, Searcher, SegmentReader,
    TERMINATED, TantivyDocument, Term,
};
use tracing::debug;

use crate::corpus::analyzer::{ANALYZER_NAME, QueryAnalyzer};
use crate::corpus::{CorpusDocument, SampleHit, ShardId};
use crate::error::{Result, ShardselError};
use crate::stats::sizes::ShardStats;

const WRITER_HEAP_BYTES: usize = 50_000_000;

/// Field handles for the corpus schema
#[derive(Debug, Clone, Copy)]
pub(crate) struct CorpusFields {
    pub id: Field,
    pub shard: Field,
    pub title: Field,
    pub body: Field,
}

/// Corpus index over tantivy.
pub struct CorpusIndex {
    index: Index,
    reader: IndexReader,
    writer: Mutex<Option<IndexWriter>>,
    fields: CorpusFields,
    analyzer: QueryAnalyzer,
}

impl std::fmt::Debug for CorpusIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CorpusIndex")
            .field("num_docs", &self.num_docs())
            .finish_non_exhaustive()
    }
}

impl CorpusIndex {
    /// Open or create an index at the given path.
    pub fn open(path: impl AsRef<Path>, analyzer: &QueryAnalyzer) -> Result<Self> {
        let path = path.as_ref();
        std::fs::create_dir_all(path)?;

        let index = if Self::exists(path) {
            Index::open_in_dir(path)?
        } else {
            Index::create_in_dir(path, build_schema())?
        };
        Self::from_index(index, analyzer)
    }

    /// Open an index only if one was created at `path`.
    pub fn open_existing(path: impl AsRef<Path>, analyzer: &QueryAnalyzer) -> Result<Option<Self>> {
        let path = path.as_ref();
        if !Self::exists(path) {
            return Ok(None);
        }
        Self::from_index(Index::open_in_dir(path)?, analyzer).map(Some)
    }

    /// Open an in-memory index (for testing).
    pub fn open_in_memory(analyzer: &QueryAnalyzer) -> Result<Self> {
        Self::from_index(Index::create_in_ram(build_schema()), analyzer)
    }

    /// Whether an index has been created at `path`.
    pub fn exists(path: &Path) -> bool {
        path.join("meta.json").exists()
    }

    fn from_index(index: Index, analyzer: &QueryAnalyzer) -> Result<Self> {
        analyzer.register(&index);
        let fields = extract_fields(&index.schema())?;

        // Manual reload: readers refresh only after our own commits.
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()?;

        Ok(Self {
            index,
            reader,
            writer: Mutex::new(None),
            fields,
            analyzer: analyzer.clone(),
        })
    }

    fn with_writer<T>(&self, f: impl FnOnce(&mut IndexWriter) -> Result<T>) -> Result<T> {
        let mut guard = self.writer.lock();
        if guard.is_none() {
            // One indexing thread keeps document order, and therefore the
            // statistics build, deterministic.
            *guard = Some(self.index.writer_with_num_threads(1, WRITER_HEAP_BYTES)?);
        }
        match guard.as_mut() {
            Some(writer) => f(writer),
            None => Err(ShardselError::SearchIndex(
                tantivy::TantivyError::InternalError("index writer unavailable".into()),
            )),
        }
    }

    /// Add (or replace) a document.
    pub fn add_document(&self, doc: &CorpusDocument) -> Result<()> {
        let mut tdoc = TantivyDocument::new();
        tdoc.add_text(self.fields.id, &doc.id);
        tdoc.add_text(self.fields.shard, &doc.shard);
        tdoc.add_text(self.fields.title, &doc.title);
        tdoc.add_text(self.fields.body, &doc.body);

        let id_term = Term::from_field_text(self.fields.id, &doc.id);
        self.with_writer(|writer| {
            writer.delete_term(id_term);
            writer.add_document(tdoc)?;
            Ok(())
        })
    }

    /// Add documents in a batch.
    pub fn add_documents(&self, docs: &[CorpusDocument]) -> Result<usize> {
        for doc in docs {
            self.add_document(doc)?;
        }
        Ok(docs.len())
    }

    /// Delete a document by id.
    pub fn delete_document(&self, doc_id: &str) -> Result<()> {
        let id_term = Term::from_field_text(self.fields.id, doc_id);
        self.with_writer(|writer| {
            writer.delete_term(id_term);
            Ok(())
        })
    }

    /// Commit pending changes and reload the reader.
    pub fn commit(&self) -> Result<()> {
        self.with_writer(|writer| {
            writer.commit()?;
            Ok(())
        })?;
        self.reader.reload()?;
        Ok(())
    }

    /// Remove every document.
    pub fn clear(&self) -> Result<()> {
        self.with_writer(|writer| {
            writer.delete_all_documents()?;
            writer.commit()?;
            Ok(())
        })?;
        self.reader.reload()?;
        Ok(())
    }

    /// Number of live documents.
    pub fn num_docs(&self) -> u64 {
        self.reader.searcher().num_docs()
    }

    pub fn is_empty(&self) -> bool {
        self.num_docs() == 0
    }

    pub fn analyzer(&self) -> &QueryAnalyzer {
        &self.analyzer
    }

    pub(crate) fn searcher(&self) -> Searcher {
        self.reader.searcher()
    }

    pub(crate) const fn fields(&self) -> CorpusFields {
        self.fields
    }

    /// Ranked documents for `query`, each carrying its shard label.
    pub fn search_sample(&self, query: &str, limit: usize) -> Result<Vec<SampleHit>> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        // Free text: analyzed terms OR-ed together, no query syntax.
        let clauses: Vec<(Occur, Box<dyn Query>)> = self
            .analyzer
            .terms(query)
            .iter()
            .map(|text| {
                let term = Term::from_field_text(self.fields.body, text);
                let clause: Box<dyn Query> =
                    Box::new(TermQuery::new(term, IndexRecordOption::WithFreqs));
                (Occur::Should, clause)
            })
            .collect();
        if clauses.is_empty() {
            return Ok(Vec::new());
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher.search(&BooleanQuery::new(clauses), &TopDocs::with_limit(limit))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (rank, (score, doc_address)) in top_docs.into_iter().enumerate() {
            let doc: TantivyDocument = searcher.doc(doc_address)?;
            let doc_id = doc
                .get_first(self.fields.id)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let shard = doc
                .get_first(self.fields.shard)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            hits.push(SampleHit {
                doc_id,
                shard,
                score,
                rank,
            });
        }
        debug!(query, hits = hits.len(), "sample index search");
        Ok(hits)
    }

    /// Live document count per shard label.
    pub fn label_counts(&self) -> Result<ShardStats> {
        let searcher = self.reader.searcher();
        let mut counts: BTreeMap<ShardId, u64> = BTreeMap::new();
        for segment in searcher.segment_readers() {
            for_each_label(segment, self.fields.shard, |label, docs| {
                *counts.entry(label.to_string()).or_insert(0) += docs.len() as u64;
            })?;
        }
        Ok(ShardStats::from_sizes(counts))
    }
}

/// Visit every shard label in a segment with its live documents.
pub(crate) fn for_each_label(
    segment: &SegmentReader,
    shard_field: Field,
    mut visit: impl FnMut(&str, &[DocId]),
) -> Result<()> {
    let inverted = segment.inverted_index(shard_field)?;
    let alive = segment.alive_bitset();
    let mut stream = inverted.terms().stream()?;
    let mut docs = Vec::new();
    while stream.advance() {
        let Ok(label) = std::str::from_utf8(stream.key()) else {
            continue;
        };
        let mut postings =
            inverted.read_postings_from_terminfo(stream.value(), IndexRecordOption::Basic)?;
        docs.clear();
        let mut doc = postings.doc();
        while doc != TERMINATED {
            if alive.is_none_or(|bits| bits.is_alive(doc)) {
                docs.push(doc);
            }
            doc = postings.advance();
        }
        if !docs.is_empty() {
            visit(label, &docs);
        }
    }
    Ok(())
}

/// Build the tantivy schema for corpus documents
fn build_schema() -> Schema {
    let mut builder = Schema::builder();

    let body_options = TextOptions::default().set_indexing_options(
        TextFieldIndexing::default()
            .set_tokenizer(ANALYZER_NAME)
            .set_index_option(IndexRecordOption::WithFreqs),
    );

    builder.add_text_field("id", STRING | STORED);
    builder.add_text_field("shard", STRING | STORED);
    builder.add_text_field("title", STORED);
    builder.add_text_field("body", body_options);

    builder.build()
}

fn extract_fields(schema: &Schema) -> Result<CorpusFields> {
    let field = |name: &str| {
        schema.get_field(name).map_err(|_| {
            ShardselError::SearchIndex(tantivy::TantivyError::SchemaError(format!(
                "missing {name} field"
            )))
        })
    };
    Ok(CorpusFields {
        id: field("id")?,
        shard: field("shard")?,
        title: field("title")?,
        body: field("body")?,
    })
}
