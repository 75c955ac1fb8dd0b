//! Full-text index over the document corpus.
//!
//! An index is assembled with [`IndexBuilder`] and frozen into a
//! [`SearchIndex`]. A built index is never modified: the refresh cycle starts
//! from an empty builder every time, and on-demand ingestion builds a new
//! index from the current corpus before swapping it in.
//!
//! Four text fields are indexed. Relevance weights are applied by the query
//! parser at search time, so the stored index is independent of the boosts.

use crate::{Document, Error, Result, SearchHit};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tantivy::collector::TopDocs;
use tantivy::query::QueryParser;
use tantivy::schema::{Field, STORED, STRING, Schema, TEXT, Value};
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, doc};
use tracing::{debug, info};

/// Format marker written into serialized indexes.
pub const INDEX_FORMAT_VERSION: u32 = 1;

const WRITER_HEAP_BYTES: usize = 50_000_000;
const SNIPPET_CONTEXT: usize = 60;
const SNIPPET_MAX_LEN: usize = 160;

/// Per-field relevance weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FieldBoosts {
    /// Weight of title matches.
    pub title: f32,
    /// Weight of description matches.
    pub description: f32,
    /// Weight of body matches.
    pub body: f32,
    /// Weight of permalink matches.
    pub permalink: f32,
}

impl Default for FieldBoosts {
    fn default() -> Self {
        Self {
            title: 10.0,
            description: 5.0,
            body: 1.0,
            permalink: 1.0,
        }
    }
}

/// The indexed view of one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Document key.
    pub key: String,
    /// Title text.
    pub title: String,
    /// Description text.
    pub description: String,
    /// Body as plain text, markup removed.
    pub body: String,
    /// Site permalink.
    pub permalink: String,
}

impl IndexEntry {
    fn from_document(doc: &Document, markup: &Regex) -> Self {
        Self {
            key: doc.key.clone(),
            title: doc.title.clone(),
            description: doc.description.clone(),
            body: plain_text(markup, &doc.body),
            permalink: doc.permalink.clone(),
        }
    }
}

/// Portable form of a [`SearchIndex`], embedded in the persisted snapshot.
///
/// Entries are sorted by key, so the same corpus always serializes to the
/// same bytes regardless of the order documents were added in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedIndex {
    /// Format marker, see [`INDEX_FORMAT_VERSION`].
    pub version: u32,
    /// Boosts the index was queried with.
    pub boosts: FieldBoosts,
    /// Indexed entries in key order.
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Copy)]
struct IndexFields {
    key: Field,
    title: Field,
    description: Field,
    body: Field,
    permalink: Field,
}

impl IndexFields {
    fn schema() -> (Schema, Self) {
        let mut builder = Schema::builder();
        let fields = Self {
            key: builder.add_text_field("key", STRING | STORED),
            title: builder.add_text_field("title", TEXT | STORED),
            description: builder.add_text_field("description", TEXT | STORED),
            body: builder.add_text_field("body", TEXT | STORED),
            permalink: builder.add_text_field("permalink", TEXT | STORED),
        };
        (builder.build(), fields)
    }
}

/// Accumulates documents for a new index.
///
/// Entries are keyed by document key; adding a key twice keeps only the
/// later document, so an index never holds duplicates.
#[derive(Debug, Clone)]
pub struct IndexBuilder {
    boosts: FieldBoosts,
    entries: BTreeMap<String, IndexEntry>,
    markup: Regex,
}

impl IndexBuilder {
    /// Start an empty builder.
    pub fn new(boosts: FieldBoosts) -> Result<Self> {
        let markup = Regex::new(r"<[^>]*>")
            .map_err(|e| Error::Index(format!("Invalid markup pattern: {e}")))?;
        Ok(Self {
            boosts,
            entries: BTreeMap::new(),
            markup,
        })
    }

    /// Add one document.
    pub fn add_document(&mut self, doc: &Document) {
        let entry = IndexEntry::from_document(doc, &self.markup);
        if self.entries.insert(entry.key.clone(), entry).is_some() {
            debug!(key = %doc.key, "Replaced index entry");
        }
    }

    /// Add every document from an iterator.
    pub fn extend<'a>(&mut self, docs: impl IntoIterator<Item = &'a Document>) {
        for doc in docs {
            self.add_document(doc);
        }
    }

    /// Number of documents added so far.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no documents were added.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build the index.
    pub fn build(self) -> Result<SearchIndex> {
        SearchIndex::from_entries(self.boosts, self.entries.into_values().collect())
    }
}

/// An immutable, queryable full-text index.
pub struct SearchIndex {
    index: Index,
    reader: IndexReader,
    fields: IndexFields,
    boosts: FieldBoosts,
    entries: Vec<IndexEntry>,
}

impl fmt::Debug for SearchIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchIndex")
            .field("boosts", &self.boosts)
            .field("documents", &self.entries.len())
            .finish_non_exhaustive()
    }
}

impl SearchIndex {
    /// Build an index over a whole corpus.
    pub fn build<'a>(
        boosts: FieldBoosts,
        docs: impl IntoIterator<Item = &'a Document>,
    ) -> Result<Self> {
        let mut builder = IndexBuilder::new(boosts)?;
        builder.extend(docs);
        builder.build()
    }

    /// Rebuild an index from its serialized form.
    pub fn from_serialized(serialized: SerializedIndex) -> Result<Self> {
        if serialized.version != INDEX_FORMAT_VERSION {
            return Err(Error::Index(format!(
                "Unsupported index format version {}",
                serialized.version
            )));
        }
        let mut entries = serialized.entries;
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries.dedup_by(|a, b| a.key == b.key);
        Self::from_entries(serialized.boosts, entries)
    }

    fn from_entries(boosts: FieldBoosts, entries: Vec<IndexEntry>) -> Result<Self> {
        let (schema, fields) = IndexFields::schema();
        let index = Index::create_in_ram(schema);

        let mut writer: IndexWriter = index
            .writer_with_num_threads(1, WRITER_HEAP_BYTES)
            .map_err(|e| Error::Index(format!("Failed to create writer: {e}")))?;

        for entry in &entries {
            writer
                .add_document(doc!(
                    fields.key => entry.key.as_str(),
                    fields.title => entry.title.as_str(),
                    fields.description => entry.description.as_str(),
                    fields.body => entry.body.as_str(),
                    fields.permalink => entry.permalink.as_str(),
                ))
                .map_err(|e| Error::Index(format!("Failed to add document: {e}")))?;
        }

        writer
            .commit()
            .map_err(|e| Error::Index(format!("Failed to commit: {e}")))?;

        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| Error::Index(format!("Failed to create reader: {e}")))?;

        info!(documents = entries.len(), "Built search index");

        Ok(Self {
            index,
            reader,
            fields,
            boosts,
            entries,
        })
    }

    /// Serialize the index for persistence.
    pub fn serialize(&self) -> SerializedIndex {
        SerializedIndex {
            version: INDEX_FORMAT_VERSION,
            boosts: self.boosts,
            entries: self.entries.clone(),
        }
    }

    /// Boosts applied at query time.
    pub const fn boosts(&self) -> FieldBoosts {
        self.boosts
    }

    /// Indexed entries in key order.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Whether a document key is indexed.
    pub fn contains(&self, key: &str) -> bool {
        self.entries
            .binary_search_by(|e| e.key.as_str().cmp(key))
            .is_ok()
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Search title, description, body and permalink with field boosts.
    ///
    /// Malformed query syntax never fails the search; the parser keeps what
    /// it can interpret.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query_str = query.trim();
        if query_str.is_empty() || limit == 0 || self.entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut parser = QueryParser::for_index(
            &self.index,
            vec![
                self.fields.title,
                self.fields.description,
                self.fields.body,
                self.fields.permalink,
            ],
        );
        parser.set_field_boost(self.fields.title, self.boosts.title);
        parser.set_field_boost(self.fields.description, self.boosts.description);
        parser.set_field_boost(self.fields.body, self.boosts.body);
        parser.set_field_boost(self.fields.permalink, self.boosts.permalink);

        let (parsed, errors) = parser.parse_query_lenient(query_str);
        if !errors.is_empty() {
            debug!(query = %query_str, errors = errors.len(), "Query parsed leniently");
        }

        let searcher = self.reader.searcher();
        let top_docs = searcher
            .search(&parsed, &TopDocs::with_limit(limit))
            .map_err(|e| Error::Index(format!("Search failed: {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let stored: TantivyDocument = searcher
                .doc(address)
                .map_err(|e| Error::Index(format!("Failed to retrieve doc: {e}")))?;

            let body = field_text(&stored, self.fields.body);
            hits.push(SearchHit {
                key: field_text(&stored, self.fields.key),
                title: field_text(&stored, self.fields.title),
                permalink: field_text(&stored, self.fields.permalink),
                snippet: snippet(&body, query_str),
                score,
            });
        }

        debug!(query = %query_str, hits = hits.len(), "Search complete");
        Ok(hits)
    }
}

fn field_text(doc: &TantivyDocument, field: Field) -> String {
    doc.get_first(field)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_default()
}

fn plain_text(markup: &Regex, html: &str) -> String {
    let stripped = markup.replace_all(html, " ");
    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Excerpt of `content` around the first query term it contains.
fn snippet(content: &str, query: &str) -> String {
    let lower = content.to_lowercase();
    let position = if lower.len() == content.len() {
        query
            .split_whitespace()
            .map(|t| t.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
            .filter(|t| !t.is_empty())
            .find_map(|t| lower.find(&t).map(|pos| (pos, t.len())))
    } else {
        None
    };

    let Some((pos, len)) = position else {
        return truncate(content, SNIPPET_MAX_LEN);
    };

    let start = floor_char_boundary(content, pos.saturating_sub(SNIPPET_CONTEXT));
    let end = ceil_char_boundary(content, (pos + len + SNIPPET_CONTEXT).min(content.len()));

    let mut out = String::with_capacity(end - start + 6);
    if start > 0 {
        out.push_str("...");
    }
    out.push_str(&content[start..end]);
    if end < content.len() {
        out.push_str("...");
    }
    out
}

fn truncate(content: &str, max_len: usize) -> String {
    if content.len() <= max_len {
        return content.to_string();
    }
    let end = floor_char_boundary(content, max_len);
    format!("{}...", &content[..end])
}

fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}

fn ceil_char_boundary(s: &str, mut index: usize) -> usize {
    while index < s.len() && !s.is_char_boundary(index) {
        index += 1;
    }
    index
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn doc(key: &str, title: &str, description: &str, body: &str) -> Document {
        Document {
            key: key.to_string(),
            body: body.to_string(),
            title: title.to_string(),
            description: description.to_string(),
            permalink: key.to_string(),
            repo: "yahoo/fluxible".to_string(),
            path: "docs/x.md".to_string(),
            git_ref: Some("master".to_string()),
            stub: false,
        }
    }

    fn corpus() -> Vec<Document> {
        vec![
            doc(
                "/api/actions.html",
                "Actions",
                "Dispatching payloads",
                "<p>Actions are called with a context and a payload.</p>",
            ),
            doc(
                "/api/stores.html",
                "Stores",
                "Holding state",
                "<p>Stores receive actions and emit change events. Actions actions actions.</p>",
            ),
            doc(
                "/quick-start.html",
                "Quick Start",
                "Getting started",
                "<h1>Install</h1><p>Run <code>npm install fluxible</code>.</p>",
            ),
        ]
    }

    #[test]
    fn test_title_match_outranks_body_match() {
        let index = SearchIndex::build(FieldBoosts::default(), &corpus()).unwrap();
        let hits = index.search("actions", 10).unwrap();

        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].key, "/api/actions.html");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn test_hits_carry_stored_fields_and_snippet() {
        let index = SearchIndex::build(FieldBoosts::default(), &corpus()).unwrap();
        let hits = index.search("fluxible", 10).unwrap();

        assert_eq!(hits.len(), 1);
        let hit = &hits[0];
        assert_eq!(hit.title, "Quick Start");
        assert_eq!(hit.permalink, "/quick-start.html");
        assert!(hit.snippet.contains("npm install fluxible"));
        assert!(!hit.snippet.contains("<code>"));
    }

    #[test]
    fn test_empty_query_and_zero_limit_return_nothing() {
        let index = SearchIndex::build(FieldBoosts::default(), &corpus()).unwrap();
        assert!(index.search("   ", 10).unwrap().is_empty());
        assert!(index.search("actions", 0).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_query_does_not_fail() {
        let index = SearchIndex::build(FieldBoosts::default(), &corpus()).unwrap();
        let hits = index.search("stores AND (", 10).unwrap();
        assert!(hits.iter().any(|h| h.key == "/api/stores.html"));
    }

    #[test]
    fn test_builder_keeps_one_entry_per_key() {
        let mut builder = IndexBuilder::new(FieldBoosts::default()).unwrap();
        let docs = corpus();
        builder.extend(&docs);
        builder.extend(&docs);
        builder.add_document(&doc("/api/actions.html", "Actions v2", "", "new body"));
        assert_eq!(builder.len(), 3);

        let index = builder.build().unwrap();
        assert_eq!(index.len(), 3);
        let hits = index.search("v2", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].title, "Actions v2");
    }

    #[test]
    fn test_serialization_is_order_independent() {
        let docs = corpus();
        let reversed: Vec<Document> = docs.iter().rev().cloned().collect();

        let a = SearchIndex::build(FieldBoosts::default(), &docs).unwrap();
        let b = SearchIndex::build(FieldBoosts::default(), &reversed).unwrap();

        let a_json = serde_json::to_string(&a.serialize()).unwrap();
        let b_json = serde_json::to_string(&b.serialize()).unwrap();
        assert_eq!(a_json, b_json);
    }

    #[test]
    fn test_deserialized_index_answers_queries() {
        let original = SearchIndex::build(FieldBoosts::default(), &corpus()).unwrap();
        let restored = SearchIndex::from_serialized(original.serialize()).unwrap();

        assert_eq!(restored.len(), 3);
        assert!(restored.contains("/quick-start.html"));
        assert_eq!(
            restored.search("install", 5).unwrap()[0].key,
            "/quick-start.html"
        );
    }

    #[test]
    fn test_unknown_format_version_is_rejected() {
        let mut serialized = SearchIndex::build(FieldBoosts::default(), &corpus())
            .unwrap()
            .serialize();
        serialized.version = INDEX_FORMAT_VERSION + 1;
        assert!(matches!(
            SearchIndex::from_serialized(serialized),
            Err(Error::Index(_))
        ));
    }

    #[test]
    fn test_snippet_respects_char_boundaries() {
        let content = format!("{}target{}", "é".repeat(80), "ü".repeat(80));
        let out = snippet(&content, "target");
        assert!(out.contains("target"));
        assert!(out.starts_with("..."));
        assert!(out.ends_with("..."));
    }
}
