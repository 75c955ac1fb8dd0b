//! In-memory document cache and the current search index.
//!
//! Readers receive `Arc` handles to immutable documents and indexes. Writers
//! replace handles, never the data behind them, so a read never observes a
//! half-written document. A full cycle installs its corpus and index under a
//! single write lock.

use crate::{Document, Result, SearchHit, SearchIndex};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

#[derive(Debug, Default)]
struct StoreInner {
    docs: HashMap<String, Arc<Document>>,
    index: Option<Arc<SearchIndex>>,
}

/// Latest document per key plus the index built over them.
#[derive(Debug, Default)]
pub struct DocumentStore {
    inner: RwLock<StoreInner>,
}

impl DocumentStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Document for `key`, if cached.
    pub fn get(&self, key: &str) -> Option<Arc<Document>> {
        self.read_inner(|inner| inner.docs.get(key).cloned())
    }

    /// Whether a document for `key` is cached.
    pub fn contains(&self, key: &str) -> bool {
        self.read_inner(|inner| inner.docs.contains_key(key))
    }

    /// Number of cached documents.
    pub fn len(&self) -> usize {
        self.read_inner(|inner| inner.docs.len())
    }

    /// Whether the store holds no documents.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every cached document, sorted by key.
    pub fn corpus(&self) -> Vec<Arc<Document>> {
        let mut docs: Vec<Arc<Document>> =
            self.read_inner(|inner| inner.docs.values().cloned().collect());
        docs.sort_by(|a, b| a.key.cmp(&b.key));
        docs
    }

    /// The current index, if one was installed.
    pub fn index(&self) -> Option<Arc<SearchIndex>> {
        self.read_inner(|inner| inner.index.clone())
    }

    /// Insert or replace one document, leaving the index untouched.
    pub fn put(&self, doc: Document) {
        let key = doc.key.clone();
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if inner.docs.insert(key.clone(), Arc::new(doc)).is_some() {
            debug!(%key, "Replaced cached document");
        }
    }

    /// Replace one document and the index together.
    pub fn put_indexed(&self, doc: Document, index: SearchIndex) {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.docs.insert(doc.key.clone(), Arc::new(doc));
        inner.index = Some(Arc::new(index));
    }

    /// Replace the whole corpus and the index in one step.
    ///
    /// Keys absent from `docs` are dropped.
    pub fn install(&self, docs: Vec<Document>, index: SearchIndex) {
        let docs: HashMap<String, Arc<Document>> = docs
            .into_iter()
            .map(|d| (d.key.clone(), Arc::new(d)))
            .collect();
        let count = docs.len();

        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        inner.docs = docs;
        inner.index = Some(Arc::new(index));
        drop(inner);

        debug!(documents = count, "Installed corpus and index");
    }

    /// Search the current index; an empty store has no hits.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        match self.index() {
            Some(index) => index.search(query, limit),
            None => Ok(Vec::new()),
        }
    }

    fn read_inner<T>(&self, f: impl FnOnce(&StoreInner) -> T) -> T {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&inner)
    }
}
