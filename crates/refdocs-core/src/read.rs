//! Non-blocking read path over the document store.
//!
//! A hit is served straight from memory. A miss on a configured key never
//! waits on the network: it queues a [`FetchRequest`] for the scheduler and
//! returns a placeholder at once.

use crate::{Document, DocumentStore, Error, Result, SearchHit, TrackedRoute};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{debug, warn};

/// Capacity of the on-demand ingestion queue.
pub const REQUEST_QUEUE_CAPACITY: usize = 64;

/// Request to ingest one document outside the regular cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Key of the missing document.
    pub key: String,
}

/// Outcome of a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadResult {
    /// The cached document.
    Ready(Arc<Document>),
    /// Not cached yet; ingestion has been requested.
    Pending {
        /// Requested key.
        key: String,
        /// Placeholder content to show meanwhile.
        placeholder: String,
    },
}

impl ReadResult {
    /// Requested key.
    pub fn key(&self) -> &str {
        match self {
            Self::Ready(doc) => &doc.key,
            Self::Pending { key, .. } => key,
        }
    }

    /// Document body or placeholder text.
    pub fn content(&self) -> &str {
        match self {
            Self::Ready(doc) => &doc.body,
            Self::Pending { placeholder, .. } => placeholder,
        }
    }

    /// Whether the result is a placeholder.
    pub const fn is_pending(&self) -> bool {
        matches!(self, Self::Pending { .. })
    }

    /// Flatten into the `{key, content}` shape handed to the presentation layer.
    pub fn to_response(&self) -> ReadResponse {
        ReadResponse {
            key: self.key().to_string(),
            content: self.content().to_string(),
            pending: self.is_pending(),
        }
    }
}

/// Serializable read response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadResponse {
    /// Document key.
    pub key: String,
    /// Body or placeholder.
    pub content: String,
    /// True when `content` is a placeholder.
    pub pending: bool,
}

/// Placeholder returned while a document is being ingested.
pub fn pending_body(key: &str) -> String {
    format!("Doc Pending: {key}")
}

/// Read access to cached documents.
#[derive(Debug, Clone)]
pub struct ReadService {
    store: Arc<DocumentStore>,
    known: Arc<HashSet<String>>,
    requests: mpsc::Sender<FetchRequest>,
}

impl ReadService {
    /// Serve reads from `store`; misses on content routes are sent to `requests`.
    pub fn new(
        store: Arc<DocumentStore>,
        routes: &[TrackedRoute],
        requests: mpsc::Sender<FetchRequest>,
    ) -> Self {
        let known = routes
            .iter()
            .filter(|r| r.is_content())
            .map(|r| r.permalink.clone())
            .collect();
        Self {
            store,
            known: Arc::new(known),
            requests,
        }
    }

    /// Read the document for `key`.
    ///
    /// Keys that belong to no content route are [`Error::NotFound`].
    pub fn read(&self, key: &str) -> Result<ReadResult> {
        if let Some(doc) = self.store.get(key) {
            return Ok(ReadResult::Ready(doc));
        }
        if !self.known.contains(key) {
            return Err(Error::NotFound(format!("No document for {key}")));
        }

        match self.requests.try_send(FetchRequest {
            key: key.to_string(),
        }) {
            Ok(()) => debug!(%key, "Queued on-demand ingestion"),
            Err(TrySendError::Full(_)) => {
                warn!(%key, "Ingestion queue full; request dropped");
            },
            Err(TrySendError::Closed(_)) => {
                warn!(%key, "Scheduler stopped; request dropped");
            },
        }

        Ok(ReadResult::Pending {
            key: key.to_string(),
            placeholder: pending_body(key),
        })
    }

    /// Search the current index.
    pub fn search(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.store.search(query, limit)
    }

    /// The store reads are served from.
    pub const fn store(&self) -> &Arc<DocumentStore> {
        &self.store
    }
}
