//! Document-context cache.
//!
//! Document-level context (summary + key concepts) is produced by an
//! external enrichment worker after upload. The cache is an explicit object
//! owned by the invoker and passed into pipeline invocations — there is no
//! process-wide state. Invalidate on document update.

use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::DocumentContext;

/// Cache of per-document context, keyed by document id.
#[derive(Debug, Default)]
pub struct DocumentContextCache {
    entries: RwLock<HashMap<Uuid, DocumentContext>>,
}

impl DocumentContextCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the context for a document.
    pub async fn get(&self, document_id: Uuid) -> Option<DocumentContext> {
        self.entries.read().await.get(&document_id).cloned()
    }

    /// Store (or replace) the context for a document.
    pub async fn insert(&self, document_id: Uuid, context: DocumentContext) {
        self.entries.write().await.insert(document_id, context);
    }

    /// Drop the cached context for a document. Call on document update.
    pub async fn invalidate(&self, document_id: Uuid) {
        self.entries.write().await.remove(&document_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
