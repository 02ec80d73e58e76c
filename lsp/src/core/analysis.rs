//! Shared analysis state: the document store plus both caches.
//!
//! Wrapped in a mutex and handed to worker closures; the sequential worker
//! is what actually serializes compiler access, the mutex only makes the
//! handoff between threads sound.

use crate::core::cache::{ParseCache, ParseSnapshot, SnapshotError};
use crate::core::document::DocumentStore;
use crate::resolve::end_position::EndPositionResolver;
use lsp_types::Uri;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct Analysis {
    pub store: DocumentStore,
    pub cache: ParseCache,
    pub ends: EndPositionResolver,
}

pub type SharedAnalysis = Arc<Mutex<Analysis>>;

impl Analysis {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> SharedAnalysis {
        Arc::new(Mutex::new(Self::new()))
    }

    /// Snapshot for the current text of `uri`, through the parse cache.
    pub fn snapshot(&mut self, uri: &Uri) -> Result<Arc<ParseSnapshot>, SnapshotError> {
        self.cache.snapshot(&self.store, uri)
    }
}
