//! Caching for compile results.
//!
//! Two caches, both bounded with access-order eviction:
//! - [`ParseCache`]: content-keyed snapshots of whole compiles (capacity 10),
//! - the end-position cache in `resolve::end_position` (capacity 100),
//! both built on the generic [`LruCache`].

use crate::core::document::DocumentStore;
use lsp_types::Uri;
use lume_frontend::{Ast, ContextToken, Issue};
use std::collections::{HashMap, VecDeque};
use std::hash::Hash;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A fixed-capacity map with least-recently-used eviction.
///
/// Reads update recency, so `get` takes `&mut self`.
#[derive(Debug)]
pub struct LruCache<K, V> {
    entries: HashMap<K, V>,
    access_order: VecDeque<K>,
    capacity: usize,
}

impl<K: Hash + Eq + Clone, V> LruCache<K, V> {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: HashMap::with_capacity(capacity),
            access_order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get(&mut self, key: &K) -> Option<&V> {
        if !self.entries.contains_key(key) {
            return None;
        }
        self.access_order.retain(|k| k != key);
        self.access_order.push_back(key.clone());
        self.entries.get(key)
    }

    pub fn insert(&mut self, key: K, value: V) {
        if self.entries.contains_key(&key) {
            self.access_order.retain(|k| k != &key);
        } else if self.entries.len() >= self.capacity {
            if let Some(lru) = self.access_order.pop_front() {
                self.entries.remove(&lru);
            }
        }
        self.access_order.push_back(key.clone());
        self.entries.insert(key, value);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.access_order.clear();
    }
}

/// Process-unique identity of one snapshot; keys the end-position cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SnapshotId(pub u64);

static NEXT_SNAPSHOT_ID: AtomicU64 = AtomicU64::new(1);

fn next_snapshot_id() -> SnapshotId {
    SnapshotId(NEXT_SNAPSHOT_ID.fetch_add(1, Ordering::Relaxed))
}

/// Immutable result of compiling one exact text of one document. Owns the
/// whole tree; shared by `Arc`, freed as a unit on eviction.
#[derive(Debug)]
pub struct ParseSnapshot {
    pub id: SnapshotId,
    pub uri: Uri,
    pub text: String,
    pub ast: Ast,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    /// Which global-table epoch this tree was resolved under.
    pub context: ContextToken,
}

impl ParseSnapshot {
    /// File id of the compiled document inside this snapshot's tree.
    pub fn file(&self) -> lume_frontend::FileId {
        self.ast
            .top_level
            .first()
            .map(|&d| self.ast.decl(d).pos.file)
            .unwrap_or(lume_frontend::FileId(1))
    }

    /// A cursor position in this snapshot's document.
    pub fn position(&self, line: u32, column: u32) -> lume_frontend::SourcePos {
        lume_frontend::SourcePos::new(self.file(), line, column)
    }
}

/// Why a snapshot could not be produced. Language errors are never this:
/// they land in [`ParseSnapshot::errors`].
#[derive(Debug)]
pub enum SnapshotError {
    /// The document is neither open nor readable from disk.
    UnknownDocument(String),
    /// The compiler itself blew up; a bug, not a language error.
    CompilerPanic(String),
}

impl std::fmt::Display for SnapshotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SnapshotError::UnknownDocument(uri) => write!(f, "unknown document: {uri}"),
            SnapshotError::CompilerPanic(msg) => write!(f, "compiler panicked: {msg}"),
        }
    }
}

impl std::error::Error for SnapshotError {}

pub const PARSE_CACHE_CAPACITY: usize = 10;

/// Content-keyed snapshot cache. Identical text always hits; any text
/// change misses and recompiles. Invalidation therefore needs no wiring to
/// the document store.
#[derive(Debug)]
pub struct ParseCache {
    entries: LruCache<(Uri, u64), Arc<ParseSnapshot>>,
    compile_count: u64,
}

impl ParseCache {
    pub fn new() -> Self {
        Self {
            entries: LruCache::new(PARSE_CACHE_CAPACITY),
            compile_count: 0,
        }
    }

    /// Snapshot for the current text of `uri`, compiling on miss.
    pub fn snapshot(
        &mut self,
        store: &DocumentStore,
        uri: &Uri,
    ) -> Result<Arc<ParseSnapshot>, SnapshotError> {
        let text = store
            .get_text(uri)
            .ok_or_else(|| SnapshotError::UnknownDocument(uri.as_str().to_string()))?;
        let key = (uri.clone(), content_hash(&text));
        if let Some(snap) = self.entries.get(&key) {
            if snap.text == text {
                return Ok(Arc::clone(snap));
            }
        }
        let snap = compile_snapshot(uri, text)?;
        self.compile_count += 1;
        self.entries.insert(key, Arc::clone(&snap));
        Ok(snap)
    }

    /// How many compiles this cache has performed. Exposed so tests can
    /// assert that identical text never recompiles.
    pub fn compile_count(&self) -> u64 {
        self.compile_count
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ParseCache {
    fn default() -> Self {
        Self::new()
    }
}

/// One uncached compile: reset the front end's process-wide tables, then
/// invoke it. The reset is mandatory; the front end leaks resolution
/// identity across compiles otherwise. A compiler panic is caught and
/// reported as an internal error instead of unwinding into the worker.
pub fn compile_snapshot(uri: &Uri, text: String) -> Result<Arc<ParseSnapshot>, SnapshotError> {
    lume_frontend::reset_tables();
    let name = uri.as_str().to_string();
    let compiled = catch_unwind(AssertUnwindSafe(|| lume_frontend::compile(&name, &text)))
        .map_err(|payload| SnapshotError::CompilerPanic(panic_message(&payload)))?;
    Ok(Arc::new(ParseSnapshot {
        id: next_snapshot_id(),
        uri: uri.clone(),
        text,
        ast: compiled.ast,
        errors: compiled.errors,
        warnings: compiled.warnings,
        context: compiled.context,
    }))
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Non-cryptographic content hash for the cache key. Full text equality is
/// checked on every hit, so a collision costs a recompile, never a wrong
/// snapshot.
pub fn content_hash(text: &str) -> u64 {
    use std::hash::Hasher;
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    hasher.write(text.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── LruCache ─────────────────────────────────────────────────────

    #[test]
    fn insert_and_get() {
        let mut cache = LruCache::new(4);
        cache.insert("a", 1);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"b"), None);
    }

    #[test]
    fn eviction_removes_least_recently_used() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.get(&"a");
        cache.insert("c", 3);
        assert_eq!(cache.get(&"b"), None);
        assert_eq!(cache.get(&"a"), Some(&1));
        assert_eq!(cache.get(&"c"), Some(&3));
    }

    #[test]
    fn reinsert_updates_value_without_growing() {
        let mut cache = LruCache::new(2);
        cache.insert("a", 1);
        cache.insert("a", 2);
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"a"), Some(&2));
    }

    #[test]
    fn capacity_is_respected() {
        let mut cache = LruCache::new(3);
        for i in 0..10 {
            cache.insert(i, i);
        }
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.capacity(), 3);
    }

    // ── content_hash ─────────────────────────────────────────────────

    #[test]
    fn hash_is_stable_and_content_sensitive() {
        assert_eq!(content_hash("x is"), content_hash("x is"));
        assert_ne!(content_hash("x is"), content_hash("y is"));
    }
}
