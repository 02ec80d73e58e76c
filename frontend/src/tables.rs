//! Process-wide resolution tables.
//!
//! The front end keeps its universe-scope symbol table and its member
//! lookup table in process-wide statics. [`compile`](crate::compile) reads
//! and extends whatever is in them: entries left over from a previous
//! compile point into a previous tree's arena and will mis-resolve names.
//! Callers that compile repeatedly must call [`reset_tables`] immediately
//! before each compile. The language server serializes all compiles on one
//! worker and resets unconditionally.

use crate::ast::DeclId;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Names which compile epoch a resolution belongs to. Two snapshots with
/// different tokens were resolved against different table states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(pub u64);

#[derive(Debug, Default)]
pub struct ResolutionTables {
    epoch: u64,
    /// Universe-scope names: built-ins plus the compiled file's top level.
    pub symbols: HashMap<String, DeclId>,
    /// Member names declared inside any declaration, for dotted lookup.
    pub members: HashMap<String, DeclId>,
}

static TABLES: Lazy<Mutex<ResolutionTables>> = Lazy::new(|| Mutex::new(ResolutionTables::default()));

/// Clear both tables and start a new epoch.
pub fn reset_tables() {
    let mut t = TABLES.lock();
    t.symbols.clear();
    t.members.clear();
    t.epoch += 1;
    tracing::trace!(epoch = t.epoch, "resolution tables reset");
}

/// The epoch of the current table state.
pub fn current_context() -> ContextToken {
    ContextToken(TABLES.lock().epoch)
}

pub(crate) fn with_tables<R>(f: impl FnOnce(&mut ResolutionTables) -> R) -> R {
    f(&mut TABLES.lock())
}

/// Serializes tests that depend on exclusive table state; production code
/// serializes compiles on a dedicated worker instead.
#[cfg(test)]
pub(crate) static TEST_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_bumps_epoch_and_clears() {
        let _exclusive = TEST_LOCK.lock();
        let before = with_tables(|t| {
            t.symbols.insert("stale".to_string(), DeclId(7));
            t.epoch
        });
        reset_tables();
        let after = with_tables(|t| {
            assert!(t.symbols.is_empty());
            t.epoch
        });
        assert!(after > before);
    }
}
