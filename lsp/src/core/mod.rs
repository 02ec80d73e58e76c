//! Document text, compile caching, configuration and the execution harness.

pub mod analysis;
pub mod cache;
pub mod config;
pub mod crash;
pub mod document;
pub mod worker;

pub use analysis::{Analysis, SharedAnalysis};
pub use cache::{ParseCache, ParseSnapshot, SnapshotError, SnapshotId};
pub use config::ServerConfig;
pub use document::{ContentEdit, DocumentStore};
pub use worker::{CancelToken, QueryError, Worker};
