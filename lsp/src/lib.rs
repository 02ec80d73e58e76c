//! Language server for Lume.
//!
//! The compiler front end is slow, stateful and single-shot; everything
//! here exists to make it usable interactively: a content-keyed parse
//! cache, a tree walker that reconstructs enclosing-declaration
//! relationships, cursor-to-node resolution with fallbacks, and a
//! serialized worker that keeps concurrent requests off the compiler's
//! process-wide state.

#![allow(deprecated)]

pub mod core;
pub mod features;
pub mod message_handler;
pub mod protocol;
pub mod resolve;

pub use crate::core::{
    Analysis, CancelToken, ParseCache, ParseSnapshot, QueryError, ServerConfig, Worker,
};
pub use message_handler::{DiagnosticsSink, MessageHandler, RunParams, RunProgram, RunResult};
pub use protocol::LspConnection;
