//! LSP protocol connection abstractions.

mod connection;

pub use connection::LspConnection;
