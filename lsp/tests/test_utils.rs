//! Shared helpers for the integration tests.

use lsp_types::Uri;
use lume_lsp::core::analysis::Analysis;
use std::str::FromStr;

/// An analysis state with one open document.
pub fn analysis_with(path: &str, text: &str) -> (Analysis, Uri) {
    let uri = uri(path);
    let mut analysis = Analysis::new();
    analysis.store.set_text(&uri, text.to_string());
    (analysis, uri)
}

pub fn uri(path: &str) -> Uri {
    Uri::from_str(&format!("file:///{}", path.trim_start_matches('/'))).unwrap()
}
