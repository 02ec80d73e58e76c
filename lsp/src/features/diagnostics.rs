//! Compile errors and warnings as published diagnostics.

use crate::core::analysis::Analysis;
use crate::features::{to_lsp_position, FeatureError};
use lsp_types::{Diagnostic, DiagnosticSeverity, Position, Range, Uri};
use lume_frontend::Issue;

pub fn provide(analysis: &mut Analysis, uri: &Uri) -> Result<Vec<Diagnostic>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let mut out = Vec::with_capacity(snapshot.errors.len() + snapshot.warnings.len());
    for issue in &snapshot.errors {
        out.push(to_diagnostic(issue, DiagnosticSeverity::ERROR));
    }
    for issue in &snapshot.warnings {
        out.push(to_diagnostic(issue, DiagnosticSeverity::WARNING));
    }
    Ok(out)
}

fn to_diagnostic(issue: &Issue, severity: DiagnosticSeverity) -> Diagnostic {
    let start = to_lsp_position(issue.pos);
    let range = Range {
        start,
        end: Position {
            line: start.line,
            character: start.character + 1,
        },
    };
    Diagnostic {
        range,
        severity: Some(severity),
        source: Some("lume".to_string()),
        message: issue.message.clone(),
        ..Default::default()
    }
}
