//! Editor-facing feature providers.
//!
//! Every provider here runs inside a worker closure holding the analysis
//! lock; the providers themselves are plain functions from state to data.

pub mod completion;
pub mod diagnostics;
pub mod hover;
pub mod navigation;
pub mod rename;
pub mod run;
pub mod symbols;

use crate::core::cache::{ParseSnapshot, SnapshotError};
use crate::resolve::end_position::EndPositionResolver;
use lsp_types::{Position, Range};
use lume_frontend::{DeclId, SourcePos};

/// Why a feature request produced no value.
#[derive(Debug)]
pub enum FeatureError {
    /// The request is malformed for this position (e.g. renaming a
    /// built-in); the operation had no side effect.
    InvalidRequest(String),
    /// The snapshot could not be produced at all.
    Snapshot(SnapshotError),
}

impl std::fmt::Display for FeatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeatureError::InvalidRequest(reason) => write!(f, "invalid request: {reason}"),
            FeatureError::Snapshot(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for FeatureError {}

impl From<SnapshotError> for FeatureError {
    fn from(e: SnapshotError) -> Self {
        FeatureError::Snapshot(e)
    }
}

/// LSP positions are 0-based, the compiler's are 1-based.
pub fn to_cursor(snapshot: &ParseSnapshot, position: Position) -> SourcePos {
    snapshot.position(position.line + 1, position.character + 1)
}

pub fn to_lsp_position(pos: SourcePos) -> Position {
    Position {
        line: pos.line.saturating_sub(1),
        character: pos.column.saturating_sub(1),
    }
}

/// Width of the token a reference to `name` occupies in source: operators
/// are written without their `infix` prefix.
pub fn reference_width(name: &str) -> u32 {
    let written = name.strip_prefix("infix ").unwrap_or(name);
    written.chars().count().max(1) as u32
}

/// Range of a declaration's name token.
pub fn decl_name_range(snapshot: &ParseSnapshot, decl: DeclId) -> Range {
    let d = snapshot.ast.decl(decl);
    let start = to_lsp_position(d.pos);
    Range {
        start,
        end: Position {
            line: start.line,
            character: start.character + reference_width(&d.name),
        },
    }
}

/// Full range of a declaration, header through end position.
pub fn decl_full_range(
    snapshot: &ParseSnapshot,
    ends: &mut EndPositionResolver,
    decl: DeclId,
) -> Range {
    let start = to_lsp_position(snapshot.ast.decl(decl).pos);
    let end = to_lsp_position(ends.end_of(snapshot, decl));
    Range { start, end }
}

/// Human-readable signature of a declaration, e.g. `half(n i32) i32`.
pub fn signature(snapshot: &ParseSnapshot, decl: DeclId) -> String {
    let ast = &snapshot.ast;
    let d = ast.decl(decl);
    let mut out = d.name.clone();
    if !d.args.is_empty() {
        out.push('(');
        for (i, &a) in d.args.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            out.push_str(&ast.decl(a).name);
            if let Some(rt) = ast.decl(a).result_type {
                if let lume_frontend::ExprKind::TypeRef { name, .. } = &ast.expr(rt).kind {
                    out.push(' ');
                    out.push_str(name);
                }
            }
        }
        out.push(')');
    }
    if let Some(rt) = d.result_type {
        if let lume_frontend::ExprKind::TypeRef { name, .. } = &ast.expr(rt).kind {
            out.push(' ');
            out.push_str(name);
        }
    }
    out
}
