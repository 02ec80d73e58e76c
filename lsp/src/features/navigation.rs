//! Go-to-definition, references and document highlights.

use crate::core::analysis::Analysis;
use crate::features::{decl_name_range, reference_width, to_cursor, to_lsp_position, FeatureError};
use crate::resolve::cursor::{called_feature_at, feature_at, ResolvedDecl};
use crate::resolve::walker::{traverse, NodeRef};
use lsp_types::{
    DocumentHighlight, DocumentHighlightKind, Location, Position, Range, Uri,
};
use lume_frontend::{Ast, DeclId, ExprKind, SourcePos};

pub fn definition(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
) -> Result<Option<Location>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let cursor = to_cursor(&snapshot, position);
    let target = called_feature_at(&snapshot, &mut analysis.ends, cursor)
        .or_else(|| feature_at(&snapshot, &mut analysis.ends, cursor));
    let Some(target) = target else {
        return Ok(None);
    };
    // Built-ins have no source to jump to.
    if target.is_builtin() {
        return Ok(None);
    }
    Ok(Some(Location {
        uri: uri.clone(),
        range: decl_name_range(&target.snapshot, target.decl),
    }))
}

pub fn references(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
    include_declaration: bool,
) -> Result<Vec<Location>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let cursor = to_cursor(&snapshot, position);
    let Some(target) = called_feature_at(&snapshot, &mut analysis.ends, cursor)
        .or_else(|| feature_at(&snapshot, &mut analysis.ends, cursor))
    else {
        return Ok(Vec::new());
    };
    Ok(reference_ranges(&snapshot.ast, &target, include_declaration)
        .into_iter()
        .map(|range| Location {
            uri: uri.clone(),
            range,
        })
        .collect())
}

pub fn highlights(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
) -> Result<Vec<DocumentHighlight>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let cursor = to_cursor(&snapshot, position);
    let Some(target) = called_feature_at(&snapshot, &mut analysis.ends, cursor)
        .or_else(|| feature_at(&snapshot, &mut analysis.ends, cursor))
    else {
        return Ok(Vec::new());
    };
    Ok(reference_ranges(&snapshot.ast, &target, true)
        .into_iter()
        .map(|range| DocumentHighlight {
            range,
            kind: Some(DocumentHighlightKind::TEXT),
        })
        .collect())
}

/// All ranges in the file referring to `target`: every resolved call to it,
/// plus its own name token when requested. The target may live in a patched
/// snapshot, so declarations are matched by name and position rather than
/// by arena id.
pub(crate) fn reference_ranges(
    ast: &Ast,
    target: &ResolvedDecl,
    include_declaration: bool,
) -> Vec<Range> {
    let target_name = target.name().to_string();
    let target_pos = target.pos();
    let width = reference_width(&target_name);

    let mut out = Vec::new();
    let mut push = |pos: SourcePos| {
        let start = to_lsp_position(pos);
        out.push(Range {
            start,
            end: Position {
                line: start.line,
                character: start.character + width,
            },
        });
    };

    for &top in &ast.top_level {
        for pair in traverse(ast, top) {
            match pair.node {
                NodeRef::Expr(e) => {
                    if let ExprKind::Call { called: Some(c), .. } = &ast.expr(e).kind {
                        if is_same_decl(ast, *c, &target_name, target_pos) {
                            push(ast.expr(e).pos);
                        }
                    }
                }
                NodeRef::Decl(d) => {
                    if include_declaration
                        && target_pos.is_available()
                        && is_same_decl(ast, d, &target_name, target_pos)
                    {
                        push(ast.decl(d).pos);
                    }
                }
            }
        }
    }
    out.sort_by_key(|r| (r.start.line, r.start.character));
    out.dedup();
    out
}

fn is_same_decl(ast: &Ast, candidate: DeclId, name: &str, pos: SourcePos) -> bool {
    let c = ast.decl(candidate);
    c.name == name && c.pos == pos
}
