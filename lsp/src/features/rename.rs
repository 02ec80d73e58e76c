//! Rename and prepare-rename.
//!
//! Rename is rejected, with a reason and without side effects, when the
//! cursor is not on a renameable identifier: no resolvable symbol, a
//! built-in target, or a new name that is not an identifier.

use crate::core::analysis::Analysis;
use crate::features::navigation::reference_ranges;
use crate::features::{decl_name_range, to_cursor, FeatureError};
use crate::resolve::cursor::{called_feature_at, feature_at, ResolvedDecl};
use lsp_types::{Position, PrepareRenameResponse, TextEdit, Uri, WorkspaceEdit};
use std::collections::HashMap;

fn renameable_target(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
) -> Result<ResolvedDecl, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let cursor = to_cursor(&snapshot, position);
    let target = called_feature_at(&snapshot, &mut analysis.ends, cursor)
        .or_else(|| feature_at(&snapshot, &mut analysis.ends, cursor))
        .ok_or_else(|| {
            FeatureError::InvalidRequest("no resolvable symbol at the cursor".to_string())
        })?;
    if target.is_builtin() {
        return Err(FeatureError::InvalidRequest(format!(
            "`{}` is built in and cannot be renamed",
            target.name()
        )));
    }
    if target.name().starts_with("infix ") {
        return Err(FeatureError::InvalidRequest(
            "operators cannot be renamed".to_string(),
        ));
    }
    Ok(target)
}

pub fn prepare(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
) -> Result<PrepareRenameResponse, FeatureError> {
    let target = renameable_target(analysis, uri, position)?;
    Ok(PrepareRenameResponse::RangeWithPlaceholder {
        range: decl_name_range(&target.snapshot, target.decl),
        placeholder: target.name().to_string(),
    })
}

pub fn rename(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
    new_name: &str,
) -> Result<WorkspaceEdit, FeatureError> {
    if !is_identifier(new_name) {
        return Err(FeatureError::InvalidRequest(format!(
            "`{new_name}` is not a valid identifier"
        )));
    }
    let target = renameable_target(analysis, uri, position)?;
    let snapshot = analysis.snapshot(uri)?;

    let edits: Vec<TextEdit> = reference_ranges(&snapshot.ast, &target, true)
        .into_iter()
        .map(|range| TextEdit {
            range,
            new_text: new_name.to_string(),
        })
        .collect();
    if edits.is_empty() {
        return Err(FeatureError::InvalidRequest(
            "nothing to rename at the cursor".to_string(),
        ));
    }

    let mut changes = HashMap::new();
    changes.insert(uri.clone(), edits);
    Ok(WorkspaceEdit {
        changes: Some(changes),
        ..Default::default()
    })
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}
