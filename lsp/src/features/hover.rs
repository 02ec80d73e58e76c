//! Hover labels for the declaration under the cursor.

use crate::core::analysis::Analysis;
use crate::features::{signature, to_cursor, FeatureError};
use crate::resolve::cursor::{called_feature_at, feature_at};
use lsp_types::{Hover, HoverContents, MarkupContent, MarkupKind, Position, Uri};

pub fn provide(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
) -> Result<Option<Hover>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let cursor = to_cursor(&snapshot, position);
    let Some(target) = called_feature_at(&snapshot, &mut analysis.ends, cursor)
        .or_else(|| feature_at(&snapshot, &mut analysis.ends, cursor))
    else {
        return Ok(None);
    };

    let mut value = format!("```lume\n{}\n```", signature(&target.snapshot, target.decl));
    if target.is_builtin() {
        value.push_str("\n\nbuilt-in");
    }
    Ok(Some(Hover {
        contents: HoverContents::Markup(MarkupContent {
            kind: MarkupKind::Markdown,
            value,
        }),
        range: None,
    }))
}
