//! Completion items from cursor resolution.

use crate::core::analysis::Analysis;
use crate::features::{signature, to_cursor, FeatureError};
use crate::resolve::cursor::{completions_at, ResolvedDecl};
use lsp_types::{CompletionItem, CompletionItemKind, Position, Uri};

pub fn provide(
    analysis: &mut Analysis,
    uri: &Uri,
    position: Position,
) -> Result<Vec<CompletionItem>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let cursor = to_cursor(&snapshot, position);
    let found = completions_at(&snapshot, &mut analysis.ends, cursor);
    Ok(found.iter().map(to_item).collect())
}

fn to_item(resolved: &ResolvedDecl) -> CompletionItem {
    let ast = &resolved.snapshot.ast;
    let d = ast.decl(resolved.decl);
    let insert = d.name.strip_prefix("infix ").unwrap_or(&d.name).to_string();
    CompletionItem {
        label: d.name.clone(),
        kind: Some(completion_kind(resolved)),
        detail: Some(signature(&resolved.snapshot, resolved.decl)),
        insert_text: Some(insert),
        ..Default::default()
    }
}

fn completion_kind(resolved: &ResolvedDecl) -> CompletionItemKind {
    let ast = &resolved.snapshot.ast;
    let d = ast.decl(resolved.decl);
    if d.is_arg {
        CompletionItemKind::VARIABLE
    } else if !d.args.is_empty() {
        CompletionItemKind::FUNCTION
    } else if !d.inner.is_empty() && d.body.is_none() {
        CompletionItemKind::CLASS
    } else {
        CompletionItemKind::FIELD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn analysis_with(text: &str) -> (Analysis, Uri) {
        let uri = Uri::from_str("file:///complete.lume").unwrap();
        let mut analysis = Analysis::new();
        analysis.store.set_text(&uri, text.to_string());
        (analysis, uri)
    }

    #[test]
    fn scope_completion_offers_locals_and_builtins() {
        let (mut analysis, uri) = analysis_with("ex is\n  x := 3\n  say x\n");
        // Cursor inside the body, after `say `.
        let items = provide(&mut analysis, &uri, Position { line: 2, character: 6 }).unwrap();
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"x"));
        assert!(labels.contains(&"say"));
        assert!(labels.contains(&"ex"));
    }

    #[test]
    fn member_completion_after_a_trailing_dot() {
        let (mut analysis, uri) = analysis_with("ex is\n  (1..10).\n");
        // Right after the dot (line 2, 0-based column 10).
        let items = provide(&mut analysis, &uri, Position { line: 1, character: 10 }).unwrap();
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert!(labels.contains(&"forAll"), "labels: {labels:?}");
        assert!(labels.contains(&"contains"));
        // Member completion, not lexical scope.
        assert!(!labels.contains(&"say"));
    }

    #[test]
    fn operators_insert_without_the_infix_prefix() {
        let (mut analysis, uri) = analysis_with("ex is\n  1 .\n");
        let items = provide(&mut analysis, &uri, Position { line: 1, character: 5 }).unwrap();
        if let Some(plus) = items.iter().find(|i| i.label == "infix +") {
            assert_eq!(plus.insert_text.as_deref(), Some("+"));
        }
    }

    #[test]
    fn argument_completion_inside_a_routine() {
        let (mut analysis, uri) = analysis_with("double(n i32) i32 is\n  n + n\n");
        let items = provide(&mut analysis, &uri, Position { line: 1, character: 4 }).unwrap();
        let n = items.iter().find(|i| i.label == "n").expect("argument offered");
        assert_eq!(n.kind, Some(CompletionItemKind::VARIABLE));
    }
}
