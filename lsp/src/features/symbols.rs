//! Document outline from the declaration tree.

use crate::core::analysis::Analysis;
use crate::features::{decl_full_range, decl_name_range, FeatureError};
use crate::resolve::end_position::EndPositionResolver;
use lsp_types::{DocumentSymbol, SymbolKind, Uri};
use lume_frontend::DeclId;

use crate::core::cache::ParseSnapshot;

pub fn provide(analysis: &mut Analysis, uri: &Uri) -> Result<Vec<DocumentSymbol>, FeatureError> {
    let snapshot = analysis.snapshot(uri)?;
    let top: Vec<DeclId> = snapshot.ast.top_level.clone();
    Ok(top
        .into_iter()
        .map(|d| symbol_of(&snapshot, &mut analysis.ends, d))
        .collect())
}

fn symbol_of(
    snapshot: &ParseSnapshot,
    ends: &mut EndPositionResolver,
    decl: DeclId,
) -> DocumentSymbol {
    let d = snapshot.ast.decl(decl);
    let children: Vec<DocumentSymbol> = d
        .inner
        .clone()
        .into_iter()
        .map(|c| symbol_of(snapshot, ends, c))
        .collect();
    DocumentSymbol {
        name: d.name.clone(),
        detail: None,
        kind: symbol_kind(snapshot, decl),
        tags: None,
        deprecated: None,
        range: decl_full_range(snapshot, ends, decl),
        selection_range: decl_name_range(snapshot, decl),
        children: if children.is_empty() {
            None
        } else {
            Some(children)
        },
    }
}

fn symbol_kind(snapshot: &ParseSnapshot, decl: DeclId) -> SymbolKind {
    let d = snapshot.ast.decl(decl);
    if !d.args.is_empty() {
        SymbolKind::FUNCTION
    } else if !d.inner.is_empty() {
        SymbolKind::CLASS
    } else {
        SymbolKind::FIELD
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn outline_nests_inner_declarations() {
        let uri = Uri::from_str("file:///symbols.lume").unwrap();
        let mut analysis = Analysis::new();
        analysis.store.set_text(
            &uri,
            "outer is\n  x := 3\n  helper(n i32) i32 is\n    n + x\n".to_string(),
        );
        let symbols = provide(&mut analysis, &uri).unwrap();
        assert_eq!(symbols.len(), 1);
        assert_eq!(symbols[0].name, "outer");
        let children = symbols[0].children.as_ref().expect("children present");
        let names: Vec<&str> = children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["x", "helper"]);
        assert_eq!(children[1].kind, SymbolKind::FUNCTION);
    }
}
