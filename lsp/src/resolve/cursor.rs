//! Cursor-to-node resolution.
//!
//! All four queries share one candidate filter over the walked pairs of a
//! snapshot: the node has a real position, the node starts at or before the
//! cursor, and the enclosing declaration's end is at or after the cursor.
//! The latest-positioned candidate wins.
//!
//! When the filter comes up empty, two fallbacks run in order:
//! 1. defused trailing dot: if the cursor sits right after a `.` with
//!    nothing behind it, a placeholder identifier is patched into a private
//!    copy of the text, which is compiled OUTSIDE the parse cache and
//!    resolved again; the patch is then discarded,
//! 2. fuzzy scope lookup: the token under the cursor is matched by exact
//!    name against the innermost enclosing declaration's visible names.
//!
//! A query that still finds nothing returns `None`; a cursor in empty
//! space has no answer and that is not an error.

use crate::core::cache::{compile_snapshot, ParseSnapshot};
use crate::resolve::end_position::EndPositionResolver;
use crate::resolve::walker::{traverse, NodeRef, WalkedPair};
use lume_frontend::lexer::{tokenize, TokenKind};
use lume_frontend::{DeclId, ExprKind, SourcePos};
use std::collections::HashSet;
use std::sync::Arc;

/// A declaration resolved at a cursor, together with the snapshot that owns
/// it. Resolution against a patched private copy returns the patched
/// snapshot here, so the id stays valid.
#[derive(Debug, Clone)]
pub struct ResolvedDecl {
    pub snapshot: Arc<ParseSnapshot>,
    pub decl: DeclId,
}

impl ResolvedDecl {
    pub fn name(&self) -> &str {
        &self.snapshot.ast.decl(self.decl).name
    }

    pub fn pos(&self) -> SourcePos {
        self.snapshot.ast.decl(self.decl).pos
    }

    pub fn is_builtin(&self) -> bool {
        !self.pos().is_available()
    }
}

/// Most relevant declaration at the cursor: the callee of the call under
/// the cursor, the declaration declared there, or failing both, the
/// innermost enclosing declaration.
pub fn feature_at(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Option<ResolvedDecl> {
    if let Some(pair) = best_qualifying(snapshot, ends, cursor) {
        return feature_from_pair(snapshot, &pair);
    }
    if let Some(patched) = defused_dot_snapshot(snapshot, cursor) {
        if let Some(pair) = best_qualifying(&patched, ends, cursor) {
            return feature_from_pair(&patched, &pair);
        }
    }
    fuzzy_lookup(snapshot, ends, cursor)
}

/// The callee of the latest call at or before the cursor, if any.
pub fn called_feature_at(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Option<ResolvedDecl> {
    let mut call_in = |snap: &Arc<ParseSnapshot>| {
        let calls: Vec<WalkedPair> = qualifying_pairs(snap, ends, cursor)
            .into_iter()
            .filter(|p| called_of(snap, p.node).is_some())
            .collect();
        let best = best_pair(snap, calls, cursor)?;
        let called = called_of(snap, best.node)?;
        Some(ResolvedDecl {
            snapshot: Arc::clone(snap),
            decl: called,
        })
    };
    if let Some(found) = call_in(snapshot) {
        return Some(found);
    }
    if let Some(patched) = defused_dot_snapshot(snapshot, cursor) {
        if let Some(found) = call_in(&patched) {
            return Some(found);
        }
    }
    fuzzy_lookup(snapshot, ends, cursor)
}

/// Innermost declaration lexically containing the cursor. The candidate's
/// own header column must be strictly left of the cursor, so a
/// declaration's header line does not count as "inside" before the body
/// begins.
pub fn in_feature(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Option<ResolvedDecl> {
    let ast = &snapshot.ast;
    let mut best: Option<DeclId> = None;
    for d in ast.all_decls() {
        let decl = ast.decl(d);
        if !decl.pos.is_available() || decl.pos.file != cursor.file {
            continue;
        }
        if !decl.pos.is_at_or_before(&cursor) || decl.pos.column >= cursor.column {
            continue;
        }
        let end = ends.end_of(snapshot, d);
        if !cursor.is_at_or_before(&end) {
            continue;
        }
        let better = match best {
            Some(b) => ast.decl(b).pos.is_before(&decl.pos),
            None => true,
        };
        if better {
            best = Some(d);
        }
    }
    best.map(|decl| ResolvedDecl {
        snapshot: Arc::clone(snapshot),
        decl,
    })
}

/// Declarations visible in lexical scope at the cursor. After a trailing
/// dot, the members of the dotted target's result type instead.
pub fn completions_at(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Vec<ResolvedDecl> {
    if let Some(patched) = defused_dot_snapshot(snapshot, cursor) {
        if let Some(members) = member_completions(&patched, ends, cursor) {
            return members;
        }
        if let Some(scope) = in_feature(&patched, ends, cursor) {
            return scope_completions(&patched, scope.decl);
        }
    }
    let scope = in_feature(snapshot, ends, cursor)
        .map(|r| r.decl)
        .unwrap_or(snapshot.ast.universe);
    scope_completions(snapshot, scope)
}

// ── shared candidate machinery ───────────────────────────────────────

fn qualifying_pairs(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Vec<WalkedPair> {
    let ast = &snapshot.ast;
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for &top in &ast.top_level {
        for pair in traverse(ast, top) {
            if !seen.insert(pair.node) {
                continue;
            }
            let pos = pair.node.pos(ast);
            if !pos.is_available() || pos.file != cursor.file {
                continue;
            }
            if !pos.is_at_or_before(&cursor) {
                continue;
            }
            let end = ends.end_of(snapshot, pair.enclosing);
            if !cursor.is_at_or_before(&end) {
                continue;
            }
            out.push(pair);
        }
    }
    out
}

/// Latest candidate wins; among equals, prefer the cursor's own line, then
/// resolved calls. Exact behavior for a cursor exactly between two tokens
/// is pinned by the integration tests rather than derived.
fn best_pair(
    snapshot: &ParseSnapshot,
    pairs: Vec<WalkedPair>,
    cursor: SourcePos,
) -> Option<WalkedPair> {
    let ast = &snapshot.ast;
    pairs.into_iter().max_by_key(|p| {
        let pos = p.node.pos(ast);
        let same_line = pos.line == cursor.line;
        let resolved_call = called_of(snapshot, p.node).is_some();
        ((pos.line, pos.column), same_line, resolved_call)
    })
}

fn best_qualifying(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Option<WalkedPair> {
    let pairs = qualifying_pairs(snapshot, ends, cursor);
    best_pair(snapshot, pairs, cursor)
}

fn called_of(snapshot: &ParseSnapshot, node: NodeRef) -> Option<DeclId> {
    match node {
        NodeRef::Expr(e) => match &snapshot.ast.expr(e).kind {
            ExprKind::Call { called, .. } => *called,
            _ => None,
        },
        NodeRef::Decl(_) => None,
    }
}

fn feature_from_pair(snapshot: &Arc<ParseSnapshot>, pair: &WalkedPair) -> Option<ResolvedDecl> {
    let ast = &snapshot.ast;
    let decl = match pair.node {
        NodeRef::Decl(d) => Some(d),
        NodeRef::Expr(e) => match &ast.expr(e).kind {
            ExprKind::Call { called, .. } => called.or(Some(pair.enclosing)),
            ExprKind::TypeRef { resolved, .. } => resolved.or(Some(pair.enclosing)),
            ExprKind::Assign { resolved, .. } => resolved.or(Some(pair.enclosing)),
            _ => Some(pair.enclosing),
        },
    }?;
    Some(ResolvedDecl {
        snapshot: Arc::clone(snapshot),
        decl,
    })
}

// ── fallback 1: defused trailing dot ─────────────────────────────────

/// If the token left of the cursor is `.` and the right side is whitespace,
/// compile a private copy with a placeholder identifier after the dot.
/// Without the placeholder the compiler reads the dangling dot as a
/// statement terminator and drops the member access the user is typing.
fn defused_dot_snapshot(
    snapshot: &Arc<ParseSnapshot>,
    cursor: SourcePos,
) -> Option<Arc<ParseSnapshot>> {
    if cursor.line == 0 || cursor.column < 2 {
        return None;
    }
    let line = snapshot.text.lines().nth(cursor.line as usize - 1)?;
    let chars: Vec<char> = line.chars().collect();
    let dot_idx = cursor.column as usize - 2;
    if chars.get(dot_idx) != Some(&'.') {
        return None;
    }
    let right = chars.get(dot_idx + 1);
    if right.is_some_and(|c| !c.is_whitespace()) {
        return None;
    }

    let mut patched_line: String = chars[..=dot_idx].iter().collect();
    patched_line.push('_');
    patched_line.extend(chars[dot_idx + 1..].iter());

    let patched_text: String = snapshot
        .text
        .split('\n')
        .enumerate()
        .map(|(i, l)| {
            if i as u32 + 1 == cursor.line {
                patched_line.as_str()
            } else {
                l
            }
        })
        .collect::<Vec<_>>()
        .join("\n");

    match compile_snapshot(&snapshot.uri, patched_text) {
        Ok(snap) => Some(snap),
        Err(e) => {
            tracing::debug!(error = %e, "defused-dot compile failed");
            None
        }
    }
}

// ── fallback 2: fuzzy scope lookup ───────────────────────────────────

fn fuzzy_lookup(
    snapshot: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Option<ResolvedDecl> {
    let name = name_under_cursor(&snapshot.text, cursor)?;
    let scope = in_feature(snapshot, ends, cursor)
        .map(|r| r.decl)
        .unwrap_or(snapshot.ast.universe);
    let decl = visible_decls(snapshot, scope)
        .into_iter()
        .find(|&d| snapshot.ast.decl(d).name == name)?;
    Some(ResolvedDecl {
        snapshot: Arc::clone(snapshot),
        decl,
    })
}

/// The identifier or operator token under (or ending at) the cursor.
/// Operators are looked up under their declared `infix` name.
pub(crate) fn name_under_cursor(text: &str, cursor: SourcePos) -> Option<String> {
    let (tokens, _) = tokenize(text, cursor.file);
    tokens
        .iter()
        .filter(|t| t.line == cursor.line)
        .filter(|t| t.column <= cursor.column && cursor.column <= t.end_column())
        .find_map(|t| match &t.kind {
            TokenKind::Ident(name) => Some(name.clone()),
            TokenKind::Op(op) => Some(format!("infix {op}")),
            _ => None,
        })
}

// ── scope helpers ────────────────────────────────────────────────────

/// Names visible from `scope`: its own arguments, its declared-or-inherited
/// children, and the declared-or-inherited children of each outer
/// declaration. Inner names shadow outer ones.
pub(crate) fn visible_decls(snapshot: &ParseSnapshot, scope: DeclId) -> Vec<DeclId> {
    let ast = &snapshot.ast;
    let mut out = Vec::new();
    let mut names = HashSet::new();
    let mut push = |d: DeclId, out: &mut Vec<DeclId>, names: &mut HashSet<String>| {
        if names.insert(ast.decl(d).name.clone()) {
            out.push(d);
        }
    };

    for &arg in &ast.decl(scope).args {
        push(arg, &mut out, &mut names);
    }
    for d in ast.declared_or_inherited(scope) {
        push(d, &mut out, &mut names);
    }
    for outer in ast.outer_chain(scope) {
        for &arg in &ast.decl(outer).args {
            push(arg, &mut out, &mut names);
        }
        for d in ast.declared_or_inherited(outer) {
            push(d, &mut out, &mut names);
        }
    }
    out
}

fn scope_completions(snapshot: &Arc<ParseSnapshot>, scope: DeclId) -> Vec<ResolvedDecl> {
    visible_decls(snapshot, scope)
        .into_iter()
        .map(|decl| ResolvedDecl {
            snapshot: Arc::clone(snapshot),
            decl,
        })
        .collect()
}

/// Member completion against a defused-dot snapshot: find the placeholder
/// call at the cursor, type its target, and offer the type's members.
fn member_completions(
    patched: &Arc<ParseSnapshot>,
    ends: &mut EndPositionResolver,
    cursor: SourcePos,
) -> Option<Vec<ResolvedDecl>> {
    let pair = best_qualifying(patched, ends, cursor)?;
    let NodeRef::Expr(e) = pair.node else {
        return None;
    };
    let ExprKind::Call { target: Some(t), .. } = &patched.ast.expr(e).kind else {
        return None;
    };
    let ty = result_type_of(patched, *t)?;
    let members = patched.ast.declared_or_inherited(ty);
    if members.is_empty() {
        return None;
    }
    Some(
        members
            .into_iter()
            .map(|decl| ResolvedDecl {
                snapshot: Arc::clone(patched),
                decl,
            })
            .collect(),
    )
}

/// Best-effort static type of an expression: the resolved result type of a
/// call's callee, or the built-in type of a literal.
fn result_type_of(snapshot: &ParseSnapshot, expr: lume_frontend::ExprId) -> Option<DeclId> {
    let ast = &snapshot.ast;
    match &ast.expr(expr).kind {
        ExprKind::Call { called: Some(c), .. } => {
            let rt = ast.decl(*c).result_type?;
            match &ast.expr(rt).kind {
                ExprKind::TypeRef { resolved, .. } => *resolved,
                _ => None,
            }
        }
        ExprKind::NumLit(_) => universe_member(snapshot, "i32"),
        ExprKind::StrLit(_) => universe_member(snapshot, "String"),
        ExprKind::BoolLit(_) => universe_member(snapshot, "bool"),
        _ => None,
    }
}

fn universe_member(snapshot: &ParseSnapshot, name: &str) -> Option<DeclId> {
    let ast = &snapshot.ast;
    ast.declared_in(ast.universe)
        .iter()
        .copied()
        .find(|&d| ast.decl(d).name == name)
}
