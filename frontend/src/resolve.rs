//! Name resolution over a freshly parsed tree.
//!
//! Resolution goes through the process-wide tables (universe symbols and
//! member names), holding their lock for the whole pass. The tables must
//! have been reset since the previous compile; see the `tables` module for
//! the contract.

use crate::Issue;
use crate::ast::{AstBuilder, DeclId, ExprId, ExprKind};
use crate::parser::ParentRef;
use crate::tables::{with_tables, ResolutionTables};
use std::collections::HashSet;

pub struct ResolveOutput {
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
}

pub fn resolve(
    b: &mut AstBuilder,
    universe: DeclId,
    top_level: &[DeclId],
    parent_refs: &[ParentRef],
) -> ResolveOutput {
    with_tables(|t| {
        let mut r = Resolver {
            b,
            t,
            errors: Vec::new(),
            warnings: Vec::new(),
        };
        r.populate_tables(universe, top_level);
        r.resolve_parents(parent_refs);
        for &d in top_level {
            r.resolve_decl(d);
        }
        ResolveOutput {
            errors: r.errors,
            warnings: r.warnings,
        }
    })
}

struct Resolver<'a, 'b> {
    b: &'a mut AstBuilder,
    t: &'b mut ResolutionTables,
    errors: Vec<Issue>,
    warnings: Vec<Issue>,
}

impl Resolver<'_, '_> {
    fn populate_tables(&mut self, universe: DeclId, top_level: &[DeclId]) {
        // Shadowing check must look at the built-ins before the file's own
        // names go in.
        for &d in top_level {
            let name = self.b.decl(d).name.clone();
            let pos = self.b.decl(d).pos;
            let shadows = self
                .b
                .decl(universe)
                .inner
                .iter()
                .any(|&o| o != d && !self.b.decl(o).pos.is_available() && self.b.decl(o).name == name);
            if shadows {
                self.warnings.push(Issue::new(
                    pos,
                    format!("`{name}` shadows a built-in declaration"),
                ));
            }
        }

        for &d in &self.b.decl(universe).inner.clone() {
            self.t.symbols.insert(self.b.decl(d).name.clone(), d);
        }
        for id in 0..self.b.decls.len() as u32 {
            let d = DeclId(id);
            for &inner in &self.b.decl(d).inner.clone() {
                self.t.members.insert(self.b.decl(inner).name.clone(), inner);
            }
        }
    }

    fn resolve_parents(&mut self, parent_refs: &[ParentRef]) {
        for pref in parent_refs {
            match self.lookup_universe(&pref.name) {
                Some(p) => self.b.decl_mut(pref.decl).parent = Some(p),
                None => self.errors.push(Issue::new(
                    pref.pos,
                    format!("unknown parent `{}`", pref.name),
                )),
            }
        }
    }

    fn resolve_decl(&mut self, d: DeclId) {
        let decl = self.b.decl(d);
        let args = decl.args.clone();
        let result_type = decl.result_type;
        let pre = decl.contract.preconditions.clone();
        let post = decl.contract.postconditions.clone();
        let body = decl.body;
        let inner = decl.inner.clone();

        for a in args {
            if let Some(rt) = self.b.decl(a).result_type {
                self.resolve_type(rt);
            }
        }
        if let Some(rt) = result_type {
            self.resolve_type(rt);
        }
        for e in pre.into_iter().chain(post) {
            self.resolve_expr(e, d);
        }
        if let Some(e) = body {
            self.resolve_expr(e, d);
        }
        for i in inner {
            self.resolve_decl(i);
        }
    }

    fn resolve_expr(&mut self, e: ExprId, scope: DeclId) {
        let kind = self.b.expr(e).kind.clone();
        match kind {
            ExprKind::Call {
                target,
                name,
                actuals,
                ..
            } => {
                if let Some(t) = target {
                    self.resolve_expr(t, scope);
                }
                for a in actuals {
                    self.resolve_expr(a, scope);
                }
                let resolved = if target.is_some() {
                    self.lookup_member(&name)
                } else {
                    self.lookup_lexical(scope, &name)
                        .or_else(|| self.lookup_universe(&name))
                };
                if resolved.is_none() {
                    let pos = self.b.expr(e).pos;
                    self.errors
                        .push(Issue::new(pos, format!("unknown name `{name}`")));
                }
                if let ExprKind::Call { called, .. } = &mut self.b.expr_mut(e).kind {
                    *called = resolved;
                }
            }
            ExprKind::Block(stmts) => {
                for s in stmts {
                    self.resolve_expr(s, scope);
                }
            }
            ExprKind::Match { subject, cases } => {
                self.resolve_expr(subject, scope);
                for c in cases {
                    self.resolve_expr(c.body, scope);
                }
            }
            ExprKind::Assign { field, value, .. } => {
                self.resolve_expr(value, scope);
                let resolved = self.lookup_lexical(scope, &field);
                if resolved.is_none() {
                    let pos = self.b.expr(e).pos;
                    self.errors
                        .push(Issue::new(pos, format!("assignment to unknown field `{field}`")));
                }
                if let ExprKind::Assign { resolved: slot, .. } = &mut self.b.expr_mut(e).kind {
                    *slot = resolved;
                }
            }
            ExprKind::TypeRef { .. } => self.resolve_type(e),
            ExprKind::NumLit(_) | ExprKind::StrLit(_) | ExprKind::BoolLit(_) | ExprKind::Current => {}
        }
    }

    fn resolve_type(&mut self, e: ExprId) {
        let ExprKind::TypeRef { name, .. } = self.b.expr(e).kind.clone() else {
            return;
        };
        let resolved = self.lookup_universe(&name);
        if resolved.is_none() {
            let pos = self.b.expr(e).pos;
            self.errors
                .push(Issue::new(pos, format!("unknown type `{name}`")));
        }
        if let ExprKind::TypeRef { resolved: slot, .. } = &mut self.b.expr_mut(e).kind {
            *slot = resolved;
        }
    }

    /// Walk the scope chain: formal arguments, then declared-or-inherited
    /// children, then the outer declaration.
    fn lookup_lexical(&self, scope: DeclId, name: &str) -> Option<DeclId> {
        let mut visited = HashSet::new();
        let mut cursor = Some(scope);
        while let Some(d) = cursor {
            if !visited.insert(d) {
                break;
            }
            let decl = self.b.decl(d);
            for &a in &decl.args {
                if self.b.decl(a).name == name {
                    return Some(a);
                }
            }
            let mut seen_names = HashSet::new();
            let mut chain = Some(d);
            let mut chain_visited = HashSet::new();
            while let Some(c) = chain {
                if !chain_visited.insert(c) {
                    break;
                }
                for &inner in &self.b.decl(c).inner {
                    let n = &self.b.decl(inner).name;
                    if seen_names.insert(n.clone()) && n == name {
                        return Some(inner);
                    }
                }
                chain = self.b.decl(c).parent;
            }
            cursor = decl.outer;
        }
        None
    }

    fn lookup_universe(&self, name: &str) -> Option<DeclId> {
        self.t.symbols.get(name).copied().filter(|d| self.in_arena(*d))
    }

    fn lookup_member(&self, name: &str) -> Option<DeclId> {
        self.t.members.get(name).copied().filter(|d| self.in_arena(*d))
    }

    /// Guard against stale table entries pointing past this compile's arena.
    /// Stale in-range entries cannot be detected here; that is the documented
    /// reason callers reset the tables before every compile.
    fn in_arena(&self, d: DeclId) -> bool {
        (d.0 as usize) < self.b.decls.len()
    }
}
