//! Source end positions for declarations.
//!
//! The compiler's tree carries start positions only, so ends are
//! reconstructed from the tree plus a re-tokenization of the source, and
//! cached: recomputation needs a full sub-tree walk.
//!
//! Resolution order, first applicable rule wins:
//! 1. a formal argument ends at the end of its own name token,
//! 2. a declaration with nothing declared after it at the same or lesser
//!    column is the file's last and ends at the first position of the line
//!    after the last line,
//! 3. otherwise the latest node enclosed by the declaration is found, the
//!    scan advances past that node's token and stops at the next
//!    statement-terminating token (identifier, `;`, `}`, `]`, `)` or end
//!    of file), whose end is the declaration's end.

use crate::core::cache::{LruCache, ParseSnapshot, SnapshotId};
use crate::resolve::walker::traverse;
use lume_frontend::lexer::{tokenize, Token};
use lume_frontend::{DeclId, SourcePos};

pub const END_POSITION_CACHE_CAPACITY: usize = 100;

#[derive(Debug)]
pub struct EndPositionResolver {
    cache: LruCache<(SnapshotId, DeclId), SourcePos>,
}

impl EndPositionResolver {
    pub fn new() -> Self {
        Self {
            cache: LruCache::new(END_POSITION_CACHE_CAPACITY),
        }
    }

    /// End position of `decl`, strictly after its start.
    pub fn end_of(&mut self, snapshot: &ParseSnapshot, decl: DeclId) -> SourcePos {
        let key = (snapshot.id, decl);
        if let Some(end) = self.cache.get(&key) {
            return *end;
        }
        let computed = compute_end(snapshot, decl);
        let start = snapshot.ast.decl(decl).pos;
        // The contract is strict: an end at or before the start would make
        // the cursor filter reject every node in the declaration.
        let end = if start.is_available() && !start.is_before(&computed) {
            let width = snapshot.ast.decl(decl).name.chars().count().max(1) as u32;
            SourcePos::new(start.file, start.line, start.column + width)
        } else {
            computed
        };
        self.cache.insert(key, end);
        end
    }
}

impl Default for EndPositionResolver {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_end(snapshot: &ParseSnapshot, decl: DeclId) -> SourcePos {
    let ast = &snapshot.ast;
    let d = ast.decl(decl);
    let start = d.pos;

    // A synthetic declaration (the universe) encloses the whole file.
    if !start.is_available() {
        return SourcePos::new(start.file, u32::MAX, 1);
    }

    if d.is_arg {
        let width = d.name.chars().count().max(1) as u32;
        return SourcePos::new(start.file, start.line, start.column + width);
    }

    if is_last_declaration_in_file(snapshot, decl) {
        return after_last_line(snapshot, start);
    }

    // Latest node that this declaration directly encloses.
    let latest = traverse(ast, decl)
        .into_iter()
        .filter(|p| p.enclosing == decl && p.node != crate::resolve::walker::NodeRef::Decl(decl))
        .map(|p| p.node.pos(ast))
        .filter(SourcePos::is_available)
        .max_by_key(|p| (p.line, p.column));
    let Some(latest) = latest else {
        // Nothing but the header: end at the end of the name token.
        let width = d.name.chars().count().max(1) as u32;
        return SourcePos::new(start.file, start.line, start.column + width);
    };

    let (tokens, _) = tokenize(&snapshot.text, start.file);
    let Some(at) = token_index_at(&tokens, latest) else {
        return after_last_line(snapshot, start);
    };
    for token in &tokens[at + 1..] {
        if token.terminates_statement() {
            return SourcePos::new(start.file, token.line, token.end_column());
        }
    }
    after_last_line(snapshot, start)
}

/// Rule 2 test: no other declaration in the same file is declared after
/// this one at the same or a lesser nesting column.
fn is_last_declaration_in_file(snapshot: &ParseSnapshot, decl: DeclId) -> bool {
    let ast = &snapshot.ast;
    let pos = ast.decl(decl).pos;
    if !pos.is_available() {
        return false;
    }
    !ast.all_decls().any(|other| {
        if other == decl {
            return false;
        }
        let o = ast.decl(other).pos;
        o.is_available() && o.file == pos.file && pos.is_before(&o) && o.column <= pos.column
    })
}

fn after_last_line(snapshot: &ParseSnapshot, start: SourcePos) -> SourcePos {
    let last_line = snapshot.text.lines().count().max(1) as u32;
    SourcePos::new(start.file, last_line + 1, 1)
}

/// Index of the token covering `pos`, or the last token starting before it.
fn token_index_at(tokens: &[Token], pos: SourcePos) -> Option<usize> {
    let mut best = None;
    for (i, t) in tokens.iter().enumerate() {
        if (t.line, t.column) <= (pos.line, pos.column) {
            best = Some(i);
        } else {
            break;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cache::compile_snapshot;
    use lsp_types::Uri;
    use std::str::FromStr;
    use std::sync::Arc;

    fn snapshot(text: &str) -> Arc<ParseSnapshot> {
        let uri = Uri::from_str("file:///end.lume").unwrap();
        compile_snapshot(&uri, text.to_string()).unwrap()
    }

    #[test]
    fn every_end_is_strictly_after_the_start() {
        let snap = snapshot(
            "outer is\n  x := 3\n  helper(n i32) i32 is\n    n + x\n  say x\nlast is\n  say \"bye\"\n",
        );
        let mut resolver = EndPositionResolver::new();
        for d in snap.ast.all_decls() {
            let decl = snap.ast.decl(d);
            if !decl.pos.is_available() {
                continue;
            }
            let end = resolver.end_of(&snap, d);
            assert!(
                decl.pos.is_before(&end),
                "`{}` start {:?} not before end {:?}",
                decl.name,
                decl.pos,
                end
            );
        }
    }

    #[test]
    fn formal_arguments_end_after_their_name() {
        let snap = snapshot("f(count i32) i32 is\n  count\n");
        let mut resolver = EndPositionResolver::new();
        let f = snap.ast.top_level[0];
        let arg = snap.ast.decl(f).args[0];
        let end = resolver.end_of(&snap, arg);
        let start = snap.ast.decl(arg).pos;
        assert_eq!(end.line, start.line);
        assert_eq!(end.column, start.column + "count".len() as u32);
    }

    #[test]
    fn last_declaration_ends_past_the_last_line() {
        let snap = snapshot("ex is\n  (1..10).forAll()\n");
        let mut resolver = EndPositionResolver::new();
        let end = resolver.end_of(&snap, snap.ast.top_level[0]);
        assert_eq!((end.line, end.column), (3, 1));
    }

    #[test]
    fn non_last_declaration_ends_before_the_next_one() {
        let snap = snapshot("first is\n  say \"a\"\nsecond is\n  say \"b\"\n");
        let mut resolver = EndPositionResolver::new();
        let first = snap.ast.top_level[0];
        let second = snap.ast.top_level[1];
        let first_end = resolver.end_of(&snap, first);
        // The scan runs past the body's last token and stops at the next
        // statement-terminating token, here the identifier `second`.
        assert_eq!((first_end.line, first_end.column), (3, 7));
        assert!(snap.ast.decl(second).pos.is_before(&first_end));
    }

    #[test]
    fn results_are_cached_by_declaration_identity() {
        let snap = snapshot("ex is\n  say \"hi\"\n");
        let mut resolver = EndPositionResolver::new();
        let d = snap.ast.top_level[0];
        let a = resolver.end_of(&snap, d);
        let b = resolver.end_of(&snap, d);
        assert_eq!(a, b);
    }
}
