//! Declaration/expression tree produced by a single compile.
//!
//! The tree is arena-backed: declarations and expressions live in flat
//! vectors inside [`Ast`] and refer to each other by [`DeclId`] / [`ExprId`].
//! A declaration's `outer` link is a lookup relation, not ownership; the
//! [`Ast`] owns everything and is dropped as a unit.

use std::collections::HashSet;

/// Index of a source file name in [`Ast::files`]. File 0 is always the
/// synthetic `<built-in>` file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub u16);

impl FileId {
    pub const BUILTIN: FileId = FileId(0);
}

/// Arena index of a declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(pub u32);

/// Arena index of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExprId(pub u32);

/// A source location. Lines and columns are 1-based; `line == 0` is the
/// "not available" sentinel carried by built-in and synthetic nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourcePos {
    pub file: FileId,
    pub line: u32,
    pub column: u32,
}

impl SourcePos {
    pub const NOT_AVAILABLE: SourcePos = SourcePos {
        file: FileId::BUILTIN,
        line: 0,
        column: 0,
    };

    pub fn new(file: FileId, line: u32, column: u32) -> Self {
        Self { file, line, column }
    }

    pub fn is_available(&self) -> bool {
        self.line > 0
    }

    /// Line-major ordering within one file. Callers only compare positions
    /// from the same file; the file id does not participate.
    pub fn is_before(&self, other: &SourcePos) -> bool {
        (self.line, self.column) < (other.line, other.column)
    }

    pub fn is_at_or_before(&self, other: &SourcePos) -> bool {
        (self.line, self.column) <= (other.line, other.column)
    }
}

/// Pre/postconditions attached to a declaration header.
#[derive(Debug, Clone, Default)]
pub struct Contract {
    pub preconditions: Vec<ExprId>,
    pub postconditions: Vec<ExprId>,
}

impl Contract {
    pub fn is_empty(&self) -> bool {
        self.preconditions.is_empty() && self.postconditions.is_empty()
    }
}

/// A named unit of Lume source: routine, field, type, or formal argument.
#[derive(Debug, Clone)]
pub struct Decl {
    pub name: String,
    pub pos: SourcePos,
    /// Formal arguments, themselves declarations with `is_arg == true`.
    pub args: Vec<DeclId>,
    /// Declared result type, if written.
    pub result_type: Option<ExprId>,
    pub contract: Contract,
    pub body: Option<ExprId>,
    /// Directly declared sub-declarations, in source order.
    pub inner: Vec<DeclId>,
    /// Declaration this one inherits from, after resolution.
    pub parent: Option<DeclId>,
    /// Lexically enclosing declaration. Lookup relation only.
    pub outer: Option<DeclId>,
    pub is_arg: bool,
}

/// One branch of a `match`.
#[derive(Debug, Clone)]
pub struct MatchCase {
    pub pattern: String,
    pub pos: SourcePos,
    pub body: ExprId,
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    /// A call `target.name actuals`. `called` is filled in by resolution;
    /// `None` means the callee could not be resolved (reported as an error).
    Call {
        target: Option<ExprId>,
        name: String,
        called: Option<DeclId>,
        actuals: Vec<ExprId>,
    },
    Block(Vec<ExprId>),
    Match {
        subject: ExprId,
        cases: Vec<MatchCase>,
    },
    /// `set field := value`.
    Assign {
        field: String,
        resolved: Option<DeclId>,
        value: ExprId,
    },
    NumLit(String),
    StrLit(String),
    BoolLit(bool),
    /// A reference to a type by name, e.g. a declared result type.
    TypeRef {
        name: String,
        resolved: Option<DeclId>,
    },
    /// The current instance.
    Current,
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub pos: SourcePos,
}

/// The whole tree of one compile: built-ins plus the compiled file,
/// rooted at the synthetic universe declaration.
#[derive(Debug)]
pub struct Ast {
    pub files: Vec<String>,
    pub decls: Vec<Decl>,
    pub exprs: Vec<Expr>,
    pub universe: DeclId,
    /// Top-level declarations of the compiled file, in source order.
    pub top_level: Vec<DeclId>,
}

impl Ast {
    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn file_name(&self, id: FileId) -> &str {
        &self.files[id.0 as usize]
    }

    /// Direct children of a declaration.
    pub fn declared_in(&self, id: DeclId) -> &[DeclId] {
        &self.decl(id).inner
    }

    /// Children declared directly or inherited through the parent chain.
    /// A declared name shadows an inherited one with the same name.
    pub fn declared_or_inherited(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut names = HashSet::new();
        let mut visited = HashSet::new();
        let mut cursor = Some(id);
        while let Some(d) = cursor {
            if !visited.insert(d) {
                break;
            }
            for &inner in &self.decl(d).inner {
                if names.insert(self.decl(inner).name.clone()) {
                    out.push(inner);
                }
            }
            cursor = self.decl(d).parent;
        }
        out
    }

    /// All declaration ids, built-ins included.
    pub fn all_decls(&self) -> impl Iterator<Item = DeclId> + '_ {
        (0..self.decls.len() as u32).map(DeclId)
    }

    /// Walk `outer` links up to and including the universe.
    pub fn outer_chain(&self, id: DeclId) -> Vec<DeclId> {
        let mut out = Vec::new();
        let mut cursor = self.decl(id).outer;
        while let Some(d) = cursor {
            out.push(d);
            cursor = self.decl(d).outer;
        }
        out
    }
}

/// Mutable builder used by the parser and the built-in installer.
#[derive(Debug, Default)]
pub struct AstBuilder {
    pub files: Vec<String>,
    pub decls: Vec<Decl>,
    pub exprs: Vec<Expr>,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self {
            files: vec!["<built-in>".to_string()],
            decls: Vec::new(),
            exprs: Vec::new(),
        }
    }

    pub fn add_file(&mut self, name: &str) -> FileId {
        self.files.push(name.to_string());
        FileId((self.files.len() - 1) as u16)
    }

    pub fn add_decl(&mut self, decl: Decl) -> DeclId {
        self.decls.push(decl);
        DeclId((self.decls.len() - 1) as u32)
    }

    pub fn add_expr(&mut self, kind: ExprKind, pos: SourcePos) -> ExprId {
        self.exprs.push(Expr { kind, pos });
        ExprId((self.exprs.len() - 1) as u32)
    }

    pub fn decl_mut(&mut self, id: DeclId) -> &mut Decl {
        &mut self.decls[id.0 as usize]
    }

    pub fn expr_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.exprs[id.0 as usize]
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id.0 as usize]
    }

    pub fn expr(&self, id: ExprId) -> &Expr {
        &self.exprs[id.0 as usize]
    }

    pub fn finish(self, universe: DeclId, top_level: Vec<DeclId>) -> Ast {
        Ast {
            files: self.files,
            decls: self.decls,
            exprs: self.exprs,
            universe,
            top_level,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_available_sentinel() {
        assert!(!SourcePos::NOT_AVAILABLE.is_available());
        assert!(SourcePos::new(FileId(1), 1, 1).is_available());
    }

    #[test]
    fn position_ordering_is_line_major() {
        let f = FileId(1);
        let a = SourcePos::new(f, 1, 10);
        let b = SourcePos::new(f, 2, 1);
        assert!(a.is_before(&b));
        assert!(a.is_at_or_before(&a));
        assert!(!b.is_before(&a));
    }

    #[test]
    fn declared_or_inherited_shadows_by_name() {
        let mut b = AstBuilder::new();
        let blank = |name: &str| Decl {
            name: name.to_string(),
            pos: SourcePos::NOT_AVAILABLE,
            args: vec![],
            result_type: None,
            contract: Contract::default(),
            body: None,
            inner: vec![],
            parent: None,
            outer: None,
            is_arg: false,
        };
        let base = b.add_decl(blank("base"));
        let base_x = b.add_decl(blank("x"));
        let base_y = b.add_decl(blank("y"));
        b.decl_mut(base).inner = vec![base_x, base_y];
        let child = b.add_decl(blank("child"));
        let child_x = b.add_decl(blank("x"));
        b.decl_mut(child).inner = vec![child_x];
        b.decl_mut(child).parent = Some(base);

        let ast = b.finish(base, vec![]);
        let visible = ast.declared_or_inherited(child);
        assert_eq!(visible, vec![child_x, base_y]);
    }
}
