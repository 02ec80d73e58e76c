//! Front end for the Lume language.
//!
//! One call to [`compile`] turns source text into a declaration tree plus
//! error and warning lists. Errors in the source are data, not failures: a
//! broken document still yields a best-effort tree.
//!
//! The front end is NOT reentrant. Resolution goes through process-wide
//! tables that leak identity between compiles; callers must invoke
//! [`reset_tables`] immediately before each compile and must not compile
//! from two threads at once.

pub mod ast;
pub mod builtins;
pub mod lexer;
pub mod parser;
mod resolve;
mod tables;

pub use ast::{Ast, Contract, Decl, DeclId, Expr, ExprId, ExprKind, FileId, MatchCase, SourcePos};
pub use tables::{current_context, reset_tables, ContextToken};

/// A compile error or warning: a position and a message.
#[derive(Debug, Clone)]
pub struct Issue {
    pub pos: SourcePos,
    pub message: String,
}

impl Issue {
    pub fn new(pos: SourcePos, message: impl Into<String>) -> Self {
        Self {
            pos,
            message: message.into(),
        }
    }
}

/// The immutable result of compiling one source text.
#[derive(Debug)]
pub struct Compilation {
    pub ast: Ast,
    pub errors: Vec<Issue>,
    pub warnings: Vec<Issue>,
    /// The table epoch this tree was resolved under.
    pub context: ContextToken,
}

/// Compile `text`, registering it under `file_name`. Uses whatever state is
/// in the process-wide tables; see the crate docs for the reset contract.
pub fn compile(file_name: &str, text: &str) -> Compilation {
    let mut b = ast::AstBuilder::new();
    let bi = builtins::install(&mut b);
    let file = b.add_file(file_name);

    let (tokens, mut errors) = lexer::tokenize(text, file);
    let parsed = parser::parse(&mut b, &tokens, file, bi.universe);
    errors.extend(parsed.issues);

    let resolved = resolve::resolve(&mut b, bi.universe, &parsed.top_level, &parsed.parent_refs);
    errors.extend(resolved.errors);

    tracing::debug!(
        file = file_name,
        decls = b.decls.len(),
        errors = errors.len(),
        "compiled"
    );

    Compilation {
        ast: b.finish(bi.universe, parsed.top_level),
        errors,
        warnings: resolved.warnings,
        context: tables::current_context(),
    }
}
