//! Indentation parser for Lume.
//!
//! A declaration is `name (args)? (: parent)? type? pre/post...? is` followed
//! by a body indented past the header column, or `name := expr` for a field.
//! Statements are line-scoped. The parser never fails hard: every malformed
//! construct is reported as an issue and skipped, so syntactically broken
//! documents still produce a best-effort tree.

use crate::Issue;
use crate::ast::{
    AstBuilder, Contract, Decl, DeclId, ExprId, ExprKind, FileId, MatchCase, SourcePos,
};
use crate::lexer::{Token, TokenKind};

/// An unresolved `: parent` reference recorded for the resolver.
#[derive(Debug)]
pub struct ParentRef {
    pub decl: DeclId,
    pub name: String,
    pub pos: SourcePos,
}

#[derive(Debug)]
pub struct ParseOutput {
    pub top_level: Vec<DeclId>,
    pub parent_refs: Vec<ParentRef>,
    pub issues: Vec<Issue>,
}

pub fn parse(
    builder: &mut AstBuilder,
    tokens: &[Token],
    file: FileId,
    universe: DeclId,
) -> ParseOutput {
    let mut parser = Parser {
        b: builder,
        tokens,
        i: 0,
        file,
        parent_refs: Vec::new(),
        issues: Vec::new(),
    };
    let top_level = parser.parse_file(universe);
    ParseOutput {
        top_level,
        parent_refs: parser.parent_refs,
        issues: parser.issues,
    }
}

struct Parser<'a, 'b> {
    b: &'a mut AstBuilder,
    tokens: &'b [Token],
    i: usize,
    file: FileId,
    parent_refs: Vec<ParentRef>,
    issues: Vec<Issue>,
}

impl Parser<'_, '_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.i)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.i + offset)
    }

    fn peek_on_line(&self, line: u32) -> Option<&Token> {
        self.peek().filter(|t| t.line == line)
    }

    fn advance(&mut self) -> Option<&Token> {
        let t = self.tokens.get(self.i);
        if t.is_some() {
            self.i += 1;
        }
        t
    }

    fn pos_of(&self, t: &Token) -> SourcePos {
        SourcePos::new(self.file, t.line, t.column)
    }

    fn last_pos(&self) -> SourcePos {
        self.tokens
            .get(self.i.saturating_sub(1))
            .map(|t| self.pos_of(t))
            .unwrap_or(SourcePos::NOT_AVAILABLE)
    }

    fn error(&mut self, pos: SourcePos, msg: impl Into<String>) {
        self.issues.push(Issue::new(pos, msg));
    }

    fn skip_rest_of_line(&mut self, line: u32) {
        while self.peek().is_some_and(|t| t.line == line) {
            self.i += 1;
        }
    }

    /// Does the remainder of `line` contain an `is` keyword? Used to tell a
    /// nested declaration header apart from an expression statement.
    fn line_declares(&self, line: u32) -> bool {
        let mut j = self.i;
        while let Some(t) = self.tokens.get(j) {
            if t.line != line {
                break;
            }
            if t.kind == TokenKind::KwIs {
                return true;
            }
            j += 1;
        }
        false
    }

    fn blank_decl(&self, name: String, pos: SourcePos, outer: DeclId, is_arg: bool) -> Decl {
        Decl {
            name,
            pos,
            args: Vec::new(),
            result_type: None,
            contract: Contract::default(),
            body: None,
            inner: Vec::new(),
            parent: None,
            outer: Some(outer),
            is_arg,
        }
    }

    fn parse_file(&mut self, universe: DeclId) -> Vec<DeclId> {
        let mut top_level = Vec::new();
        while self.peek().is_some() {
            let before = self.i;
            if let Some(d) = self.parse_declaration(universe) {
                top_level.push(d);
                self.b.decl_mut(universe).inner.push(d);
            }
            if self.i == before {
                self.i += 1;
            }
        }
        top_level
    }

    fn parse_declaration(&mut self, outer: DeclId) -> Option<DeclId> {
        let name_tok = self.peek()?.clone();
        let Some(name) = name_tok.ident() else {
            let pos = self.pos_of(&name_tok);
            self.error(pos, "expected a declaration name");
            self.skip_rest_of_line(name_tok.line);
            return None;
        };
        let header_line = name_tok.line;
        let header_col = name_tok.column;
        let pos = self.pos_of(&name_tok);
        let name = name.to_string();
        self.advance();

        let decl = self.blank_decl(name.clone(), pos, outer, false);
        let id = self.b.add_decl(decl);

        if self
            .peek_on_line(header_line)
            .is_some_and(|t| t.kind == TokenKind::LParen)
        {
            let args = self.parse_formal_args(id, header_line);
            self.b.decl_mut(id).args = args;
        }

        if self
            .peek_on_line(header_line)
            .is_some_and(|t| t.kind == TokenKind::Colon)
        {
            self.advance();
            match self.peek_on_line(header_line).cloned() {
                Some(t) if t.is_ident() => {
                    self.advance();
                    self.parent_refs.push(ParentRef {
                        decl: id,
                        name: t.ident().unwrap_or_default().to_string(),
                        pos: self.pos_of(&t),
                    });
                }
                _ => self.error(pos, format!("expected a parent name after `:` in `{name}`")),
            }
        }

        if let Some(t) = self.peek_on_line(header_line).cloned() {
            if t.is_ident() {
                self.advance();
                let tp = self.pos_of(&t);
                let rt = self.b.add_expr(
                    ExprKind::TypeRef {
                        name: t.ident().unwrap_or_default().to_string(),
                        resolved: None,
                    },
                    tp,
                );
                self.b.decl_mut(id).result_type = Some(rt);
            }
        }

        // Contract clauses may continue on lines indented past the header.
        loop {
            let Some(t) = self.peek().cloned() else { break };
            let in_header = t.line == header_line || t.column > header_col;
            match t.kind {
                TokenKind::KwPre if in_header => {
                    self.advance();
                    let e = self.parse_expr();
                    self.b.decl_mut(id).contract.preconditions.push(e);
                }
                TokenKind::KwPost if in_header => {
                    self.advance();
                    let e = self.parse_expr();
                    self.b.decl_mut(id).contract.postconditions.push(e);
                }
                _ => break,
            }
        }

        match self.peek().map(|t| t.kind.clone()) {
            Some(TokenKind::KwIs) => {
                self.advance();
                let body = self.parse_block(id, header_col);
                self.b.decl_mut(id).body = body;
            }
            Some(TokenKind::Op(op)) if op == ":=" => {
                self.advance();
                let e = self.parse_expr();
                self.b.decl_mut(id).body = Some(e);
            }
            _ => {
                self.error(pos, format!("expected `is` or `:=` in declaration of `{name}`"));
                self.skip_rest_of_line(header_line);
            }
        }

        Some(id)
    }

    fn parse_formal_args(&mut self, owner: DeclId, line: u32) -> Vec<DeclId> {
        let mut args = Vec::new();
        self.advance(); // `(`
        loop {
            let Some(t) = self.peek_on_line(line).cloned() else {
                self.error(self.last_pos(), "unclosed formal argument list");
                break;
            };
            match &t.kind {
                TokenKind::RParen => {
                    self.advance();
                    break;
                }
                TokenKind::Comma => {
                    self.advance();
                }
                TokenKind::Ident(arg_name) => {
                    let arg_name = arg_name.clone();
                    self.advance();
                    let apos = self.pos_of(&t);
                    let arg = self.blank_decl(arg_name, apos, owner, true);
                    let arg_id = self.b.add_decl(arg);
                    // An ident directly following the name is the argument's type.
                    if let Some(ty) = self.peek_on_line(line).cloned() {
                        if ty.is_ident() {
                            self.advance();
                            let tp = self.pos_of(&ty);
                            let rt = self.b.add_expr(
                                ExprKind::TypeRef {
                                    name: ty.ident().unwrap_or_default().to_string(),
                                    resolved: None,
                                },
                                tp,
                            );
                            self.b.decl_mut(arg_id).result_type = Some(rt);
                        }
                    }
                    args.push(arg_id);
                }
                _ => {
                    let p = self.pos_of(&t);
                    self.error(p, "expected an argument name");
                    self.advance();
                }
            }
        }
        args
    }

    /// Parse the statements of a declaration body. Inner declarations are
    /// attached to `owner`; expression statements are collected into the
    /// returned body expression.
    fn parse_block(&mut self, owner: DeclId, header_col: u32) -> Option<ExprId> {
        let mut stmts = Vec::new();
        let mut block_pos = None;
        loop {
            let Some(t) = self.peek().cloned() else { break };
            if t.column <= header_col {
                break;
            }
            if block_pos.is_none() {
                block_pos = Some(self.pos_of(&t));
            }
            let before = self.i;
            match &t.kind {
                TokenKind::KwSet => {
                    if let Some(e) = self.parse_assignment(t.line) {
                        stmts.push(e);
                    }
                }
                TokenKind::KwMatch => {
                    let e = self.parse_match(&t);
                    stmts.push(e);
                }
                TokenKind::Ident(_) if self.line_declares(t.line) => {
                    if let Some(d) = self.parse_declaration(owner) {
                        self.b.decl_mut(owner).inner.push(d);
                    }
                }
                TokenKind::Ident(_)
                    if self
                        .peek_at(1)
                        .is_some_and(|n| n.line == t.line && n.kind == TokenKind::Op(":=".to_string())) =>
                {
                    // `name := expr` declares a field.
                    if let Some(d) = self.parse_declaration(owner) {
                        self.b.decl_mut(owner).inner.push(d);
                    }
                }
                _ => {
                    let e = self.parse_expr();
                    stmts.push(e);
                }
            }
            if self.i == before {
                self.i += 1;
            }
        }
        match stmts.len() {
            0 => None,
            1 => Some(stmts[0]),
            _ => Some(
                self.b
                    .add_expr(ExprKind::Block(stmts), block_pos.unwrap_or(SourcePos::NOT_AVAILABLE)),
            ),
        }
    }

    fn parse_assignment(&mut self, line: u32) -> Option<ExprId> {
        self.advance(); // `set`
        let Some(name_tok) = self.peek_on_line(line).cloned() else {
            self.error(self.last_pos(), "expected a field name after `set`");
            return None;
        };
        let Some(field) = name_tok.ident().map(str::to_string) else {
            let p = self.pos_of(&name_tok);
            self.error(p, "expected a field name after `set`");
            self.skip_rest_of_line(line);
            return None;
        };
        self.advance();
        let pos = self.pos_of(&name_tok);
        if !self
            .peek_on_line(line)
            .is_some_and(|t| t.kind == TokenKind::Op(":=".to_string()))
        {
            self.error(pos, format!("expected `:=` after `set {field}`"));
            self.skip_rest_of_line(line);
            return None;
        }
        self.advance();
        let value = self.parse_expr();
        Some(self.b.add_expr(
            ExprKind::Assign {
                field,
                resolved: None,
                value,
            },
            pos,
        ))
    }

    fn parse_match(&mut self, match_tok: &Token) -> ExprId {
        let pos = self.pos_of(match_tok);
        self.advance(); // `match`
        let subject = self.parse_expr();
        let mut cases = Vec::new();
        loop {
            let Some(t) = self.peek().cloned() else { break };
            if t.column <= match_tok.column || !t.is_ident() {
                break;
            }
            let arrow = self
                .peek_at(1)
                .is_some_and(|n| n.line == t.line && n.kind == TokenKind::Op("=>".to_string()));
            if !arrow {
                break;
            }
            self.advance();
            self.advance();
            let body = self.parse_expr();
            cases.push(MatchCase {
                pattern: t.ident().unwrap_or_default().to_string(),
                pos: self.pos_of(&t),
                body,
            });
        }
        if cases.is_empty() {
            self.error(pos, "`match` without any cases");
        }
        self.b.add_expr(ExprKind::Match { subject, cases }, pos)
    }

    // ── expressions ──────────────────────────────────────────────────

    fn parse_expr(&mut self) -> ExprId {
        match self.peek() {
            Some(t) => {
                let line = t.line;
                self.parse_infix(line, 0)
            }
            None => {
                let p = self.last_pos();
                self.error(p, "expected an expression");
                self.b.add_expr(ExprKind::Block(Vec::new()), p)
            }
        }
    }

    /// Binding powers, loosest first: range, comparison/logic, additive,
    /// multiplicative.
    fn infix_level(op: &str) -> Option<u8> {
        match op {
            ".." => Some(0),
            "<" | ">" | "<=" | ">=" | "=" | "!=" | "&&" | "||" => Some(1),
            "+" | "-" => Some(2),
            "*" | "/" | "%" => Some(3),
            _ => None,
        }
    }

    fn parse_infix(&mut self, line: u32, min_level: u8) -> ExprId {
        let mut lhs = if min_level >= 3 {
            self.parse_postfix(line, true)
        } else {
            self.parse_infix(line, min_level + 1)
        };
        loop {
            let Some(t) = self.peek_on_line(line).cloned() else { break };
            let TokenKind::Op(op) = &t.kind else { break };
            match Self::infix_level(op) {
                Some(level) if level == min_level => {
                    self.advance();
                    let rhs = if min_level >= 3 {
                        self.parse_postfix(line, true)
                    } else {
                        self.parse_infix(line, min_level + 1)
                    };
                    let pos = self.pos_of(&t);
                    lhs = self.b.add_expr(
                        ExprKind::Call {
                            target: Some(lhs),
                            name: format!("infix {op}"),
                            called: None,
                            actuals: vec![rhs],
                        },
                        pos,
                    );
                }
                _ => break,
            }
        }
        lhs
    }

    fn parse_postfix(&mut self, line: u32, allow_juxt: bool) -> ExprId {
        let mut e = self.parse_primary(line, allow_juxt);
        loop {
            let Some(t) = self.peek_on_line(line).cloned() else { break };
            if t.kind != TokenKind::Dot {
                break;
            }
            self.advance();
            let Some(name_tok) = self.peek_on_line(line).cloned() else {
                self.error(self.pos_of(&t), "expected a name after `.`");
                break;
            };
            let Some(name) = name_tok.ident().map(str::to_string) else {
                let p = self.pos_of(&name_tok);
                self.error(p, "expected a name after `.`");
                break;
            };
            self.advance();
            let actuals = self.parse_actuals(line, allow_juxt);
            let pos = self.pos_of(&name_tok);
            e = self.b.add_expr(
                ExprKind::Call {
                    target: Some(e),
                    name,
                    called: None,
                    actuals,
                },
                pos,
            );
        }
        e
    }

    fn parse_primary(&mut self, line: u32, allow_juxt: bool) -> ExprId {
        let Some(t) = self.peek_on_line(line).cloned() else {
            let p = self.last_pos();
            self.error(p, "expected an expression");
            return self.b.add_expr(ExprKind::Block(Vec::new()), p);
        };
        let pos = self.pos_of(&t);
        match &t.kind {
            TokenKind::Number(n) => {
                self.advance();
                self.b.add_expr(ExprKind::NumLit(n.clone()), pos)
            }
            TokenKind::Str(s) => {
                self.advance();
                self.b.add_expr(ExprKind::StrLit(s.clone()), pos)
            }
            TokenKind::KwTrue => {
                self.advance();
                self.b.add_expr(ExprKind::BoolLit(true), pos)
            }
            TokenKind::KwFalse => {
                self.advance();
                self.b.add_expr(ExprKind::BoolLit(false), pos)
            }
            TokenKind::KwCurrent => {
                self.advance();
                self.b.add_expr(ExprKind::Current, pos)
            }
            TokenKind::LParen => {
                self.advance();
                let e = self.parse_infix(line, 0);
                if self
                    .peek_on_line(line)
                    .is_some_and(|n| n.kind == TokenKind::RParen)
                {
                    self.advance();
                } else {
                    self.error(pos, "unclosed `(`");
                }
                e
            }
            TokenKind::Ident(name) => {
                let name = name.clone();
                self.advance();
                let actuals = if allow_juxt {
                    self.parse_actuals(line, false)
                } else if self
                    .peek_on_line(line)
                    .is_some_and(|n| n.kind == TokenKind::LParen)
                {
                    self.parse_paren_actuals(line)
                } else {
                    Vec::new()
                };
                self.b.add_expr(
                    ExprKind::Call {
                        target: None,
                        name,
                        called: None,
                        actuals,
                    },
                    pos,
                )
            }
            _ => {
                self.advance();
                self.error(pos, "expected an expression");
                self.b.add_expr(ExprKind::Block(Vec::new()), pos)
            }
        }
    }

    fn parse_actuals(&mut self, line: u32, _allow_juxt_args: bool) -> Vec<ExprId> {
        if self
            .peek_on_line(line)
            .is_some_and(|t| t.kind == TokenKind::LParen)
        {
            return self.parse_paren_actuals(line);
        }
        // Space-separated actuals: `say "Hello"`. Arguments bind tightly,
        // so each actual is a postfix expression without juxtaposition of
        // its own.
        let mut out = Vec::new();
        while let Some(t) = self.peek_on_line(line) {
            let starts_actual = matches!(
                t.kind,
                TokenKind::Number(_)
                    | TokenKind::Str(_)
                    | TokenKind::Ident(_)
                    | TokenKind::KwTrue
                    | TokenKind::KwFalse
                    | TokenKind::KwCurrent
            );
            if !starts_actual {
                break;
            }
            out.push(self.parse_postfix(line, false));
        }
        out
    }

    fn parse_paren_actuals(&mut self, line: u32) -> Vec<ExprId> {
        self.advance(); // `(`
        if self
            .peek_on_line(line)
            .is_some_and(|t| t.kind == TokenKind::RParen)
        {
            self.advance();
            return Vec::new();
        }
        let mut out = vec![self.parse_infix(line, 0)];
        while self
            .peek_on_line(line)
            .is_some_and(|t| t.kind == TokenKind::Comma)
        {
            self.advance();
            out.push(self.parse_infix(line, 0));
        }
        if self
            .peek_on_line(line)
            .is_some_and(|t| t.kind == TokenKind::RParen)
        {
            self.advance();
        } else {
            self.error(self.last_pos(), "unclosed actual argument list");
        }
        out
    }
}
