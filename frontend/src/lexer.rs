//! Tokenizer for Lume source text.
//!
//! Line/column aware so the tree and the editor agree on positions.
//! `#` starts a comment running to end of line.

use crate::Issue;
use crate::ast::{FileId, SourcePos};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    Number(String),
    Str(String),
    /// Multi-character operator such as `..`, `:=`, `=>`, `<=`.
    Op(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Dot,
    Semicolon,
    Colon,
    KwIs,
    KwPre,
    KwPost,
    KwMatch,
    KwSet,
    KwCurrent,
    KwTrue,
    KwFalse,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line.
    pub line: u32,
    /// 1-based column of the first character.
    pub column: u32,
    /// Width in characters.
    pub len: u32,
}

impl Token {
    pub fn pos(&self, file: FileId) -> SourcePos {
        SourcePos::new(file, self.line, self.column)
    }

    /// Column one past the last character.
    pub fn end_column(&self) -> u32 {
        self.column + self.len
    }

    pub fn is_ident(&self) -> bool {
        matches!(self.kind, TokenKind::Ident(_))
    }

    pub fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this token can terminate a statement: an identifier,
    /// a semicolon, or a closing brace/bracket/paren.
    pub fn terminates_statement(&self) -> bool {
        matches!(
            self.kind,
            TokenKind::Ident(_)
                | TokenKind::Semicolon
                | TokenKind::RBrace
                | TokenKind::RBracket
                | TokenKind::RParen
        )
    }
}

fn keyword(word: &str) -> Option<TokenKind> {
    match word {
        "is" => Some(TokenKind::KwIs),
        "pre" => Some(TokenKind::KwPre),
        "post" => Some(TokenKind::KwPost),
        "match" => Some(TokenKind::KwMatch),
        "set" => Some(TokenKind::KwSet),
        "current" => Some(TokenKind::KwCurrent),
        "true" => Some(TokenKind::KwTrue),
        "false" => Some(TokenKind::KwFalse),
        _ => None,
    }
}

fn is_op_char(c: char) -> bool {
    matches!(c, '+' | '-' | '*' | '/' | '<' | '>' | '=' | '!' | '&' | '|' | '%' | '?')
}

/// Tokenize `text`. Never fails: malformed input is reported through the
/// returned issues and skipped, so a best-effort token stream always comes
/// back.
pub fn tokenize(text: &str, file: FileId) -> (Vec<Token>, Vec<Issue>) {
    let mut tokens = Vec::new();
    let mut issues = Vec::new();

    for (line_idx, line) in text.lines().enumerate() {
        let line_no = line_idx as u32 + 1;
        let chars: Vec<char> = line.chars().collect();
        let mut i = 0usize;
        while i < chars.len() {
            let c = chars[i];
            let col = i as u32 + 1;
            match c {
                ' ' | '\t' => {
                    i += 1;
                }
                '#' => break,
                '"' => {
                    let mut value = String::new();
                    let mut j = i + 1;
                    let mut closed = false;
                    while j < chars.len() {
                        if chars[j] == '"' {
                            closed = true;
                            break;
                        }
                        value.push(chars[j]);
                        j += 1;
                    }
                    if !closed {
                        issues.push(Issue::new(
                            SourcePos::new(file, line_no, col),
                            "unterminated string literal",
                        ));
                    }
                    let len = (j + 1).min(chars.len()) - i;
                    tokens.push(Token {
                        kind: TokenKind::Str(value),
                        line: line_no,
                        column: col,
                        len: len as u32,
                    });
                    i = j + 1;
                }
                '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' => {
                    let kind = match c {
                        '(' => TokenKind::LParen,
                        ')' => TokenKind::RParen,
                        '[' => TokenKind::LBracket,
                        ']' => TokenKind::RBracket,
                        '{' => TokenKind::LBrace,
                        '}' => TokenKind::RBrace,
                        ',' => TokenKind::Comma,
                        _ => TokenKind::Semicolon,
                    };
                    tokens.push(Token {
                        kind,
                        line: line_no,
                        column: col,
                        len: 1,
                    });
                    i += 1;
                }
                '.' => {
                    // `..` is the range operator, a single `.` selects a member.
                    if i + 1 < chars.len() && chars[i + 1] == '.' {
                        tokens.push(Token {
                            kind: TokenKind::Op("..".to_string()),
                            line: line_no,
                            column: col,
                            len: 2,
                        });
                        i += 2;
                    } else {
                        tokens.push(Token {
                            kind: TokenKind::Dot,
                            line: line_no,
                            column: col,
                            len: 1,
                        });
                        i += 1;
                    }
                }
                ':' => {
                    if i + 1 < chars.len() && chars[i + 1] == '=' {
                        tokens.push(Token {
                            kind: TokenKind::Op(":=".to_string()),
                            line: line_no,
                            column: col,
                            len: 2,
                        });
                        i += 2;
                    } else {
                        tokens.push(Token {
                            kind: TokenKind::Colon,
                            line: line_no,
                            column: col,
                            len: 1,
                        });
                        i += 1;
                    }
                }
                _ if c.is_ascii_digit() => {
                    let mut j = i;
                    while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '_') {
                        j += 1;
                    }
                    // Fractional part, but not the start of a `..` range.
                    if j < chars.len()
                        && chars[j] == '.'
                        && j + 1 < chars.len()
                        && chars[j + 1].is_ascii_digit()
                    {
                        j += 1;
                        while j < chars.len() && chars[j].is_ascii_digit() {
                            j += 1;
                        }
                    }
                    let word: String = chars[i..j].iter().collect();
                    tokens.push(Token {
                        kind: TokenKind::Number(word),
                        line: line_no,
                        column: col,
                        len: (j - i) as u32,
                    });
                    i = j;
                }
                _ if c.is_alphabetic() || c == '_' => {
                    let mut j = i;
                    while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_') {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    let kind = keyword(&word).unwrap_or(TokenKind::Ident(word));
                    tokens.push(Token {
                        kind,
                        line: line_no,
                        column: col,
                        len: (j - i) as u32,
                    });
                    i = j;
                }
                _ if is_op_char(c) => {
                    let mut j = i;
                    while j < chars.len() && is_op_char(chars[j]) {
                        j += 1;
                    }
                    let word: String = chars[i..j].iter().collect();
                    tokens.push(Token {
                        kind: TokenKind::Op(word),
                        line: line_no,
                        column: col,
                        len: (j - i) as u32,
                    });
                    i = j;
                }
                _ => {
                    issues.push(Issue::new(
                        SourcePos::new(file, line_no, col),
                        format!("unexpected character `{c}`"),
                    ));
                    i += 1;
                }
            }
        }
    }

    (tokens, issues)
}
