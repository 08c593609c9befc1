//! Lexer token types

use std::fmt;
use thiserror::Error;

// ============================================================================
// LEXER TYPES
// ============================================================================

/// Token kinds for the SUTRA language.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Statement keywords
    Intent,
    Fact,
    Query,
    Offer,
    Accept,
    Reject,
    Commit,
    Act,

    // Secondary keywords
    From,
    To,
    By,
    Reason,
    Id,

    // Literals
    String(String),
    Number(f64),
    True,
    False,
    Null,
    Identifier(String),

    // Delimiters
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    Comma,
    Colon,
    Semicolon,
    Equals,

    /// Header marker `#`
    Hash,

    // Special
    Newline,
    Eof,
}

impl TokenKind {
    /// Upper-case kind name used in diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            TokenKind::Intent => "INTENT",
            TokenKind::Fact => "FACT",
            TokenKind::Query => "QUERY",
            TokenKind::Offer => "OFFER",
            TokenKind::Accept => "ACCEPT",
            TokenKind::Reject => "REJECT",
            TokenKind::Commit => "COMMIT",
            TokenKind::Act => "ACT",
            TokenKind::From => "FROM",
            TokenKind::To => "TO",
            TokenKind::By => "BY",
            TokenKind::Reason => "REASON",
            TokenKind::Id => "ID",
            TokenKind::String(_) => "STRING",
            TokenKind::Number(_) => "NUMBER",
            TokenKind::True => "TRUE",
            TokenKind::False => "FALSE",
            TokenKind::Null => "NULL",
            TokenKind::Identifier(_) => "IDENTIFIER",
            TokenKind::LParen => "LPAREN",
            TokenKind::RParen => "RPAREN",
            TokenKind::LBrace => "LBRACE",
            TokenKind::RBrace => "RBRACE",
            TokenKind::LBracket => "LBRACKET",
            TokenKind::RBracket => "RBRACKET",
            TokenKind::Comma => "COMMA",
            TokenKind::Colon => "COLON",
            TokenKind::Semicolon => "SEMICOLON",
            TokenKind::Equals => "EQUALS",
            TokenKind::Hash => "HASH",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Eof => "EOF",
        }
    }

    /// Map a scanned word to its reserved kind, if any.
    ///
    /// Statement and secondary keywords are upper case; `id`, `true`,
    /// `false` and `null` are lower case. Matching is case-sensitive.
    pub fn keyword(word: &str) -> Option<TokenKind> {
        let kind = match word {
            "INTENT" => TokenKind::Intent,
            "FACT" => TokenKind::Fact,
            "QUERY" => TokenKind::Query,
            "OFFER" => TokenKind::Offer,
            "ACCEPT" => TokenKind::Accept,
            "REJECT" => TokenKind::Reject,
            "COMMIT" => TokenKind::Commit,
            "ACT" => TokenKind::Act,
            "FROM" => TokenKind::From,
            "TO" => TokenKind::To,
            "BY" => TokenKind::By,
            "REASON" => TokenKind::Reason,
            "id" => TokenKind::Id,
            "true" => TokenKind::True,
            "false" => TokenKind::False,
            "null" => TokenKind::Null,
            _ => return None,
        };
        Some(kind)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Source location span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
    pub line: usize,
    pub column: usize,
}

impl Default for Span {
    fn default() -> Self {
        Self {
            start: 0,
            end: 0,
            line: 1,
            column: 1,
        }
    }
}

/// A token with its kind, literal text and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Literal text; for strings this is the unescaped contents
    pub lexeme: String,
    pub span: Span,
}

/// Tokenizing failure. Scanning stops at the first error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[Line {line}, Col {column}] {message}")]
pub struct LexError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}
