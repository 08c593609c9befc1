//! Lexer implementation

use super::token::*;
use std::iter::Peekable;
use std::str::CharIndices;

// ============================================================================
// LEXER IMPLEMENTATION
// ============================================================================

/// Lexer for SUTRA source text.
pub struct Lexer<'a> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    line: usize,
    column: usize,
    pos: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer for the given source.
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            chars: source.char_indices().peekable(),
            line: 1,
            column: 1,
            pos: 0,
        }
    }

    /// Tokenize the entire source. The last token is always `Eof`.
    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            let token = self.next_token()?;
            let is_eof = token.kind == TokenKind::Eof;
            tokens.push(token);
            if is_eof {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the source.
    fn next_token(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace_and_comments();

        let start_pos = self.pos;
        let start_line = self.line;
        let start_col = self.column;

        let kind = match self.peek_char() {
            None => TokenKind::Eof,
            Some(c) => match c {
                '\n' => {
                    self.advance();
                    TokenKind::Newline
                }
                '(' => self.single(TokenKind::LParen),
                ')' => self.single(TokenKind::RParen),
                '{' => self.single(TokenKind::LBrace),
                '}' => self.single(TokenKind::RBrace),
                '[' => self.single(TokenKind::LBracket),
                ']' => self.single(TokenKind::RBracket),
                ',' => self.single(TokenKind::Comma),
                ':' => self.single(TokenKind::Colon),
                ';' => self.single(TokenKind::Semicolon),
                '=' => self.single(TokenKind::Equals),
                '#' => self.single(TokenKind::Hash),

                '"' => self.scan_string(start_line, start_col)?,

                '-' if self.peek_next_char().is_some_and(|n| n.is_ascii_digit()) => {
                    self.advance();
                    self.scan_number(start_pos, start_line, start_col)?
                }

                c if c.is_ascii_digit() => self.scan_number(start_pos, start_line, start_col)?,

                c if c.is_ascii_alphabetic() || c == '_' => self.scan_identifier(),

                c => {
                    return Err(LexError {
                        line: start_line,
                        column: start_col,
                        message: format!("Unexpected character: '{}'", c),
                    })
                }
            },
        };

        let lexeme = match &kind {
            TokenKind::String(s) => s.clone(),
            TokenKind::Newline => "\\n".to_string(),
            _ => self.source[start_pos..self.pos].to_string(),
        };

        Ok(Token {
            kind,
            lexeme,
            span: Span {
                start: start_pos,
                end: self.pos,
                line: start_line,
                column: start_col,
            },
        })
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    /// Scan an identifier or keyword.
    fn scan_identifier(&mut self) -> TokenKind {
        let start = self.pos;

        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.advance();
            } else {
                break;
            }
        }

        let ident = &self.source[start..self.pos];
        TokenKind::keyword(ident).unwrap_or_else(|| TokenKind::Identifier(ident.to_string()))
    }

    /// Scan a string literal with escape sequences. Unknown escapes keep the
    /// escaped character and drop the backslash.
    fn scan_string(&mut self, line: usize, column: usize) -> Result<TokenKind, LexError> {
        self.advance(); // consume opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(LexError {
                        line,
                        column,
                        message: "Unterminated string".to_string(),
                    })
                }
                Some('"') => break,
                Some('\\') => match self.advance() {
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(other) => value.push(other),
                    None => {
                        return Err(LexError {
                            line,
                            column,
                            message: "Unterminated string".to_string(),
                        })
                    }
                },
                Some(c) => value.push(c),
            }
        }

        Ok(TokenKind::String(value))
    }

    /// Scan digits with an optional fractional part. `start` may point at a
    /// leading `-` that was already consumed. Literals too large for an f64
    /// are rejected since infinity has no literal or JSON form.
    fn scan_number(
        &mut self,
        start: usize,
        line: usize,
        column: usize,
    ) -> Result<TokenKind, LexError> {
        self.skip_digits();
        if self.peek_char() == Some('.') {
            self.advance();
            self.skip_digits();
        }

        let text = &self.source[start..self.pos];
        // Digits with at most one '.' always form a valid float.
        let value = text.parse::<f64>().unwrap_or(0.0);
        if !value.is_finite() {
            return Err(LexError {
                line,
                column,
                message: "Number literal out of range".to_string(),
            });
        }
        Ok(TokenKind::Number(value))
    }

    fn skip_digits(&mut self) {
        while self.peek_char().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    /// Skip spaces, tabs, carriage returns and `//` comments. Newlines are
    /// significant to the token stream and are left in place.
    fn skip_whitespace_and_comments(&mut self) {
        loop {
            match self.peek_char() {
                Some(' ') | Some('\t') | Some('\r') => {
                    self.advance();
                }
                Some('/') if self.peek_next_char() == Some('/') => {
                    while let Some(c) = self.peek_char() {
                        if c == '\n' {
                            break;
                        }
                        self.advance();
                    }
                }
                _ => break,
            }
        }
    }

    fn peek_char(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, c)| *c)
    }

    fn peek_next_char(&self) -> Option<char> {
        let mut iter = self.source[self.pos..].chars();
        iter.next();
        iter.next()
    }

    fn advance(&mut self) -> Option<char> {
        let (i, c) = self.chars.next()?;
        self.pos = i + c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(c)
    }
}

/// Tokenize `source` in one call.
pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// The lexer either fails cleanly or ends with exactly one Eof.
        #[test]
        fn prop_lexer_never_panics(source in "\\PC{0,200}") {
            if let Ok(tokens) = tokenize(&source) {
                prop_assert_eq!(tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
                prop_assert_eq!(
                    tokens.iter().filter(|t| t.kind == TokenKind::Eof).count(),
                    1
                );
            }
        }

        /// Spans are monotonically non-decreasing.
        #[test]
        fn prop_spans_are_ordered(source in "[A-Za-z0-9_ (){};:,=#\n\"]{0,120}") {
            if let Ok(tokens) = tokenize(&source) {
                for pair in tokens.windows(2) {
                    prop_assert!(pair[0].span.end <= pair[1].span.start);
                }
            }
        }
    }
}
