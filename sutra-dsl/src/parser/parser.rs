//! Recursive-descent parser

use super::ast::*;
use crate::lexer::*;

// ============================================================================
// PARSER
// ============================================================================

/// Parser for SUTRA token streams.
///
/// Newline tokens carry no grammatical meaning and are dropped on
/// construction. One token of lookahead; the first grammar violation aborts.
pub struct Parser {
    pub(crate) tokens: Vec<Token>,
    pub(crate) pos: usize,
}

impl Parser {
    /// Create a new parser from a vector of tokens.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Newline)
            .collect();

        if tokens.last().map(|t| &t.kind) != Some(&TokenKind::Eof) {
            let span = tokens
                .last()
                .map(|t| Span {
                    start: t.span.end,
                    end: t.span.end,
                    line: t.span.line,
                    column: t.span.column + (t.span.end - t.span.start),
                })
                .unwrap_or_default();
            tokens.push(Token {
                kind: TokenKind::Eof,
                lexeme: String::new(),
                span,
            });
        }

        Self { tokens, pos: 0 }
    }

    /// Parse a complete program.
    pub fn parse(&mut self) -> Result<Program, ParseError> {
        let headers = self.parse_headers()?;
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.parse_statement()?);
        }
        Ok(Program {
            headers,
            statements,
        })
    }

    // ========================================================================
    // Headers
    // ========================================================================

    fn parse_headers(&mut self) -> Result<Vec<Header>, ParseError> {
        let mut headers = Vec::new();
        while self.check(&TokenKind::Hash) {
            self.advance();
            let key = self.expect_identifier("Expected header key after #")?;
            let value = self.expect_string("Expected string value for header")?;
            headers.push(Header { key, value });
        }
        Ok(headers)
    }

    // ========================================================================
    // Statements
    // ========================================================================

    pub(crate) fn parse_statement(&mut self) -> Result<Statement, ParseError> {
        match &self.current().kind {
            TokenKind::Intent => {
                self.advance();
                let predicate = self.parse_predicate()?;
                self.expect(TokenKind::Semicolon, "Expected ';' after INTENT")?;
                Ok(Statement::Intent(predicate))
            }
            TokenKind::Fact => {
                self.advance();
                let predicate = self.parse_predicate()?;
                self.expect(TokenKind::Semicolon, "Expected ';' after FACT")?;
                Ok(Statement::Fact(predicate))
            }
            TokenKind::Query => self.parse_query(),
            TokenKind::Offer => self.parse_offer(),
            TokenKind::Accept => {
                self.advance();
                let offer_id = self.expect_string("Expected offer id string")?;
                self.expect(TokenKind::Semicolon, "Expected ';' after ACCEPT")?;
                Ok(Statement::Accept { offer_id })
            }
            TokenKind::Reject => self.parse_reject(),
            TokenKind::Commit => self.parse_commit(),
            TokenKind::Act => {
                self.advance();
                let predicate = self.parse_predicate()?;
                self.expect(TokenKind::Semicolon, "Expected ';' after ACT")?;
                Ok(Statement::Act(predicate))
            }
            _ => {
                let msg = format!("Unexpected token: '{}'", self.current().lexeme);
                Err(self.error(&msg))
            }
        }
    }

    fn parse_query(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Query, "Expected QUERY")?;
        let predicate = self.parse_predicate()?;
        self.expect(TokenKind::From, "Expected 'FROM' in QUERY")?;
        let from_agent = self.expect_string("Expected agent string after FROM")?;
        self.expect(TokenKind::Semicolon, "Expected ';' after QUERY")?;
        Ok(Statement::Query {
            predicate,
            from_agent,
        })
    }

    fn parse_offer(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Offer, "Expected OFFER")?;
        self.expect(TokenKind::Id, "Expected 'id' in OFFER")?;
        self.expect(TokenKind::Equals, "Expected '=' after 'id'")?;
        let offer_id = self.expect_string("Expected offer id string")?;
        self.expect(TokenKind::To, "Expected 'TO' in OFFER")?;
        let to_agent = self.expect_string("Expected agent string after TO")?;
        self.expect(TokenKind::LBrace, "Expected '{' to open OFFER body")?;

        let mut fields = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = self.expect_identifier("Expected field name in OFFER body")?;
            self.expect(TokenKind::Colon, "Expected ':' after field name")?;
            let value = self.parse_value()?;
            fields.push(OfferField { key, value });
            self.optional_comma();
        }

        self.expect(TokenKind::RBrace, "Expected '}' to close OFFER body")?;
        self.expect(TokenKind::Semicolon, "Expected ';' after OFFER")?;
        Ok(Statement::Offer {
            offer_id,
            to_agent,
            fields,
        })
    }

    fn parse_reject(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Reject, "Expected REJECT")?;
        let offer_id = self.expect_string("Expected offer id string")?;
        let reason = if self.check(&TokenKind::Reason) {
            self.advance();
            Some(self.expect_string("Expected reason string")?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expected ';' after REJECT")?;
        Ok(Statement::Reject { offer_id, reason })
    }

    fn parse_commit(&mut self) -> Result<Statement, ParseError> {
        self.expect(TokenKind::Commit, "Expected COMMIT")?;
        let predicate = self.parse_predicate()?;
        let deadline = if self.check(&TokenKind::By) {
            self.advance();
            Some(self.expect_string("Expected deadline string after BY")?)
        } else {
            None
        };
        self.expect(TokenKind::Semicolon, "Expected ';' after COMMIT")?;
        Ok(Statement::Commit {
            predicate,
            deadline,
        })
    }

    // ========================================================================
    // Predicates and values
    // ========================================================================

    pub(crate) fn parse_predicate(&mut self) -> Result<Predicate, ParseError> {
        let name = self.expect_identifier("Expected predicate name")?;
        self.expect(TokenKind::LParen, "Expected '(' after predicate name")?;

        let mut args = Vec::new();
        while !self.check(&TokenKind::RParen) {
            let arg_name = self.expect_identifier("Expected argument name")?;
            self.expect(TokenKind::Equals, "Expected '=' after argument name")?;
            let value = self.parse_value()?;
            args.push(NamedArg {
                name: arg_name,
                value,
            });
            self.optional_comma();
        }

        self.expect(TokenKind::RParen, "Expected ')' to close predicate")?;
        Ok(Predicate { name, args })
    }

    pub(crate) fn parse_value(&mut self) -> Result<ValueNode, ParseError> {
        let value = match &self.current().kind {
            TokenKind::String(s) => ValueNode::String(s.clone()),
            TokenKind::Number(n) => ValueNode::Number(*n),
            TokenKind::True => ValueNode::Bool(true),
            TokenKind::False => ValueNode::Bool(false),
            TokenKind::Null => ValueNode::Null,
            TokenKind::LBrace => return self.parse_map(),
            TokenKind::LBracket => return self.parse_list(),
            other => {
                let msg = format!("Expected a value, got {}", other);
                return Err(self.error(&msg));
            }
        };
        self.advance();
        Ok(value)
    }

    fn parse_map(&mut self) -> Result<ValueNode, ParseError> {
        self.expect(TokenKind::LBrace, "Expected '{'")?;
        let mut entries = Vec::new();
        while !self.check(&TokenKind::RBrace) {
            let key = self.expect_identifier("Expected map key")?;
            self.expect(TokenKind::Colon, "Expected ':' in map entry")?;
            let value = self.parse_value()?;
            entries.push((key, value));
            self.optional_comma();
        }
        self.expect(TokenKind::RBrace, "Expected '}' to close map")?;
        Ok(ValueNode::Map(entries))
    }

    fn parse_list(&mut self) -> Result<ValueNode, ParseError> {
        self.expect(TokenKind::LBracket, "Expected '['")?;
        let mut items = Vec::new();
        while !self.check(&TokenKind::RBracket) {
            items.push(self.parse_value()?);
            self.optional_comma();
        }
        self.expect(TokenKind::RBracket, "Expected ']' to close list")?;
        Ok(ValueNode::List(items))
    }

    // ========================================================================
    // Helper methods
    // ========================================================================

    pub(crate) fn current(&self) -> &Token {
        // `new` guarantees a trailing Eof, and `advance` never moves past it.
        &self.tokens[self.pos]
    }

    pub(crate) fn advance(&mut self) {
        if !self.is_at_end() {
            self.pos += 1;
        }
    }

    pub(crate) fn is_at_end(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    pub(crate) fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current().kind) == std::mem::discriminant(kind)
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, msg: &str) -> Result<(), ParseError> {
        if self.check(&kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.error(msg))
        }
    }

    pub(crate) fn expect_identifier(&mut self, msg: &str) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::Identifier(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(msg)),
        }
    }

    pub(crate) fn expect_string(&mut self, msg: &str) -> Result<String, ParseError> {
        match &self.current().kind {
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(s)
            }
            _ => Err(self.error(msg)),
        }
    }

    pub(crate) fn optional_comma(&mut self) {
        if self.check(&TokenKind::Comma) {
            self.advance();
        }
    }

    pub(crate) fn error(&self, msg: &str) -> ParseError {
        let token = self.current();
        ParseError {
            message: format!("{} (got {})", msg, token.kind),
            position: self.pos,
            line: token.span.line,
            column: token.span.column,
        }
    }
}

/// Parse a token stream into a `Program`.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Program, ParseError> {
    Parser::new(tokens).parse()
}
