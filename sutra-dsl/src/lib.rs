//! SUTRA DSL - Lexer, Parser & Pretty Printer
//!
//! Front end of the SUTRA agent negotiation language.
//!
//! Architecture:
//! ```text
//! Source text
//!     ↓
//! Lexer (tokens, with newlines)
//!     ↓
//! Parser (newlines dropped, recursive descent)
//!     ↓
//! Program (headers + statements)
//!     ↓
//! Pretty Printer (for round-trip testing)
//! ```

pub mod lexer;
pub mod parser;
pub mod pretty_printer;

pub use lexer::*;
pub use parser::*;
pub use pretty_printer::*;

use thiserror::Error;

/// Failure in either front-end stage.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DslError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Lex and parse `source` into a `Program`.
pub fn parse(source: &str) -> Result<Program, DslError> {
    let tokens = tokenize(source)?;
    Ok(parse_tokens(tokens)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reports_lex_errors() {
        let err = parse("FACT p(x=\"open").unwrap_err();
        assert!(matches!(err, DslError::Lex(_)));
        assert!(err.to_string().starts_with("[Line 1, Col 10]"));
    }

    #[test]
    fn test_parse_reports_parse_errors() {
        let err = parse("FACT p(x=1)").unwrap_err();
        assert!(matches!(err, DslError::Parse(_)));
    }

    #[test]
    fn test_parse_ok() {
        let program = parse("ACT go();").unwrap();
        assert_eq!(program.statements.len(), 1);
    }
}
