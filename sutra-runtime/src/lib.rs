//! SUTRA Runtime - Interpreter, Sandbox & Transactions
//!
//! Executes parsed SUTRA programs against agents:
//! - `interpreter`: applies statements to a borrowed `AgentState`
//! - `sandbox`: governed runs of untrusted source on disposable agents
//! - `transaction`: snapshot/rollback execution against live agents
//!
//! `run()` is the plain pipeline: lex, parse, interpret.

pub mod interpreter;
pub mod sandbox;
pub mod transaction;

pub use interpreter::{execute, Interpreter, RuntimeError};
pub use sandbox::{AuditEntry, AuditEvent, Sandbox, SandboxResult, SandboxStats};
pub use transaction::{safe_execute, safe_execute_with, Transaction, TransactionError};

use sutra_core::AgentState;
use sutra_dsl::{DslError, LexError, ParseError};
use thiserror::Error;

// ============================================================================
// ERRORS
// ============================================================================

/// Any failure of the execution pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),
}

impl From<DslError> for EngineError {
    fn from(err: DslError) -> Self {
        match err {
            DslError::Lex(e) => EngineError::Lex(e),
            DslError::Parse(e) => EngineError::Parse(e),
        }
    }
}

/// Result type for pipeline operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Lex, parse and execute `source` against `agent`.
///
/// Statements applied before a runtime failure stay applied; use
/// `safe_execute` for all-or-nothing execution.
pub fn run(source: &str, agent: &mut AgentState) -> EngineResult<Vec<String>> {
    let program = sutra_dsl::parse(source)?;
    Ok(interpreter::execute(&program, agent)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_pipeline() {
        let mut agent = AgentState::new("alice");
        let responses = run(r#"FACT stock(item="TV", qty=3);"#, &mut agent).unwrap();
        assert_eq!(responses, vec![r#"[FACT] stock(item="TV", qty=3)"#]);
        assert_eq!(agent.beliefs().len(), 1);
    }

    #[test]
    fn test_run_maps_front_end_errors() {
        let mut agent = AgentState::new("alice");
        assert!(matches!(run("FACT $;", &mut agent), Err(EngineError::Lex(_))));
        assert!(matches!(run("FACT p()", &mut agent), Err(EngineError::Parse(_))));
        assert!(agent.log().is_empty());
    }

    #[test]
    fn test_engine_error_display_is_transparent() {
        let err: EngineError = TransactionError::NotActive.into();
        assert_eq!(err.to_string(), "No active transaction");
    }
}
