//! Transaction manager: atomic, rollback-safe execution against a live agent.
//!
//! `begin()` pushes a copy of the six ledgers; nested calls create savepoints.
//! `commit()` discards the top copy, `rollback()` restores it. Hooks fire only
//! when the outermost transaction ends.
//!
//! ```text
//! idle ──begin──▶ active(1) ──begin──▶ active(n)
//!   ▲                │  ▲                  │
//!   └─commit/rollback┘  └──commit/rollback─┘
//!   ▲                                      │
//!   └──────────────rollback_all────────────┘
//! ```

use crate::EngineResult;
use std::time::Instant;
use sutra_core::{AgentState, Ledgers, TransactionConfig};
use thiserror::Error;

/// Invalid transaction operation or expired transaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransactionError {
    #[error("No active transaction")]
    NotActive,

    #[error("Transaction timed out: {elapsed_ms}ms > {limit_ms}ms")]
    Timeout { elapsed_ms: u64, limit_ms: u64 },
}

type Hook<'a> = Box<dyn FnMut(&AgentState) + 'a>;

/// Snapshot stack over a borrowed live agent.
///
/// Dropping a transaction that is still active rolls everything back.
pub struct Transaction<'a> {
    agent: &'a mut AgentState,
    config: TransactionConfig,
    snapshots: Vec<Ledgers>,
    started: Option<Instant>,
    on_commit: Vec<Hook<'a>>,
    on_rollback: Vec<Hook<'a>>,
}

impl<'a> Transaction<'a> {
    pub fn new(agent: &'a mut AgentState) -> Self {
        Self::with_config(agent, TransactionConfig::default())
    }

    pub fn with_config(agent: &'a mut AgentState, config: TransactionConfig) -> Self {
        Self {
            agent,
            config,
            snapshots: Vec::new(),
            started: None,
            on_commit: Vec::new(),
            on_rollback: Vec::new(),
        }
    }

    /// Nesting depth; 0 when idle.
    pub fn depth(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_active(&self) -> bool {
        !self.snapshots.is_empty()
    }

    pub fn agent(&self) -> &AgentState {
        &*self.agent
    }

    pub fn agent_mut(&mut self) -> &mut AgentState {
        &mut *self.agent
    }

    /// Called once the outermost transaction commits.
    pub fn on_commit(&mut self, hook: impl FnMut(&AgentState) + 'a) {
        self.on_commit.push(Box::new(hook));
    }

    /// Called once the outermost transaction rolls back.
    pub fn on_rollback(&mut self, hook: impl FnMut(&AgentState) + 'a) {
        self.on_rollback.push(Box::new(hook));
    }

    /// Start a transaction, or a savepoint inside the current one.
    pub fn begin(&mut self) {
        if self.snapshots.is_empty() {
            self.started = Some(Instant::now());
        }
        self.snapshots.push(self.agent.ledgers().clone());
        tracing::debug!(agent_id = %self.agent.agent_id(), depth = self.depth(), "transaction begin");
    }

    /// Keep the changes made since the matching `begin()`.
    ///
    /// Past the configured timeout the top savepoint is rolled back instead
    /// and `TransactionError::Timeout` is returned.
    pub fn commit(&mut self) -> Result<(), TransactionError> {
        if self.snapshots.is_empty() {
            return Err(TransactionError::NotActive);
        }

        let elapsed_ms = self
            .started
            .map(|t| t.elapsed().as_millis() as u64)
            .unwrap_or_default();
        if elapsed_ms > self.config.timeout_ms {
            tracing::warn!(
                agent_id = %self.agent.agent_id(),
                elapsed_ms,
                limit_ms = self.config.timeout_ms,
                "transaction timed out, rolling back"
            );
            self.rollback()?;
            return Err(TransactionError::Timeout {
                elapsed_ms,
                limit_ms: self.config.timeout_ms,
            });
        }

        self.snapshots.pop();
        tracing::debug!(agent_id = %self.agent.agent_id(), depth = self.depth(), "transaction commit");
        if self.snapshots.is_empty() {
            self.started = None;
            for hook in &mut self.on_commit {
                hook(&*self.agent);
            }
        }
        Ok(())
    }

    /// Restore the ledgers captured by the most recent `begin()`.
    pub fn rollback(&mut self) -> Result<(), TransactionError> {
        let snapshot = self.snapshots.pop().ok_or(TransactionError::NotActive)?;
        self.agent.restore_ledgers(snapshot);
        tracing::debug!(agent_id = %self.agent.agent_id(), depth = self.depth(), "transaction rollback");
        if self.snapshots.is_empty() {
            self.finish_rollback();
        }
        Ok(())
    }

    /// Restore the ledgers captured by the outermost `begin()`, whatever the
    /// depth. Does nothing when idle.
    pub fn rollback_all(&mut self) {
        let first = self.snapshots.drain(..).next();
        let Some(first) = first else {
            return;
        };
        self.agent.restore_ledgers(first);
        tracing::debug!(agent_id = %self.agent.agent_id(), "transaction rollback_all");
        self.finish_rollback();
    }

    fn finish_rollback(&mut self) {
        self.started = None;
        for hook in &mut self.on_rollback {
            hook(&*self.agent);
        }
    }

    /// Run `f` inside a savepoint: commit on `Ok`, roll back on `Err`.
    pub fn run<T, E, F>(&mut self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut AgentState) -> Result<T, E>,
        E: From<TransactionError>,
    {
        self.begin();
        match f(&mut *self.agent) {
            Ok(value) => {
                self.commit()?;
                Ok(value)
            }
            Err(e) => {
                self.rollback()?;
                Err(e)
            }
        }
    }

    /// Lex, parse and interpret `source` inside a savepoint.
    pub fn execute(&mut self, source: &str) -> EngineResult<Vec<String>> {
        self.run(|agent| crate::run(source, agent))
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if self.is_active() {
            tracing::warn!(
                agent_id = %self.agent.agent_id(),
                depth = self.depth(),
                "transaction dropped while active, rolling back"
            );
            self.rollback_all();
        }
    }
}

/// All-or-nothing execution of `source` against `agent`.
///
/// Returns `(responses, true)` on success. On any failure the agent is left
/// exactly as it was and the single response is `[TX ROLLBACK] <error>`.
pub fn safe_execute(agent: &mut AgentState, source: &str) -> (Vec<String>, bool) {
    safe_execute_with(agent, source, &TransactionConfig::default())
}

/// `safe_execute` with an explicit transaction configuration.
pub fn safe_execute_with(
    agent: &mut AgentState,
    source: &str,
    config: &TransactionConfig,
) -> (Vec<String>, bool) {
    let mut tx = Transaction::with_config(agent, config.clone());
    match tx.execute(source) {
        Ok(responses) => (responses, true),
        Err(e) => {
            tracing::warn!(error = %e, "safe_execute rolled back");
            (vec![format!("[TX ROLLBACK] {}", e)], false)
        }
    }
}
