//! Sandbox audit trail.

use chrono::Utc;
use std::fmt;
use sutra_core::Timestamp;

/// Kind of sandbox decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditEvent {
    Info,
    Allowed,
    Blocked,
    Error,
}

impl AuditEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditEvent::Info => "INFO",
            AuditEvent::Allowed => "ALLOWED",
            AuditEvent::Blocked => "BLOCKED",
            AuditEvent::Error => "ERROR",
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One recorded sandbox decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub event: AuditEvent,
    pub detail: String,
    pub timestamp: Timestamp,
}

impl fmt::Display for AuditEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.event, self.detail)
    }
}

/// Decisions and violations of a single sandbox run, in the order made.
#[derive(Debug, Default)]
pub(crate) struct AuditTrail {
    entries: Vec<AuditEntry>,
    violations: Vec<String>,
}

impl AuditTrail {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn log(&mut self, event: AuditEvent, detail: impl Into<String>) {
        self.entries.push(AuditEntry {
            event,
            detail: detail.into(),
            timestamp: Utc::now(),
        });
    }

    pub(crate) fn info(&mut self, detail: impl Into<String>) {
        self.log(AuditEvent::Info, detail);
    }

    pub(crate) fn allowed(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::debug!(detail = %detail, "sandbox allowed");
        self.log(AuditEvent::Allowed, detail);
    }

    /// Record a limit or capability violation.
    pub(crate) fn violate(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(violation = %detail, "sandbox violation");
        self.violations.push(detail.clone());
        self.log(AuditEvent::Blocked, detail);
    }

    /// Record a failure that ends the run (front-end or runtime error).
    pub(crate) fn fail(&mut self, detail: impl Into<String>) {
        let detail = detail.into();
        tracing::warn!(error = %detail, "sandbox run failed");
        self.violations.push(detail.clone());
        self.log(AuditEvent::Error, detail);
    }

    pub(crate) fn violation_count(&self) -> usize {
        self.violations.len()
    }

    pub(crate) fn into_parts(self) -> (Vec<AuditEntry>, Vec<String>) {
        (self.entries, self.violations)
    }
}
