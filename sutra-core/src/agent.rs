//! Agent state: the six ledgers a SUTRA program mutates.
//!
//! An `AgentState` is owned by exactly one logical agent. It has no internal
//! synchronization; hosts serving concurrent requests must serialize access
//! per agent id themselves.

use crate::{format_args, Args, Signature, Signer, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

// ============================================================================
// LEDGER RECORDS
// ============================================================================

/// A believed fact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fact {
    pub predicate: String,
    pub args: Args,
    pub timestamp: Timestamp,
}

/// A declared goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    pub predicate: String,
    pub args: Args,
    pub timestamp: Timestamp,
}

/// Lifecycle status of an offer. `Accepted` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfferStatus {
    #[default]
    Open,
    Accepted,
    Rejected,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Open => "open",
            OfferStatus::Accepted => "accepted",
            OfferStatus::Rejected => "rejected",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Open)
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offer {
    pub offer_id: String,
    pub from_agent: String,
    pub to_agent: String,
    pub fields: Args,
    #[serde(default)]
    pub status: OfferStatus,
    #[serde(default)]
    pub signature: Option<Signature>,
    pub timestamp: Timestamp,
}

impl Offer {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// A binding declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commitment {
    pub predicate: String,
    pub args: Args,
    #[serde(default)]
    pub deadline: Option<String>,
    #[serde(default)]
    pub signature: Option<Signature>,
    pub timestamp: Timestamp,
}

impl Commitment {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

/// A queued action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub predicate: String,
    pub args: Args,
    pub timestamp: Timestamp,
}

/// Audit log event tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LogEvent {
    Fact,
    Intent,
    Offer,
    Accept,
    AcceptFail,
    Reject,
    RejectFail,
    Commit,
    Act,
}

impl LogEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogEvent::Fact => "FACT",
            LogEvent::Intent => "INTENT",
            LogEvent::Offer => "OFFER",
            LogEvent::Accept => "ACCEPT",
            LogEvent::AcceptFail => "ACCEPT_FAIL",
            LogEvent::Reject => "REJECT",
            LogEvent::RejectFail => "REJECT_FAIL",
            LogEvent::Commit => "COMMIT",
            LogEvent::Act => "ACT",
        }
    }
}

impl fmt::Display for LogEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub event: LogEvent,
    pub detail: String,
    pub timestamp: Timestamp,
}

// ----------------------------------------------------------------------------
// Surface-form display
// ----------------------------------------------------------------------------

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FACT {}({})", self.predicate, format_args(&self.args))
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INTENT {}({})", self.predicate, format_args(&self.args))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ACT {}({})", self.predicate, format_args(&self.args))
    }
}

impl fmt::Display for Offer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OFFER id=\"{}\" [{}] → {}",
            self.offer_id, self.status, self.to_agent
        )?;
        if self.is_signed() {
            write!(f, " (signed)")?;
        }
        Ok(())
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "COMMIT {}({})", self.predicate, format_args(&self.args))?;
        if let Some(deadline) = &self.deadline {
            write!(f, " BY \"{}\"", deadline)?;
        }
        if self.is_signed() {
            write!(f, " (signed)")?;
        }
        Ok(())
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.event, self.detail)
    }
}

// ============================================================================
// LEDGERS
// ============================================================================

/// The six ledgers owned by an agent.
///
/// Cloning produces an independent structural copy; transactions snapshot
/// state this way and restore it verbatim on rollback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ledgers {
    pub belief_base: Vec<Fact>,
    pub goal_set: Vec<Intent>,
    pub offer_ledger: BTreeMap<String, Offer>,
    pub commit_ledger: Vec<Commitment>,
    pub action_queue: Vec<Action>,
    pub message_log: Vec<LogEntry>,
}

impl Ledgers {
    pub fn sizes(&self) -> LedgerSizes {
        LedgerSizes {
            beliefs: self.belief_base.len(),
            goals: self.goal_set.len(),
            offers: self.offer_ledger.len(),
            commitments: self.commit_ledger.len(),
            actions: self.action_queue.len(),
            log_entries: self.message_log.len(),
        }
    }
}

/// Record counts per ledger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSizes {
    pub beliefs: usize,
    pub goals: usize,
    pub offers: usize,
    pub commitments: usize,
    pub actions: usize,
    pub log_entries: usize,
}

// ============================================================================
// AGENT STATE
// ============================================================================

/// Runtime state of one SUTRA agent.
#[derive(Clone)]
pub struct AgentState {
    agent_id: String,
    ledgers: Ledgers,
    signer: Option<Arc<dyn Signer>>,
}

impl fmt::Debug for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentState")
            .field("agent_id", &self.agent_id)
            .field("ledgers", &self.ledgers)
            .field("signer", &self.signer.as_ref().map(|s| s.signer_id().to_string()))
            .finish()
    }
}

impl AgentState {
    /// Create an empty agent without signing capability.
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            ledgers: Ledgers::default(),
            signer: None,
        }
    }

    /// Create an empty agent that signs OFFER and COMMIT records.
    pub fn with_signer(agent_id: impl Into<String>, signer: Arc<dyn Signer>) -> Self {
        Self {
            signer: Some(signer),
            ..Self::new(agent_id)
        }
    }

    /// Rebuild an agent from previously captured ledgers.
    pub fn from_ledgers(
        agent_id: impl Into<String>,
        ledgers: Ledgers,
        signer: Option<Arc<dyn Signer>>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            ledgers,
            signer,
        }
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn signer(&self) -> Option<&dyn Signer> {
        self.signer.as_deref()
    }

    pub fn set_signer(&mut self, signer: Option<Arc<dyn Signer>>) {
        self.signer = signer;
    }

    pub fn ledgers(&self) -> &Ledgers {
        &self.ledgers
    }

    /// Replace all six ledgers at once.
    pub fn restore_ledgers(&mut self, ledgers: Ledgers) {
        self.ledgers = ledgers;
    }

    pub fn beliefs(&self) -> &[Fact] {
        &self.ledgers.belief_base
    }

    pub fn goals(&self) -> &[Intent] {
        &self.ledgers.goal_set
    }

    pub fn offers(&self) -> &BTreeMap<String, Offer> {
        &self.ledgers.offer_ledger
    }

    pub fn offer(&self, offer_id: &str) -> Option<&Offer> {
        self.ledgers.offer_ledger.get(offer_id)
    }

    pub fn commitments(&self) -> &[Commitment] {
        &self.ledgers.commit_ledger
    }

    pub fn actions(&self) -> &[Action] {
        &self.ledgers.action_queue
    }

    pub fn log(&self) -> &[LogEntry] {
        &self.ledgers.message_log
    }

    pub fn sizes(&self) -> LedgerSizes {
        self.ledgers.sizes()
    }

    fn record(&mut self, event: LogEvent, detail: String) {
        tracing::debug!(agent_id = %self.agent_id, event = %event, "ledger mutation");
        self.ledgers.message_log.push(LogEntry {
            event,
            detail,
            timestamp: Utc::now(),
        });
    }

    // ------------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------------

    pub fn add_fact(&mut self, predicate: impl Into<String>, args: Args) {
        let fact = Fact {
            predicate: predicate.into(),
            args,
            timestamp: Utc::now(),
        };
        let detail = fact.to_string();
        self.ledgers.belief_base.push(fact);
        self.record(LogEvent::Fact, detail);
    }

    pub fn add_intent(&mut self, predicate: impl Into<String>, args: Args) {
        let intent = Intent {
            predicate: predicate.into(),
            args,
            timestamp: Utc::now(),
        };
        let detail = intent.to_string();
        self.ledgers.goal_set.push(intent);
        self.record(LogEvent::Intent, detail);
    }

    /// Insert an open offer. An existing offer with the same id is replaced.
    pub fn add_offer(
        &mut self,
        offer_id: impl Into<String>,
        from_agent: impl Into<String>,
        to_agent: impl Into<String>,
        fields: Args,
        signature: Option<Signature>,
    ) {
        let offer = Offer {
            offer_id: offer_id.into(),
            from_agent: from_agent.into(),
            to_agent: to_agent.into(),
            fields,
            status: OfferStatus::Open,
            signature,
            timestamp: Utc::now(),
        };
        let detail = offer.to_string();
        self.ledgers.offer_ledger.insert(offer.offer_id.clone(), offer);
        self.record(LogEvent::Offer, detail);
    }

    /// Accept an open offer. Returns `false` (and logs the failure) when the
    /// offer is missing or already settled.
    pub fn accept_offer(&mut self, offer_id: &str) -> bool {
        if !self.is_open(offer_id) {
            self.record(
                LogEvent::AcceptFail,
                format!("Offer \"{}\" not found or not open", offer_id),
            );
            return false;
        }
        if let Some(offer) = self.ledgers.offer_ledger.get_mut(offer_id) {
            offer.status = OfferStatus::Accepted;
        }
        self.record(LogEvent::Accept, format!("Offer \"{}\" accepted", offer_id));
        true
    }

    /// Reject an open offer. Same failure contract as `accept_offer`.
    pub fn reject_offer(&mut self, offer_id: &str, reason: Option<&str>) -> bool {
        if !self.is_open(offer_id) {
            self.record(
                LogEvent::RejectFail,
                format!("Offer \"{}\" not found or not open", offer_id),
            );
            return false;
        }
        if let Some(offer) = self.ledgers.offer_ledger.get_mut(offer_id) {
            offer.status = OfferStatus::Rejected;
        }
        let detail = match reason {
            Some(r) if !r.is_empty() => format!("Offer \"{}\" rejected: {}", offer_id, r),
            _ => format!("Offer \"{}\" rejected", offer_id),
        };
        self.record(LogEvent::Reject, detail);
        true
    }

    fn is_open(&self, offer_id: &str) -> bool {
        self.offer(offer_id)
            .is_some_and(|o| o.status == OfferStatus::Open)
    }

    pub fn add_commit(
        &mut self,
        predicate: impl Into<String>,
        args: Args,
        deadline: Option<String>,
        signature: Option<Signature>,
    ) {
        let commitment = Commitment {
            predicate: predicate.into(),
            args,
            deadline,
            signature,
            timestamp: Utc::now(),
        };
        let detail = commitment.to_string();
        self.ledgers.commit_ledger.push(commitment);
        self.record(LogEvent::Commit, detail);
    }

    pub fn add_action(&mut self, predicate: impl Into<String>, args: Args) {
        let action = Action {
            predicate: predicate.into(),
            args,
            timestamp: Utc::now(),
        };
        let detail = action.to_string();
        self.ledgers.action_queue.push(action);
        self.record(LogEvent::Act, detail);
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Facts named `predicate` that agree with `query` on every key both
    /// carry. A query key missing from the fact does not exclude it.
    pub fn query_facts(&self, predicate: &str, query: &Args) -> Vec<&Fact> {
        self.ledgers
            .belief_base
            .iter()
            .filter(|fact| fact.predicate == predicate)
            .filter(|fact| {
                query
                    .iter()
                    .all(|(k, v)| fact.args.get(k).map_or(true, |actual| actual == v))
            })
            .collect()
    }

    /// Multi-line human-readable state report.
    pub fn summary(&self) -> String {
        let l = &self.ledgers;
        let mut lines = vec![
            format!("=== Agent: {} ===", self.agent_id),
            format!("Beliefs ({}):", l.belief_base.len()),
        ];
        lines.extend(l.belief_base.iter().map(|f| format!("  - {}", f)));
        lines.push(format!("Goals ({}):", l.goal_set.len()));
        lines.extend(l.goal_set.iter().map(|g| format!("  - {}", g)));
        lines.push(format!("Offers ({}):", l.offer_ledger.len()));
        lines.extend(l.offer_ledger.values().map(|o| format!("  - {}", o)));
        let signed = l.commit_ledger.iter().filter(|c| c.is_signed()).count();
        lines.push(format!(
            "Commitments ({}, {} signed):",
            l.commit_ledger.len(),
            signed
        ));
        lines.extend(l.commit_ledger.iter().map(|c| format!("  - {}", c)));
        lines.push(format!("Actions ({}):", l.action_queue.len()));
        lines.extend(l.action_queue.iter().map(|a| format!("  - {}", a)));
        lines.push(format!("Log ({} entries)", l.message_log.len()));
        lines.join("\n")
    }
}
