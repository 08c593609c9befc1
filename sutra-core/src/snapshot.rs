//! Persistence format for agent state.
//!
//! A snapshot is a flat, field-named record of the six ledgers. Storage
//! (files, databases) is the host's concern; this module only converts.

use crate::{AgentState, Ledgers, Signer, SnapshotError, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Format version written into new snapshots.
pub const SNAPSHOT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Serializable image of an agent's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSnapshot {
    pub agent_id: String,
    pub version: String,
    pub saved_at: Timestamp,
    #[serde(flatten)]
    pub ledgers: Ledgers,
}

impl AgentSnapshot {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        serde_json::to_string_pretty(self).map_err(|e| SnapshotError::Serialize {
            agent_id: self.agent_id.clone(),
            reason: e.to_string(),
        })
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        serde_json::from_str(json).map_err(|e| SnapshotError::Deserialize {
            reason: e.to_string(),
        })
    }
}

impl AgentState {
    /// Capture the current ledgers.
    pub fn snapshot(&self) -> AgentSnapshot {
        AgentSnapshot {
            agent_id: self.agent_id().to_string(),
            version: SNAPSHOT_VERSION.to_string(),
            saved_at: Utc::now(),
            ledgers: self.ledgers().clone(),
        }
    }

    /// Rebuild an agent from a snapshot. Key material is never persisted, so
    /// the signer is supplied by the caller.
    pub fn from_snapshot(snapshot: AgentSnapshot, signer: Option<Arc<dyn Signer>>) -> Self {
        AgentState::from_ledgers(snapshot.agent_id, snapshot.ledgers, signer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Args, Ed25519Signer, Value};

    fn populated() -> AgentState {
        let signer = Arc::new(Ed25519Signer::from_secret_bytes("alice", &[3u8; 32]));
        let mut agent = AgentState::with_signer("alice", signer.clone());
        let mut args = Args::new();
        args.insert("item".into(), Value::from("TV"));
        args.insert("tags".into(), Value::List(vec![Value::Bool(true), Value::Null]));
        agent.add_fact("available", args.clone());
        agent.add_intent("buy", args.clone());
        agent.add_offer("o1", "alice", "bob", args.clone(), None);
        agent.accept_offer("o1");
        let content = crate::commitment_content("deliver", &args, "alice", Some("friday"));
        let sig = signer.sign(&content).ok();
        agent.add_commit("deliver", args.clone(), Some("friday".into()), sig);
        agent.add_action("ship", args);
        agent
    }

    #[test]
    fn test_json_round_trip_preserves_ledgers() {
        let agent = populated();
        let json = agent.snapshot().to_json().unwrap();
        let back = AgentSnapshot::from_json(&json).unwrap();
        let restored = AgentState::from_snapshot(back, None);

        assert_eq!(restored.agent_id(), "alice");
        assert_eq!(restored.ledgers(), agent.ledgers());
    }

    #[test]
    fn test_snapshot_is_flat_and_field_named() {
        let json = populated().snapshot().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        for field in [
            "agent_id",
            "version",
            "saved_at",
            "belief_base",
            "goal_set",
            "offer_ledger",
            "commit_ledger",
            "action_queue",
            "message_log",
        ] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
        assert_eq!(value["offer_ledger"]["o1"]["status"], "accepted");
    }

    #[test]
    fn test_restored_signature_still_verifies() {
        let agent = populated();
        let json = agent.snapshot().to_json().unwrap();
        let restored = AgentState::from_snapshot(AgentSnapshot::from_json(&json).unwrap(), None);
        let signer = Ed25519Signer::from_secret_bytes("alice", &[3u8; 32]);
        assert!(crate::verify_commitment(&signer, "alice", &restored.commitments()[0]));
    }

    #[test]
    fn test_awkward_floats_survive_restore() {
        let signer = Arc::new(Ed25519Signer::from_secret_bytes("alice", &[3u8; 32]));
        let mut agent = AgentState::with_signer("alice", signer.clone());
        for n in [123456789.123456789, 1.7976931348623157e308, 0.1, 5e-324] {
            let mut args = Args::new();
            args.insert("n".into(), Value::Number(n));
            agent.add_fact("p", args.clone());
            let content = crate::commitment_content("pay", &args, "alice", None);
            agent.add_commit("pay", args, None, signer.sign(&content).ok());
        }

        let json = agent.snapshot().to_json().unwrap();
        let restored = AgentState::from_snapshot(AgentSnapshot::from_json(&json).unwrap(), None);
        assert_eq!(restored.ledgers(), agent.ledgers());
        for commitment in restored.commitments() {
            assert!(crate::verify_commitment(signer.as_ref(), "alice", commitment));
        }
    }

    #[test]
    fn test_missing_ledgers_default_to_empty() {
        let json = r#"{"agent_id":"bob","version":"0.1.0","saved_at":"2025-01-01T00:00:00Z"}"#;
        let snapshot = AgentSnapshot::from_json(json).unwrap();
        assert_eq!(snapshot.ledgers, Ledgers::default());
    }

    #[test]
    fn test_malformed_json_is_an_error() {
        let err = AgentSnapshot::from_json("{not json").unwrap_err();
        assert!(matches!(err, SnapshotError::Deserialize { .. }));
    }
}
