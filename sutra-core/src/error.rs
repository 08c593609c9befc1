//! Error types for SUTRA core operations

use thiserror::Error;

/// Signing capability errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignerError {
    #[error("Signing failed for {signer}: {reason}")]
    SigningFailed { signer: String, reason: String },

    #[error("Content could not be canonicalized: {reason}")]
    Canonicalization { reason: String },
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration could not be parsed: {reason}")]
    Parse { reason: String },
}

/// Agent snapshot (de)serialization errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("Snapshot of {agent_id} could not be serialized: {reason}")]
    Serialize { agent_id: String, reason: String },

    #[error("Snapshot could not be deserialized: {reason}")]
    Deserialize { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signer_error_display() {
        let err = SignerError::SigningFailed {
            signer: "alice".to_string(),
            reason: "key revoked".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("alice"));
        assert!(msg.contains("key revoked"));
    }

    #[test]
    fn test_config_error_display_invalid_value() {
        let err = ConfigError::InvalidValue {
            field: "limits.max_statements".to_string(),
            value: "0".to_string(),
            reason: "must be positive".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("limits.max_statements"));
        assert!(msg.contains("must be positive"));
    }

    #[test]
    fn test_snapshot_error_display() {
        let err = SnapshotError::Deserialize {
            reason: "missing field `agent_id`".to_string(),
        };
        assert!(format!("{}", err).contains("agent_id"));
    }
}
