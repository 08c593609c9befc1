//! SUTRA Core - Values, Agent State, Signing
//!
//! Data types shared by every other SUTRA crate:
//! - runtime `Value`s produced by resolving literal syntax
//! - the six-ledger `AgentState` that programs mutate
//! - the `Signer` capability used to attest OFFER and COMMIT records
//! - engine configuration and error types
//!
//! This crate performs no I/O. Hosting collaborators (transport, persistence,
//! key storage) consume it through the types re-exported here.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

pub mod agent;
pub mod config;
pub mod error;
pub mod keyword;
pub mod signing;
pub mod snapshot;
pub mod value;

pub use agent::*;
pub use config::*;
pub use error::*;
pub use keyword::*;
pub use signing::*;
pub use snapshot::*;
pub use value::*;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Identifier of a logical agent (free-form, e.g. `buyer@home`).
pub type AgentId = String;

/// Compute the hex-encoded SHA-256 digest of `content`.
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_hex_is_lowercase_and_64_chars() {
        let digest = sha256_hex(b"");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }
}
