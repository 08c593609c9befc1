//! Signing capability for OFFER and COMMIT records.
//!
//! The core never owns key material. An agent may carry a `Signer`; when it
//! does, the interpreter builds a `CanonicalContent` record for each OFFER and
//! COMMIT and stores the returned `Signature` next to the ledger entry.
//!
//! ```text
//! statement ──► canonical content ──► SHA-256 (hex) ──► sign(hash) ──► Signature
//!                      ▲                                                   │
//!                      └──────────── verify: recompute hash, compare ◄─────┘
//! ```

use crate::{sha256_hex, Args, Commitment, Offer, SignerError, Timestamp, Value};
use chrono::Utc;
use ed25519_dalek::Signer as _;
use ed25519_dalek::{SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Algorithm name recorded in Ed25519 signatures.
pub const ED25519: &str = "ed25519";

// ============================================================================
// SIGNATURE
// ============================================================================

/// A signature over canonical content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    /// Agent that produced the signature
    pub signer: String,
    /// Hex SHA-256 of the canonical content
    pub content_hash: String,
    /// Hex-encoded signature bytes
    #[serde(rename = "signature")]
    pub signature_hex: String,
    pub algorithm: String,
    /// Hex-encoded public key of the signer
    #[serde(rename = "public_key")]
    pub public_key_hex: String,
    pub timestamp: Timestamp,
}

impl Signature {
    /// First twelve hex characters of the signature, for display.
    pub fn short(&self) -> &str {
        let end = self.signature_hex.len().min(12);
        &self.signature_hex[..end]
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sig({}, {}, {}...)", self.signer, self.algorithm, self.short())
    }
}

// ============================================================================
// CANONICAL CONTENT
// ============================================================================

/// Content to be signed. Keys are kept sorted so that logically equal content
/// always serializes, and therefore hashes, identically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalContent(BTreeMap<String, Value>);

impl CanonicalContent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Compact JSON with sorted keys.
    pub fn to_canonical_json(&self) -> Result<String, SignerError> {
        serde_json::to_string(&self.0).map_err(|e| SignerError::Canonicalization {
            reason: e.to_string(),
        })
    }

    /// Hex SHA-256 of the canonical JSON.
    pub fn content_hash(&self) -> Result<String, SignerError> {
        let json = self.to_canonical_json()?;
        Ok(sha256_hex(json.as_bytes()))
    }
}

/// Canonical content of a COMMIT statement.
pub fn commitment_content(
    predicate: &str,
    args: &Args,
    agent_id: &str,
    deadline: Option<&str>,
) -> CanonicalContent {
    let content = CanonicalContent::new()
        .with("type", "COMMIT")
        .with("agent", agent_id)
        .with("predicate", predicate)
        .with("args", Value::Map(args.clone()));
    match deadline {
        Some(d) => content.with("deadline", d),
        None => content,
    }
}

/// Canonical content of an OFFER statement.
pub fn offer_content(
    offer_id: &str,
    from_agent: &str,
    to_agent: &str,
    fields: &Args,
) -> CanonicalContent {
    CanonicalContent::new()
        .with("type", "OFFER")
        .with("offer_id", offer_id)
        .with("from", from_agent)
        .with("to", to_agent)
        .with("fields", Value::Map(fields.clone()))
}

// ============================================================================
// SIGNER CAPABILITY
// ============================================================================

/// External signing capability carried by an agent.
///
/// Implementations must be shareable across threads: sandboxed programs run
/// on a worker thread when a hard timeout is configured.
pub trait Signer: Send + Sync {
    /// Identity recorded as `Signature::signer`.
    fn signer_id(&self) -> &str;

    /// Sign canonical content.
    fn sign(&self, content: &CanonicalContent) -> Result<Signature, SignerError>;

    /// Verify a signature against content. The content hash is recomputed and
    /// compared before the cryptographic check.
    fn verify(&self, signature: &Signature, content: &CanonicalContent) -> bool;
}

/// Verify a stored offer's signature against its recorded fields.
pub fn verify_offer(signer: &dyn Signer, offer: &Offer) -> bool {
    match &offer.signature {
        Some(sig) => {
            let content = offer_content(
                &offer.offer_id,
                &offer.from_agent,
                &offer.to_agent,
                &offer.fields,
            );
            signer.verify(sig, &content)
        }
        None => false,
    }
}

/// Verify a stored commitment's signature. `agent_id` is the agent whose
/// ledger holds the commitment.
pub fn verify_commitment(signer: &dyn Signer, agent_id: &str, commitment: &Commitment) -> bool {
    match &commitment.signature {
        Some(sig) => {
            let content = commitment_content(
                &commitment.predicate,
                &commitment.args,
                agent_id,
                commitment.deadline.as_deref(),
            );
            signer.verify(sig, &content)
        }
        None => false,
    }
}

// ============================================================================
// ED25519 SIGNER
// ============================================================================

/// Ed25519 signer over caller-supplied secret key bytes.
pub struct Ed25519Signer {
    agent_id: String,
    signing_key: SigningKey,
}

impl Ed25519Signer {
    /// Build a signer from a 32-byte secret key.
    pub fn from_secret_bytes(agent_id: impl Into<String>, secret: &[u8; 32]) -> Self {
        Self {
            agent_id: agent_id.into(),
            signing_key: SigningKey::from_bytes(secret),
        }
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.signing_key.verifying_key().to_bytes())
    }

    /// Short fingerprint: first 16 hex chars of SHA-256(public key).
    pub fn fingerprint(&self) -> String {
        let digest = sha256_hex(&self.signing_key.verifying_key().to_bytes());
        digest[..16].to_string()
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ed25519Signer")
            .field("agent_id", &self.agent_id)
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

impl Signer for Ed25519Signer {
    fn signer_id(&self) -> &str {
        &self.agent_id
    }

    fn sign(&self, content: &CanonicalContent) -> Result<Signature, SignerError> {
        let hash = content.content_hash()?;
        let sig = self
            .signing_key
            .try_sign(hash.as_bytes())
            .map_err(|e| SignerError::SigningFailed {
                signer: self.agent_id.clone(),
                reason: e.to_string(),
            })?;

        Ok(Signature {
            signer: self.agent_id.clone(),
            content_hash: hash,
            signature_hex: hex::encode(sig.to_bytes()),
            algorithm: ED25519.to_string(),
            public_key_hex: self.public_key_hex(),
            timestamp: Utc::now(),
        })
    }

    fn verify(&self, signature: &Signature, content: &CanonicalContent) -> bool {
        verify_ed25519(signature, content)
    }
}

/// Verify an Ed25519 signature using the public key embedded in it.
pub fn verify_ed25519(signature: &Signature, content: &CanonicalContent) -> bool {
    if signature.algorithm != ED25519 {
        return false;
    }
    let hash = match content.content_hash() {
        Ok(h) => h,
        Err(_) => return false,
    };
    if hash != signature.content_hash {
        return false;
    }

    let key_bytes: [u8; 32] = match hex::decode(&signature.public_key_hex)
        .ok()
        .and_then(|b| b.try_into().ok())
    {
        Some(b) => b,
        None => return false,
    };
    let sig_bytes: [u8; 64] = match hex::decode(&signature.signature_hex)
        .ok()
        .and_then(|b| b.try_into().ok())
    {
        Some(b) => b,
        None => return false,
    };

    let verifying_key = match VerifyingKey::from_bytes(&key_bytes) {
        Ok(k) => k,
        Err(_) => return false,
    };
    let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
    verifying_key.verify(hash.as_bytes(), &sig).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signer() -> Ed25519Signer {
        Ed25519Signer::from_secret_bytes("alice", &[7u8; 32])
    }

    fn args() -> Args {
        let mut args = Args::new();
        args.insert("item".to_string(), Value::from("TV"));
        args.insert("price".to_string(), Value::from(100i64));
        args
    }

    #[test]
    fn test_canonical_json_is_sorted_and_compact() {
        let content = CanonicalContent::new().with("z", 1i64).with("a", "x");
        assert_eq!(content.to_canonical_json().unwrap(), r#"{"a":"x","z":1.0}"#);
    }

    #[test]
    fn test_content_hash_independent_of_insertion_order() {
        let a = CanonicalContent::new().with("x", 1i64).with("y", "two");
        let b = CanonicalContent::new().with("y", "two").with("x", 1i64);
        assert_eq!(a.content_hash().unwrap(), b.content_hash().unwrap());
    }

    #[test]
    fn test_commitment_content_includes_deadline_only_when_present() {
        let with = commitment_content("deliver", &args(), "alice", Some("2025-01-01"));
        let without = commitment_content("deliver", &args(), "alice", None);
        assert_eq!(with.get("deadline"), Some(&Value::from("2025-01-01")));
        assert!(without.get("deadline").is_none());
        assert_eq!(with.get("type"), Some(&Value::from("COMMIT")));
    }

    #[test]
    fn test_sign_and_verify() {
        let signer = signer();
        let content = offer_content("o1", "alice", "bob", &args());
        let sig = signer.sign(&content).unwrap();

        assert_eq!(sig.signer, "alice");
        assert_eq!(sig.algorithm, ED25519);
        assert_eq!(sig.public_key_hex, signer.public_key_hex());
        assert!(signer.verify(&sig, &content));
    }

    #[test]
    fn test_tampered_content_fails() {
        let signer = signer();
        let content = offer_content("o1", "alice", "bob", &args());
        let sig = signer.sign(&content).unwrap();

        let tampered = offer_content("o1", "alice", "mallory", &args());
        assert!(!signer.verify(&sig, &tampered));
    }

    #[test]
    fn test_forged_hash_fails_signature_check() {
        let signer = signer();
        let content = offer_content("o1", "alice", "bob", &args());
        let tampered = offer_content("o1", "alice", "mallory", &args());
        let mut sig = signer.sign(&content).unwrap();
        // Hash matches the tampered content, but the signature does not.
        sig.content_hash = tampered.content_hash().unwrap();
        assert!(!verify_ed25519(&sig, &tampered));
    }

    #[test]
    fn test_wrong_key_fails() {
        let alice = signer();
        let mallory = Ed25519Signer::from_secret_bytes("mallory", &[9u8; 32]);
        let content = commitment_content("pay", &args(), "alice", None);
        let sig = alice.sign(&content).unwrap();

        let forged = Signature {
            public_key_hex: mallory.public_key_hex(),
            ..sig
        };
        assert!(!verify_ed25519(&forged, &content));
    }

    #[test]
    fn test_malformed_hex_fails() {
        let signer = signer();
        let content = commitment_content("pay", &args(), "alice", None);
        let mut sig = signer.sign(&content).unwrap();
        sig.signature_hex = "zz".to_string();
        assert!(!verify_ed25519(&sig, &content));
    }

    #[test]
    fn test_signature_serde_field_names() {
        let signer = signer();
        let sig = signer
            .sign(&CanonicalContent::new().with("type", "COMMIT"))
            .unwrap();
        let json = serde_json::to_value(&sig).unwrap();
        for field in ["signer", "content_hash", "signature", "algorithm", "public_key", "timestamp"] {
            assert!(json.get(field).is_some(), "missing field {}", field);
        }
    }

    #[test]
    fn test_fingerprint_is_stable() {
        assert_eq!(signer().fingerprint(), signer().fingerprint());
        assert_eq!(signer().fingerprint().len(), 16);
    }
}
