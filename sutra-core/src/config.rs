//! Configuration types

use crate::{ConfigError, Keyword};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ============================================================================
// SANDBOX LIMITS
// ============================================================================

/// Resource budget for one sandboxed run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxLimits {
    pub max_statements: usize,
    /// Soft wall-clock budget, checked after execution
    pub max_time_ms: u64,
    pub max_beliefs: usize,
    pub max_goals: usize,
    pub max_offers: usize,
    pub max_commits: usize,
    pub max_actions: usize,
    pub max_source_bytes: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_statements: 100,
            max_time_ms: 5000,
            max_beliefs: 500,
            max_goals: 100,
            max_offers: 50,
            max_commits: 50,
            max_actions: 100,
            max_source_bytes: 65536,
        }
    }
}

/// Process-wide OS resource ceilings applied around a sandboxed run.
///
/// These are global to the process. Enable them only where one sandboxed
/// call runs at a time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OsResourceLimits {
    pub enabled: bool,
    pub max_cpu_seconds: u64,
    pub max_memory_bytes: u64,
    /// 0 forbids file writes entirely
    pub max_file_size: u64,
    pub max_open_files: u64,
}

impl Default for OsResourceLimits {
    fn default() -> Self {
        Self {
            enabled: false,
            max_cpu_seconds: 5,
            max_memory_bytes: 64 * 1024 * 1024,
            max_file_size: 0,
            max_open_files: 16,
        }
    }
}

// ============================================================================
// CAPABILITIES
// ============================================================================

/// Which statement keywords a sandboxed program may use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", content = "keywords", rename_all = "snake_case")]
pub enum CapabilityPolicy {
    /// Every keyword is permitted
    #[default]
    AllowAll,
    /// Only the listed keywords are permitted
    Allow(BTreeSet<Keyword>),
    /// Every keyword except the listed ones is permitted
    Deny(BTreeSet<Keyword>),
}

impl CapabilityPolicy {
    pub fn allow<I: IntoIterator<Item = Keyword>>(keywords: I) -> Self {
        CapabilityPolicy::Allow(keywords.into_iter().collect())
    }

    pub fn deny<I: IntoIterator<Item = Keyword>>(keywords: I) -> Self {
        CapabilityPolicy::Deny(keywords.into_iter().collect())
    }

    /// Effective allow-set.
    pub fn allowed(&self) -> BTreeSet<Keyword> {
        match self {
            CapabilityPolicy::AllowAll => Keyword::ALL.into_iter().collect(),
            CapabilityPolicy::Allow(set) => set.clone(),
            CapabilityPolicy::Deny(set) => Keyword::ALL
                .into_iter()
                .filter(|k| !set.contains(k))
                .collect(),
        }
    }

    pub fn permits(&self, keyword: Keyword) -> bool {
        match self {
            CapabilityPolicy::AllowAll => true,
            CapabilityPolicy::Allow(set) => set.contains(&keyword),
            CapabilityPolicy::Deny(set) => !set.contains(&keyword),
        }
    }
}

// ============================================================================
// HARNESS CONFIGURATION
// ============================================================================

/// Sandbox configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SandboxConfig {
    /// Identity of the disposable agent each run executes against
    pub agent_id: String,
    pub capabilities: CapabilityPolicy,
    pub limits: SandboxLimits,
    pub os_limits: OsResourceLimits,
    /// Preemptive timeout; `None` runs on the calling thread
    pub hard_timeout_ms: Option<u64>,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            agent_id: "sandbox-agent".to_string(),
            capabilities: CapabilityPolicy::default(),
            limits: SandboxLimits::default(),
            os_limits: OsResourceLimits::default(),
            hard_timeout_ms: None,
        }
    }
}

/// Transaction manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// Maximum time from the outermost `begin()` to a successful `commit()`
    pub timeout_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

/// Top-level engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    pub sandbox: SandboxConfig,
    pub transaction: TransactionConfig,
}

fn require_positive(field: &str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: format!("{} must be greater than 0", field),
        });
    }
    Ok(())
}

impl SandboxConfig {
    /// Validate the configuration.
    ///
    /// Validates:
    /// - agent_id is non-empty
    /// - every statement/size/time limit is positive
    /// - OS limits are positive when enabled (max_file_size may be 0)
    /// - hard_timeout_ms, when set, is positive
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.agent_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sandbox.agent_id".to_string(),
                value: self.agent_id.clone(),
                reason: "agent_id must not be empty".to_string(),
            });
        }

        let l = &self.limits;
        require_positive("sandbox.limits.max_statements", l.max_statements as u64)?;
        require_positive("sandbox.limits.max_time_ms", l.max_time_ms)?;
        require_positive("sandbox.limits.max_beliefs", l.max_beliefs as u64)?;
        require_positive("sandbox.limits.max_goals", l.max_goals as u64)?;
        require_positive("sandbox.limits.max_offers", l.max_offers as u64)?;
        require_positive("sandbox.limits.max_commits", l.max_commits as u64)?;
        require_positive("sandbox.limits.max_actions", l.max_actions as u64)?;
        require_positive("sandbox.limits.max_source_bytes", l.max_source_bytes as u64)?;

        if self.os_limits.enabled {
            let os = &self.os_limits;
            require_positive("sandbox.os_limits.max_cpu_seconds", os.max_cpu_seconds)?;
            require_positive("sandbox.os_limits.max_memory_bytes", os.max_memory_bytes)?;
            require_positive("sandbox.os_limits.max_open_files", os.max_open_files)?;
        }

        if let Some(ms) = self.hard_timeout_ms {
            require_positive("sandbox.hard_timeout_ms", ms)?;
        }

        Ok(())
    }
}

impl TransactionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("transaction.timeout_ms", self.timeout_ms)
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.sandbox.validate()?;
        self.transaction.validate()
    }

    /// Parse and validate a TOML document. Omitted keys take their defaults.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: EngineConfig = toml::from_str(source).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sandbox.limits.max_statements, 100);
        assert_eq!(config.sandbox.os_limits.max_memory_bytes, 67_108_864);
        assert_eq!(config.transaction.timeout_ms, 30_000);
        assert!(!config.sandbox.os_limits.enabled);
    }

    #[test]
    fn test_policy_allowed_sets() {
        assert_eq!(CapabilityPolicy::AllowAll.allowed().len(), 8);

        let allow = CapabilityPolicy::allow([Keyword::Fact, Keyword::Query]);
        assert_eq!(allow.allowed().len(), 2);
        assert!(allow.permits(Keyword::Fact));
        assert!(!allow.permits(Keyword::Commit));

        let deny = CapabilityPolicy::deny([Keyword::Commit]);
        assert_eq!(deny.allowed().len(), 7);
        assert!(!deny.permits(Keyword::Commit));
        assert!(deny.permits(Keyword::Act));
    }

    #[test]
    fn test_zero_limit_rejected() {
        let mut config = SandboxConfig::default();
        config.limits.max_statements = 0;
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref field, .. } if field == "sandbox.limits.max_statements"
        ));
    }

    #[test]
    fn test_os_limits_only_checked_when_enabled() {
        let mut config = SandboxConfig::default();
        config.os_limits.max_open_files = 0;
        assert!(config.validate().is_ok());
        config.os_limits.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_agent_id_rejected() {
        let config = SandboxConfig {
            agent_id: "  ".to_string(),
            ..SandboxConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_partial_document() {
        let toml = r#"
            [sandbox]
            agent_id = "guest"
            hard_timeout_ms = 250

            [sandbox.capabilities]
            mode = "deny"
            keywords = ["commit", "OFFER"]

            [sandbox.limits]
            max_statements = 10

            [transaction]
            timeout_ms = 1000
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.sandbox.agent_id, "guest");
        assert_eq!(config.sandbox.hard_timeout_ms, Some(250));
        assert_eq!(config.sandbox.limits.max_statements, 10);
        assert_eq!(config.sandbox.limits.max_beliefs, 500);
        assert_eq!(
            config.sandbox.capabilities,
            CapabilityPolicy::deny([Keyword::Commit, Keyword::Offer])
        );
        assert_eq!(config.transaction.timeout_ms, 1000);
    }

    #[test]
    fn test_from_toml_rejects_unknown_keyword() {
        let toml = r#"
            [sandbox.capabilities]
            mode = "allow"
            keywords = ["DELETE"]
        "#;
        let err = EngineConfig::from_toml_str(toml).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_toml_validates() {
        let err = EngineConfig::from_toml_str("[transaction]\ntimeout_ms = 0\n").unwrap_err();
        assert!(err.to_string().contains("transaction.timeout_ms"));
    }
}
