//! Configuration loading for Turnstile.
//!
//! Rules are described in YAML, keyed by name. Built-in rules (`default`,
//! `api`, `admin`) may be overridden and arbitrary custom rules added, e.g.
//! per tenant:
//!
//! ```yaml
//! enabled: true
//! rules:
//!   default:
//!     capacity: 100
//!     tokens: 100
//!     period_secs: 60
//!   tenant-acme:
//!     capacity: 5000
//!     tokens: 5000
//!     period_secs: 60
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::error::{Result, TurnstileError};
use crate::ratelimit::{Rule, RuleSet};

/// Top-level limiter configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Whether rate limiting is enabled at all. When false, callers should
    /// bypass the limiter entirely.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Named rule definitions, merged over the built-in rules.
    #[serde(default)]
    pub rules: HashMap<String, RuleConfig>,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            rules: HashMap::new(),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// A single rule as it appears in configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RuleConfig {
    /// Maximum tokens the bucket can hold
    pub capacity: u64,
    /// Tokens added back per period
    pub tokens: u64,
    /// Refill period in whole seconds
    pub period_secs: u64,
}

impl LimiterConfig {
    /// Load configuration from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading rate limit configuration");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load configuration from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml)
            .map_err(|e| TurnstileError::Config(format!("Failed to parse rate limit config: {}", e)))
    }

    /// Build the rule set: built-in rules merged with the configured
    /// entries, every configured rule validated fail-fast.
    pub fn rule_set(&self) -> Result<RuleSet> {
        let mut rules = RuleSet::default();

        for (name, rule) in &self.rules {
            let rule = Rule::new(rule.capacity, rule.tokens, rule.period_secs).map_err(|e| {
                TurnstileError::Config(format!("Rule '{}' is invalid: {}", name, e))
            })?;
            rules.insert(name.clone(), rule);
        }

        Ok(rules)
    }
}
