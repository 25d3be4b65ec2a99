//! Rate limit rules and rule resolution.
//!
//! A [`Rule`] describes the capacity and refill schedule applied to one or
//! more keys. A [`RuleSet`] maps rule names to rules and always carries a
//! `"default"` entry used as the fallback for unmatched keys.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::error::{Result, TurnstileError};

/// The rule name every lookup falls back to.
pub const DEFAULT_RULE: &str = "default";

/// An immutable rate limit rule.
///
/// `capacity` is the maximum number of tokens a bucket can hold,
/// `refill_tokens` the number of tokens added per refill period, and
/// `period` the length of that refill period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Maximum tokens the bucket can hold
    pub capacity: u64,
    /// Tokens added back per period
    pub refill_tokens: u64,
    /// Refill period
    #[serde(with = "period_secs")]
    pub period: Duration,
}

impl Rule {
    /// Create a rule, validating its parameters.
    ///
    /// Fails fast on non-positive capacity, refill amount, or period so that
    /// misconfiguration surfaces at construction time, never at request time.
    pub fn new(capacity: u64, refill_tokens: u64, period_secs: u64) -> Result<Self> {
        let rule = Self {
            capacity,
            refill_tokens,
            period: Duration::from_secs(period_secs),
        };
        rule.validate()?;
        Ok(rule)
    }

    /// Validate an already-constructed rule (e.g. one deserialized from
    /// configuration).
    pub fn validate(&self) -> Result<()> {
        if self.capacity == 0 {
            return Err(TurnstileError::InvalidRule(
                "capacity must be greater than zero".into(),
            ));
        }
        if self.refill_tokens == 0 {
            return Err(TurnstileError::InvalidRule(
                "refill_tokens must be greater than zero".into(),
            ));
        }
        if self.period.is_zero() {
            return Err(TurnstileError::InvalidRule(
                "period must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Serialize the refill period as whole seconds, matching the configuration
/// surface (durations are specified in seconds, converted internally).
mod period_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(period: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(period.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

/// A named collection of rate limit rules.
///
/// Ships with three built-in rules (`default`, `api`, `admin`); custom rules
/// may be added at configuration time under arbitrary names, e.g. a tenant
/// identifier. Lookup falls back to `default` when no exact match exists.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: HashMap<String, Rule>,
}

impl Default for RuleSet {
    fn default() -> Self {
        let mut rules = HashMap::new();
        // Built-in rules: 100, 1000, and 10000 requests per minute.
        rules.insert(DEFAULT_RULE.to_string(), builtin(100));
        rules.insert("api".to_string(), builtin(1000));
        rules.insert("admin".to_string(), builtin(10000));
        Self { rules }
    }
}

fn builtin(capacity: u64) -> Rule {
    Rule {
        capacity,
        refill_tokens: capacity,
        period: Duration::from_secs(60),
    }
}

impl RuleSet {
    /// Create a rule set containing only the built-in rules.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a rule under the given name.
    pub fn insert(&mut self, name: impl Into<String>, rule: Rule) {
        self.rules.insert(name.into(), rule);
    }

    /// Resolve the rule for a key, falling back to `default`.
    pub fn rule_for(&self, key: &str) -> &Rule {
        self.rules.get(key).unwrap_or_else(|| {
            self.rules
                .get(DEFAULT_RULE)
                .expect("rule set always contains a default rule")
        })
    }

    /// Look up a rule by exact name.
    pub fn get(&self, name: &str) -> Option<&Rule> {
        self.rules.get(name)
    }

    /// Number of rules in the set.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Whether the set contains no rules. Always false in practice, since
    /// the default rule cannot be removed.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rule_set_contains_builtins() {
        let rules = RuleSet::default();

        assert_eq!(rules.rule_for("default").capacity, 100);
        assert_eq!(rules.rule_for("api").capacity, 1000);
        assert_eq!(rules.rule_for("admin").capacity, 10000);
    }

    #[test]
    fn test_unknown_key_falls_back_to_default() {
        let rules = RuleSet::default();

        let rule = rules.rule_for("some-unknown-tenant");
        assert_eq!(rule.capacity, 100);
        assert_eq!(rule.refill_tokens, 100);
        assert_eq!(rule.period, Duration::from_secs(60));
    }

    #[test]
    fn test_custom_rule_takes_precedence() {
        let mut rules = RuleSet::default();
        rules.insert("tenant-42", Rule::new(5, 5, 1).unwrap());

        assert_eq!(rules.rule_for("tenant-42").capacity, 5);
        assert_eq!(rules.rule_for("tenant-43").capacity, 100);
    }

    #[test]
    fn test_rule_validation_rejects_zero_capacity() {
        assert!(Rule::new(0, 10, 60).is_err());
    }

    #[test]
    fn test_rule_validation_rejects_zero_refill() {
        assert!(Rule::new(10, 0, 60).is_err());
    }

    #[test]
    fn test_rule_validation_rejects_zero_period() {
        assert!(Rule::new(10, 10, 0).is_err());
    }

    #[test]
    fn test_builtin_rule_can_be_overridden() {
        let mut rules = RuleSet::default();
        rules.insert("api", Rule::new(250, 250, 30).unwrap());

        let rule = rules.rule_for("api");
        assert_eq!(rule.capacity, 250);
        assert_eq!(rule.period, Duration::from_secs(30));
    }
}
