//! Core rate limiter registry.
//!
//! Owns all per-key token bucket state and exposes the allow/deny surface
//! consumed by request-handling layers. Thread-safe: per-key mutexes mean
//! operations on distinct keys never block each other, and the concurrent
//! map guarantees exactly one bucket is created per key even under
//! concurrent first access.

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use super::bucket::TokenBucket;
use super::rules::RuleSet;

/// Informational header carrying the rule's limit.
pub const HEADER_LIMIT: &str = "X-RateLimit-Limit";
/// Informational header carrying the remaining quota.
pub const HEADER_REMAINING: &str = "X-RateLimit-Remaining";
/// Informational header carrying the epoch-millis reset estimate.
pub const HEADER_RESET: &str = "X-RateLimit-Reset";

/// The outcome of a rate limit check, with the quota details a caller needs
/// to build informational response headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether the request was admitted
    pub allowed: bool,
    /// The capacity of the rule applied to this key
    pub limit: u64,
    /// Remaining quota after this decision
    pub remaining: u64,
    /// Epoch-millis estimate of when more quota becomes available
    pub reset_at: i64,
}

impl Decision {
    /// The `X-RateLimit-*` header triple for this decision.
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (HEADER_LIMIT, self.limit.to_string()),
            (HEADER_REMAINING, self.remaining.to_string()),
            (HEADER_RESET, self.reset_at.to_string()),
        ]
    }
}

/// The core rate limiter managing per-key token buckets.
///
/// This struct is thread-safe and can be shared across threads behind an
/// `Arc`. State grows with the number of distinct keys seen; idle keys are
/// never evicted, only [`reset`](Self::reset) and
/// [`clear_all`](Self::clear_all) reclaim memory.
pub struct RateLimiter {
    /// Token buckets indexed by client key
    buckets: DashMap<String, Mutex<TokenBucket>>,
    /// Named rules resolved per key at bucket creation
    rules: RuleSet,
}

impl RateLimiter {
    /// Create a rate limiter using the given rule set.
    pub fn new(rules: RuleSet) -> Self {
        Self {
            buckets: DashMap::new(),
            rules,
        }
    }

    /// Check whether a single request is allowed for the given key.
    pub fn allow_request(&self, key: &str) -> bool {
        self.try_consume(key, 1)
    }

    /// Check whether a request costing `tokens` is allowed for the given key.
    pub fn try_consume(&self, key: &str, tokens: u64) -> bool {
        let bucket = self.bucket(key);
        let allowed = bucket.lock().try_consume(tokens);

        if allowed {
            trace!(key, tokens, "Request allowed");
        } else {
            debug!(key, tokens, "Rate limit exceeded");
        }
        allowed
    }

    /// Check a single request and report the full decision, including the
    /// quota details for informational headers.
    pub fn check(&self, key: &str) -> Decision {
        let entry = self.bucket(key);
        let mut bucket = entry.lock();

        let allowed = bucket.try_consume(1);
        let decision = Decision {
            allowed,
            limit: bucket.capacity(),
            remaining: bucket.available_tokens(),
            reset_at: Utc::now().timestamp_millis()
                + bucket.duration_until_refill().as_millis() as i64,
        };
        drop(bucket);

        if !decision.allowed {
            debug!(key, "Rate limit exceeded");
        }
        decision
    }

    /// Get the number of available tokens for a key.
    ///
    /// Refills the bucket as a side effect, so repeated polling reflects
    /// real-time availability. Creates the bucket if the key is unseen.
    pub fn available_tokens(&self, key: &str) -> u64 {
        self.bucket(key).lock().available_tokens()
    }

    /// Drop the bucket for a key. The next request lazily recreates it at
    /// full capacity.
    pub fn reset(&self, key: &str) {
        self.buckets.remove(key);
        debug!(key, "Bucket reset");
    }

    /// Drop all per-key state.
    pub fn clear_all(&self) {
        self.buckets.clear();
        debug!("All buckets cleared");
    }

    /// Number of keys with live bucket state.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Get or create the bucket for a key.
    ///
    /// `entry().or_insert_with` guarantees exactly one bucket is created and
    /// shared when multiple threads race on an unseen key.
    fn bucket(&self, key: &str) -> dashmap::mapref::one::Ref<'_, String, Mutex<TokenBucket>> {
        if let Some(bucket) = self.buckets.get(key) {
            return bucket;
        }

        self.buckets
            .entry(key.to_string())
            .or_insert_with(|| {
                let rule = self.rules.rule_for(key);
                debug!(
                    key,
                    capacity = rule.capacity,
                    refill_tokens = rule.refill_tokens,
                    period = ?rule.period,
                    "Creating new token bucket"
                );
                Mutex::new(TokenBucket::from_rule(rule))
            })
            .downgrade()
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(RuleSet::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ratelimit::rules::Rule;
    use std::thread;
    use std::time::Duration;

    fn limiter_with_rule(name: &str, capacity: u64, refill: u64, period_secs: u64) -> RateLimiter {
        let mut rules = RuleSet::default();
        rules.insert(name, Rule::new(capacity, refill, period_secs).unwrap());
        RateLimiter::new(rules)
    }

    #[test]
    fn test_allows_requests_within_limit() {
        let limiter = limiter_with_rule("test-user", 5, 5, 1);

        for i in 0..5 {
            assert!(
                limiter.allow_request("test-user"),
                "request {} should be allowed",
                i + 1
            );
        }
        assert!(!limiter.allow_request("test-user"), "6th request should be denied");
    }

    #[test]
    fn test_try_consume_multiple_tokens() {
        let limiter = limiter_with_rule("test-user", 5, 5, 1);

        assert!(limiter.try_consume("test-user", 3));
        assert_eq!(limiter.available_tokens("test-user"), 2);
    }

    #[test]
    fn test_unknown_key_uses_default_rule() {
        let limiter = RateLimiter::default();

        assert!(limiter.allow_request("never-configured"));
        // Default rule has capacity 100; one token consumed above.
        assert_eq!(limiter.available_tokens("never-configured"), 99);
    }

    #[test]
    fn test_separate_keys_have_separate_buckets() {
        let mut rules = RuleSet::default();
        rules.insert("user1", Rule::new(5, 5, 1).unwrap());
        rules.insert("user2", Rule::new(5, 5, 1).unwrap());
        let limiter = RateLimiter::new(rules);

        for _ in 0..5 {
            limiter.allow_request("user1");
        }

        assert!(!limiter.allow_request("user1"));
        assert!(limiter.allow_request("user2"));
        assert_eq!(limiter.available_tokens("user2"), 4);
    }

    #[test]
    fn test_reset_restores_full_capacity() {
        let limiter = limiter_with_rule("test-user", 5, 5, 1);

        limiter.try_consume("test-user", 3);
        assert_eq!(limiter.available_tokens("test-user"), 2);

        limiter.reset("test-user");
        assert_eq!(limiter.available_tokens("test-user"), 5);
    }

    #[test]
    fn test_clear_all_restores_every_key() {
        let mut rules = RuleSet::default();
        rules.insert("user1", Rule::new(5, 5, 1).unwrap());
        rules.insert("user2", Rule::new(5, 5, 1).unwrap());
        let limiter = RateLimiter::new(rules);

        limiter.try_consume("user1", 3);
        limiter.try_consume("user2", 2);
        assert_eq!(limiter.bucket_count(), 2);

        limiter.clear_all();
        assert_eq!(limiter.bucket_count(), 0);
        assert_eq!(limiter.available_tokens("user1"), 5);
        assert_eq!(limiter.available_tokens("user2"), 5);
    }

    #[test]
    fn test_refill_allows_requests_again() {
        let limiter = limiter_with_rule("fast-user", 2, 2, 1);

        assert!(limiter.allow_request("fast-user"));
        assert!(limiter.allow_request("fast-user"));
        assert!(!limiter.allow_request("fast-user"));

        thread::sleep(Duration::from_millis(1100));
        assert!(limiter.allow_request("fast-user"));
    }

    #[test]
    fn test_check_reports_quota_details() {
        let limiter = limiter_with_rule("test-user", 5, 5, 1);
        let before = Utc::now().timestamp_millis();

        let decision = limiter.check("test-user");
        assert!(decision.allowed);
        assert_eq!(decision.limit, 5);
        assert_eq!(decision.remaining, 4);
        assert!(decision.reset_at >= before);
        assert!(decision.reset_at <= before + 1100);
    }

    #[test]
    fn test_check_denied_reports_zero_remaining() {
        let limiter = limiter_with_rule("test-user", 2, 2, 60);

        limiter.try_consume("test-user", 2);
        let decision = limiter.check("test-user");

        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
    }

    #[test]
    fn test_decision_headers() {
        let decision = Decision {
            allowed: true,
            limit: 100,
            remaining: 42,
            reset_at: 1_700_000_000_000,
        };

        let headers = decision.headers();
        assert_eq!(headers[0], (HEADER_LIMIT, "100".to_string()));
        assert_eq!(headers[1], (HEADER_REMAINING, "42".to_string()));
        assert_eq!(headers[2], (HEADER_RESET, "1700000000000".to_string()));
    }

    #[test]
    fn test_no_over_admission_under_concurrency() {
        let limiter = limiter_with_rule("contended", 100, 100, 60);
        let admitted = std::sync::atomic::AtomicU64::new(0);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..50 {
                        if limiter.allow_request("contended") {
                            admitted.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        }
                    }
                });
            }
        });

        // 400 attempts against a capacity of 100: exactly 100 admitted.
        assert_eq!(admitted.load(std::sync::atomic::Ordering::Relaxed), 100);
    }

    #[test]
    fn test_concurrent_first_access_creates_one_bucket() {
        let limiter = limiter_with_rule("fresh", 1000, 1000, 60);

        thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    for _ in 0..10 {
                        assert!(limiter.allow_request("fresh"));
                    }
                });
            }
        });

        assert_eq!(limiter.bucket_count(), 1);
        assert_eq!(limiter.available_tokens("fresh"), 1000 - 80);
    }
}
