//! Token bucket state machine.

use std::time::{Duration, Instant};

use super::rules::Rule;

/// Per-key token bucket state.
///
/// Refill is lazy: no background task ticks the bucket. Every consume or
/// read first credits the tokens earned since the last refill, computed from
/// elapsed wall-clock time. Callers are expected to hold a per-key lock
/// around each call; the bucket itself is a plain mutable value.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    refill_tokens: u64,
    refill_interval: Duration,
    available: u64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket from a rule's parameters.
    pub fn from_rule(rule: &Rule) -> Self {
        Self {
            capacity: rule.capacity,
            refill_tokens: rule.refill_tokens,
            refill_interval: rule.period,
            available: rule.capacity,
            last_refill: Instant::now(),
        }
    }

    /// Try to consume `tokens` from the bucket.
    ///
    /// Refills first, then consumes. Returns `false` without mutating the
    /// token count when not enough tokens are available. A request for more
    /// tokens than `capacity` can never succeed.
    pub fn try_consume(&mut self, tokens: u64) -> bool {
        self.refill();

        if self.available >= tokens {
            self.available -= tokens;
            true
        } else {
            false
        }
    }

    /// Current number of available tokens.
    ///
    /// Performs the same refill step as a consume, so repeated polling
    /// reflects real-time availability.
    pub fn available_tokens(&mut self) -> u64 {
        self.refill();
        self.available
    }

    /// The bucket's capacity.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Time until the next whole refill interval elapses.
    ///
    /// Used as the reset hint on rate limit decisions; an estimate, not a
    /// guarantee.
    pub fn duration_until_refill(&self) -> Duration {
        let elapsed = self.last_refill.elapsed();
        if elapsed >= self.refill_interval {
            Duration::ZERO
        } else {
            self.refill_interval - elapsed
        }
    }

    /// Credit tokens for every whole interval elapsed since the last refill.
    ///
    /// Advances `last_refill` by the whole intervals consumed rather than
    /// resetting it to now, so the sub-interval remainder keeps counting
    /// toward the next refill.
    fn refill(&mut self) {
        let elapsed = self.last_refill.elapsed();
        if elapsed < self.refill_interval {
            return;
        }

        let interval_millis = self.refill_interval.as_millis().max(1);
        let periods = (elapsed.as_millis() / interval_millis) as u32;
        let earned = self.refill_tokens.saturating_mul(u64::from(periods));

        self.available = self.available.saturating_add(earned).min(self.capacity);
        self.last_refill += self.refill_interval * periods;
    }
}
