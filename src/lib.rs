//! Turnstile - Keyed In-Memory Rate Limiting
//!
//! This crate implements per-key admission control for multi-threaded
//! request-handling runtimes. The primary strategy is a lazily refilled
//! token bucket resolved through named rules; exact sliding window and
//! simple fixed window limiters are available as alternatives. All state
//! lives in memory behind per-key locks, so distinct keys never contend.
//!
//! ```
//! use turnstile::ratelimit::{RateLimiter, Rule, RuleSet};
//!
//! let mut rules = RuleSet::default();
//! rules.insert("tenant-acme", Rule::new(5000, 5000, 60)?);
//!
//! let limiter = RateLimiter::new(rules);
//! assert!(limiter.allow_request("tenant-acme"));
//! # Ok::<(), turnstile::error::TurnstileError>(())
//! ```

pub mod config;
pub mod error;
pub mod key;
pub mod ratelimit;
