//! Rate limiting algorithms and per-key state management.

mod bucket;
mod fixed;
mod registry;
mod rules;
mod sliding;

pub use bucket::TokenBucket;
pub use fixed::FixedWindowLimiter;
pub use registry::{Decision, RateLimiter, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET};
pub use rules::{Rule, RuleSet, DEFAULT_RULE};
pub use sliding::SlidingWindowLimiter;
