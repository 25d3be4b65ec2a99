//! Fixed window rate limiter.
//!
//! A simpler counter-based alternative to the sliding window: the counter
//! resets when the current window has elapsed. Up to twice the limit can be
//! admitted across a window boundary; that burst is a documented property of
//! the fixed window pattern, and the sliding window variant exists as the
//! precise alternative.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

/// Per-key state: a counter and the start of the current window.
#[derive(Debug)]
struct FixedWindow {
    limit: u64,
    window: Duration,
    count: u64,
    window_start: Instant,
}

impl FixedWindow {
    fn new(limit: u64, window: Duration) -> Self {
        Self {
            limit,
            window,
            count: 0,
            window_start: Instant::now(),
        }
    }

    fn allow(&mut self) -> bool {
        let now = Instant::now();

        // A single rollover to now; older elapsed windows are irrelevant to
        // the decision.
        if now.duration_since(self.window_start) >= self.window {
            self.count = 0;
            self.window_start = now;
        }

        if self.count < self.limit {
            self.count += 1;
            true
        } else {
            false
        }
    }
}

/// Fixed window rate limiter with per-key state.
///
/// Limit and window are supplied per call; the values passed on first access
/// to a key fix that key's parameters until it is reset.
pub struct FixedWindowLimiter {
    windows: DashMap<String, Mutex<FixedWindow>>,
}

impl FixedWindowLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Check whether a request is allowed for the key in the current window,
    /// counting it when admitted.
    pub fn allow_request(&self, key: &str, limit: u64, window: Duration) -> bool {
        let entry = match self.windows.get(key) {
            Some(window) => window,
            None => self
                .windows
                .entry(key.to_string())
                .or_insert_with(|| {
                    debug!(key, limit, window = ?window, "Creating new fixed window");
                    Mutex::new(FixedWindow::new(limit, window))
                })
                .downgrade(),
        };

        let allowed = entry.lock().allow();
        if !allowed {
            debug!(key, limit, "Fixed window limit exceeded");
        }
        allowed
    }

    /// Drop the window for a key.
    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }

    /// Drop all per-key state.
    pub fn clear_all(&self) {
        self.windows.clear();
    }

    /// Number of keys with live window state.
    pub fn window_count(&self) -> usize {
        self.windows.len()
    }
}

impl Default for FixedWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}
