//! Sliding window rate limiter.
//!
//! Counts requests in an exact trailing time window by recording one
//! timestamp per admitted request. More precise than the fixed window
//! variant (no boundary burst) at the cost of storage proportional to
//! traffic within the window.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

/// Per-key state: admitted-request timestamps in insertion order.
#[derive(Debug)]
struct SlidingWindow {
    timestamps: VecDeque<Instant>,
    limit: usize,
    window: Duration,
}

impl SlidingWindow {
    fn new(limit: usize, window: Duration) -> Self {
        Self {
            timestamps: VecDeque::new(),
            limit,
            window,
        }
    }

    fn allow(&mut self) -> bool {
        self.purge_expired();

        if self.timestamps.len() < self.limit {
            self.timestamps.push_back(Instant::now());
            true
        } else {
            false
        }
    }

    fn count(&mut self) -> usize {
        self.purge_expired();
        self.timestamps.len()
    }

    /// Timestamps are chronologically ordered, so expiry is a prefix trim.
    fn purge_expired(&mut self) {
        let now = Instant::now();
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

/// Sliding window rate limiter with per-key state.
///
/// Limit and window are supplied per call; the values passed on first access
/// to a key fix that key's parameters until it is reset.
pub struct SlidingWindowLimiter {
    windows: DashMap<String, Mutex<SlidingWindow>>,
}

impl SlidingWindowLimiter {
    pub fn new() -> Self {
        Self {
            windows: DashMap::new(),
        }
    }

    /// Check whether a request is allowed for the key within the trailing
    /// window, recording it when admitted.
    pub fn allow_request(&self, key: &str, limit: usize, window: Duration) -> bool {
        let entry = match self.windows.get(key) {
            Some(window) => window,
            None => self
                .windows
                .entry(key.to_string())
                .or_insert_with(|| {
                    debug!(key, limit, window = ?window, "Creating new sliding window");
                    Mutex::new(SlidingWindow::new(limit, window))
                })
                .downgrade(),
        };

        let allowed = entry.lock().allow();
        if !allowed {
            debug!(key, limit, "Sliding window limit exceeded");
        }
        allowed
    }

    /// Number of requests currently inside the key's window.
    ///
    /// Purges expired timestamps as a side effect. An unseen key reports 0
    /// without materializing state.
    pub fn current_count(&self, key: &str) -> usize {
        match self.windows.get(key) {
            Some(window) => window.lock().count(),
            None => 0,
        }
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

impl Default for SlidingWindowLimiter {
    fn default() -> Self {
        Self::new()
    }
}
