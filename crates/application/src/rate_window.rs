//! Sliding-window rate counters.
//!
//! Approximate in-process abuse guard, not a billing meter: state lives in
//! one process and is lost on restart, which is an accepted trade-off.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::Mutex;

/// Result of recording one event against a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowCount {
    /// Events retained in the window, including the one just recorded.
    pub count: usize,
    /// Whether the count strictly exceeds the ceiling.
    pub exceeded: bool,
}

/// Per-key event counter over a trailing fixed-duration window.
///
/// Explicitly constructed and injected rather than held as a module global
/// so each test can own a fresh instance.
#[derive(Debug, Default)]
pub struct RateWindowCounter {
    windows: Mutex<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl RateWindowCounter {
    /// Creates an empty counter.
    #[must_use]
    pub fn new() -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Records `now` for `key`, purges entries older than `window_seconds`,
    /// and reports whether the retained count exceeds `ceiling`.
    pub async fn record_and_check(
        &self,
        key: &str,
        now: DateTime<Utc>,
        window_seconds: i64,
        ceiling: usize,
    ) -> WindowCount {
        let cutoff = now - Duration::seconds(window_seconds);
        let mut windows = self.windows.lock().await;
        let window = windows.entry(key.to_owned()).or_default();

        while window.front().is_some_and(|oldest| *oldest < cutoff) {
            window.pop_front();
        }
        window.push_back(now);

        let count = window.len();
        WindowCount {
            count,
            exceeded: count > ceiling,
        }
    }

    /// Drops keys whose newest entry has aged out of the window entirely.
    ///
    /// The key space is otherwise unbounded; the composition root runs this
    /// on a timer. Returns the number of keys removed.
    pub async fn prune_idle(&self, now: DateTime<Utc>, window_seconds: i64) -> usize {
        let cutoff = now - Duration::seconds(window_seconds);
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| window.back().is_some_and(|newest| *newest >= cutoff));

        before - windows.len()
    }
}
