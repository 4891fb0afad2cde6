//! Restart governor: per-actor sliding-window rate limit.
//!
//! Each actor gets `limit` restarts per trailing hour. Timestamps older
//! than the window are dropped lazily whenever that actor is checked;
//! an actor with no recent restarts is removed from the map entirely, so
//! memory stays bounded by recent actors × limit.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use warden_core::config::SecurityConfig;

/// Length of the sliding window.
pub const RESTART_WINDOW: Duration = Duration::from_secs(3600);

/// Admission control for operator restarts.
///
/// `admit` and `record` are each atomic, but not atomic together: two
/// concurrent requests from one actor can both be admitted before either
/// is recorded.
#[derive(Debug)]
pub struct RestartGovernor {
    limit: u32,
    window: Duration,
    /// actor → restart timestamps, oldest first.
    history: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RestartGovernor {
    pub fn new(limit: u32) -> Self {
        Self::with_window(limit, RESTART_WINDOW)
    }

    pub fn with_window(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            history: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SecurityConfig) -> Self {
        Self::new(config.max_restarts_per_hour)
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Whether `actor` may restart at `now`. Purges the actor's stale entries.
    pub fn admit(&self, actor: &str, now: Instant) -> bool {
        let recent = self.recent_count(actor, now);
        let admitted = recent < self.limit as usize;
        debug!(%actor, recent, limit = self.limit, admitted, "restart admission check");
        admitted
    }

    /// Record a restart attempt by `actor` at `now`.
    pub fn record(&self, actor: &str, now: Instant) {
        self.lock()
            .entry(actor.to_string())
            .or_default()
            .push_back(now);
    }

    /// Restarts `actor` has left in the current window.
    pub fn remaining(&self, actor: &str, now: Instant) -> u32 {
        let recent = self.recent_count(actor, now) as u32;
        self.limit.saturating_sub(recent)
    }

    /// Number of actors currently holding restart history.
    pub fn tracked_actors(&self) -> usize {
        self.lock().len()
    }

    fn recent_count(&self, actor: &str, now: Instant) -> usize {
        let mut history = self.lock();
        let Some(entries) = history.get_mut(actor) else {
            return 0;
        };

        while let Some(&oldest) = entries.front() {
            if now.saturating_duration_since(oldest) < self.window {
                break;
            }
            entries.pop_front();
        }

        let count = entries.len();
        if count == 0 {
            history.remove(actor);
        }
        count
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, VecDeque<Instant>>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
