//! Persisted lockout window state
//!
//! The window is stored as `(lockout_start_time, lockout_sequence_count)`.
//! Whether the device is locked is derived from those two values, the backoff
//! table and the current time. An elapsed window is only cleared when someone
//! looks at it: [`LockoutState::peek`] reports without touching storage and
//! [`LockoutState::reconcile`] applies the clearing.

use crate::attempts::AttemptCounter;
use crate::clock::{from_millis, to_millis};
use crate::error::format_lockout_time;
use crate::policy::LockoutPolicy;
use crate::storage::{keys, KeyValueStore, StoreEdit};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Snapshot of the lockout state for callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LockoutInfo {
    pub is_locked_out: bool,
    /// Time left in the current window (zero when not locked out)
    pub remaining: Duration,
    /// Lockout windows entered since the last successful login
    pub sequence_count: i64,
}

impl LockoutInfo {
    fn unlocked(sequence_count: i64) -> Self {
        Self {
            is_locked_out: false,
            remaining: Duration::ZERO,
            sequence_count,
        }
    }
}

/// Result of inspecting the persisted window at a point in time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockoutStatus {
    /// No window recorded
    Unlocked { sequence_count: i64 },
    /// Window still running
    Active {
        remaining: Duration,
        sequence_count: i64,
    },
    /// Window recorded but fully elapsed; not yet cleared
    Expired { sequence_count: i64 },
}

impl LockoutStatus {
    pub fn info(&self) -> LockoutInfo {
        match *self {
            LockoutStatus::Unlocked { sequence_count }
            | LockoutStatus::Expired { sequence_count } => LockoutInfo::unlocked(sequence_count),
            LockoutStatus::Active {
                remaining,
                sequence_count,
            } => LockoutInfo {
                is_locked_out: true,
                remaining,
                sequence_count,
            },
        }
    }
}

/// Lockout window bookkeeping
pub struct LockoutState {
    store: Arc<dyn KeyValueStore>,
    attempts: Arc<AttemptCounter>,
    /// Serializes read-modify-write of the persisted window
    write_lock: Mutex<()>,
}

impl LockoutState {
    pub fn new(store: Arc<dyn KeyValueStore>, attempts: Arc<AttemptCounter>) -> Self {
        Self {
            store,
            attempts,
            write_lock: Mutex::new(()),
        }
    }

    /// Persisted sequence count (absent or unreadable means 0)
    pub async fn sequence_count(&self) -> i64 {
        self.store
            .get_i64(keys::LOCKOUT_SEQUENCE_COUNT)
            .await
            .unwrap_or(0)
            .max(0)
    }

    /// Inspect the window at `now` without modifying anything
    pub async fn peek(&self, now: DateTime<Utc>) -> LockoutStatus {
        let sequence_count = self.sequence_count().await;
        let start = match self
            .store
            .get_i64(keys::LOCKOUT_START_TIME)
            .await
            .and_then(from_millis)
        {
            Some(start) => start,
            None => return LockoutStatus::Unlocked { sequence_count },
        };

        let duration = LockoutPolicy::duration_for(sequence_count);
        // A start time in the future counts as nothing elapsed.
        let elapsed = (now - start).to_std().unwrap_or(Duration::ZERO);

        if elapsed >= duration {
            LockoutStatus::Expired { sequence_count }
        } else {
            LockoutStatus::Active {
                remaining: duration - elapsed,
                sequence_count,
            }
        }
    }

    /// Inspect the window at `now`, clearing it if it has elapsed.
    ///
    /// Clearing removes the start time and resets the attempt counter; the
    /// sequence count is kept so the next window is longer.
    pub async fn reconcile(&self, now: DateTime<Utc>) -> LockoutInfo {
        let status = self.peek(now).await;
        if !matches!(status, LockoutStatus::Expired { .. }) {
            return status.info();
        }

        let _guard = self.write_lock.lock().await;
        // Re-check under the lock; a new window may have opened meanwhile.
        let status = self.peek(now).await;
        if let LockoutStatus::Expired { sequence_count } = status {
            self.attempts
                .reset_with(StoreEdit::new().remove(keys::LOCKOUT_START_TIME))
                .await;
            debug!(
                "Lockout period expired (sequence {}), attempt counter reset",
                sequence_count
            );
        }
        status.info()
    }

    /// Open a new lockout window starting at `now`
    pub async fn begin_lockout(&self, now: DateTime<Utc>) -> LockoutInfo {
        let _guard = self.write_lock.lock().await;
        let sequence_count = self.sequence_count().await.saturating_add(1);
        let duration = LockoutPolicy::duration_for(sequence_count);

        self.attempts
            .reset_with(
                StoreEdit::new()
                    .put(keys::LOCKOUT_START_TIME, to_millis(now))
                    .put(keys::LOCKOUT_SEQUENCE_COUNT, sequence_count),
            )
            .await;

        warn!(
            "Lockout started. Sequence: {}, Duration: {}",
            sequence_count,
            format_lockout_time(duration)
        );
        LockoutInfo {
            is_locked_out: true,
            remaining: duration,
            sequence_count,
        }
    }

    /// Forget every window and the attempt count
    pub async fn clear_all(&self) {
        let _guard = self.write_lock.lock().await;
        self.attempts
            .reset_with(
                StoreEdit::new()
                    .remove(keys::LOCKOUT_START_TIME)
                    .remove(keys::LOCKOUT_SEQUENCE_COUNT),
            )
            .await;
        info!("All attempt counters and lockout state reset");
    }
}
