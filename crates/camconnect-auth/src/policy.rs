//! Exponential backoff table for PIN lockouts

use std::time::Duration;

/// Lockout window lengths, indexed by `sequence_count - 1`
pub const LOCKOUT_DURATIONS: [Duration; 9] = [
    Duration::from_secs(30),
    Duration::from_secs(60),
    Duration::from_secs(2 * 60),
    Duration::from_secs(5 * 60),
    Duration::from_secs(15 * 60),
    Duration::from_secs(30 * 60),
    Duration::from_secs(60 * 60),
    Duration::from_secs(2 * 60 * 60),
    Duration::from_secs(4 * 60 * 60),
];

/// Maps a lockout sequence index to its backoff duration
#[derive(Debug, Clone, Copy, Default)]
pub struct LockoutPolicy;

impl LockoutPolicy {
    /// Duration of the lockout window for the given sequence count.
    ///
    /// Zero for `sequence_count <= 0`; capped at the last table entry.
    pub fn duration_for(sequence_count: i64) -> Duration {
        if sequence_count <= 0 {
            return Duration::ZERO;
        }
        let index = usize::try_from(sequence_count - 1)
            .unwrap_or(usize::MAX)
            .min(LOCKOUT_DURATIONS.len() - 1);
        LOCKOUT_DURATIONS[index]
    }

    /// Longest window the policy can produce
    #[cfg(test)]
    pub fn max_duration() -> Duration {
        LOCKOUT_DURATIONS[LOCKOUT_DURATIONS.len() - 1]
    }
}
