//! Per-resource polling.
//!
//! # Design Decisions
//! - Every resource key has its own interval and last-checked stamp
//! - The stamp moves on every attempt, success or not, so a failing provider is never asked
//!   more often than its interval allows
//! - Keys are independent; one slow or failing resource never delays another's schedule
//! - A key is never fetched twice at once; it is skipped while its fetch is in flight

pub mod poll;

use std::fmt;
use std::time::Duration;
use tokio::time::Instant;

pub use poll::PollScheduler;

/// A polled resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceKey {
    Height,
    Nonce,
    Balance(String),
    History(String),
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKey::Height => write!(f, "height"),
            ResourceKey::Nonce => write!(f, "nonce"),
            ResourceKey::Balance(code) => write!(f, "balance:{code}"),
            ResourceKey::History(code) => write!(f, "history:{code}"),
        }
    }
}

/// Throttle state for one resource key.
#[derive(Debug, Clone)]
pub struct PollState {
    pub interval: Duration,
    pub last_checked_at: Option<Instant>,
    /// A fetch for this key has started and not been merged yet.
    pub in_flight: bool,
}

impl PollState {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_checked_at: None,
            in_flight: false,
        }
    }

    /// Never checked, or strictly more than `interval` since the last check.
    pub fn is_due(&self, now: Instant) -> bool {
        match self.last_checked_at {
            None => true,
            Some(last) => now.saturating_duration_since(last) > self.interval,
        }
    }

    pub fn stamp(&mut self, now: Instant) {
        self.last_checked_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_labels() {
        assert_eq!(ResourceKey::Height.to_string(), "height");
        assert_eq!(ResourceKey::Balance("USDC".into()).to_string(), "balance:USDC");
        assert_eq!(ResourceKey::History("ETH".into()).to_string(), "history:ETH");
    }

    #[tokio::test(start_paused = true)]
    async fn test_due_is_strictly_after_interval() {
        let mut state = PollState::new(Duration::from_secs(10));
        let start = Instant::now();
        assert!(state.is_due(start));

        state.stamp(start);
        assert!(!state.is_due(start + Duration::from_secs(10)));
        assert!(state.is_due(start + Duration::from_millis(10_001)));
    }
}
