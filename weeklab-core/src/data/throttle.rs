//! Request pacing and circuit breaking for the market-data provider.
//!
//! The provider enforces a request-rate limit, so ingestion keeps one request
//! in flight and optionally waits a fixed delay between requests. When the
//! provider answers 403 or keeps answering 429, the breaker trips and refuses
//! all subsequent requests until the cooldown expires.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Breaker position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    /// Requests are allowed.
    Closed,
    /// Requests are refused until the cooldown expires.
    Open { tripped_at: Instant },
}

#[derive(Debug)]
struct ThrottleState {
    breaker: BreakerState,
    consecutive_failures: u32,
    last_request: Option<Instant>,
}

/// Paces requests and trips after repeated failures.
#[derive(Debug)]
pub struct Throttle {
    state: Mutex<ThrottleState>,
    min_interval: Duration,
    cooldown: Duration,
    failure_threshold: u32,
}

impl Throttle {
    pub fn new(min_interval: Duration, cooldown: Duration) -> Self {
        Self {
            state: Mutex::new(ThrottleState {
                breaker: BreakerState::Closed,
                consecutive_failures: 0,
                last_request: None,
            }),
            min_interval,
            cooldown,
            failure_threshold: 3,
        }
    }

    /// No pacing; 30-minute cooldown after 3 consecutive failures.
    pub fn unpaced() -> Self {
        Self::new(Duration::ZERO, Duration::from_secs(30 * 60))
    }

    /// Fixed delay between requests; 30-minute cooldown.
    pub fn paced(min_interval: Duration) -> Self {
        Self::new(min_interval, Duration::from_secs(30 * 60))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ThrottleState> {
        // The state stays consistent even if a holder panicked.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Whether requests are currently allowed. Resets an expired breaker.
    pub fn is_allowed(&self) -> bool {
        let mut state = self.lock();
        match state.breaker {
            BreakerState::Closed => true,
            BreakerState::Open { tripped_at } => {
                if tripped_at.elapsed() >= self.cooldown {
                    state.breaker = BreakerState::Closed;
                    state.consecutive_failures = 0;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Block until the pacing interval since the previous request has passed,
    /// then claim the slot. Returns false if the breaker is open.
    pub fn acquire(&self) -> bool {
        if !self.is_allowed() {
            return false;
        }
        let wait = {
            let state = self.lock();
            state
                .last_request
                .map(|t| self.min_interval.saturating_sub(t.elapsed()))
                .unwrap_or(Duration::ZERO)
        };
        if !wait.is_zero() {
            std::thread::sleep(wait);
        }
        self.lock().last_request = Some(Instant::now());
        true
    }

    /// Record a successful request; resets the failure counter.
    pub fn record_success(&self) {
        self.lock().consecutive_failures = 0;
    }

    /// Record a failure; trips once the threshold is reached.
    pub fn record_failure(&self) {
        let mut state = self.lock();
        state.consecutive_failures += 1;
        if state.consecutive_failures >= self.failure_threshold {
            state.breaker = BreakerState::Open {
                tripped_at: Instant::now(),
            };
        }
    }

    /// Trip immediately (403 Forbidden).
    pub fn trip(&self) {
        self.lock().breaker = BreakerState::Open {
            tripped_at: Instant::now(),
        };
    }

    /// Remaining cooldown (zero if closed).
    pub fn remaining_cooldown(&self) -> Duration {
        match self.lock().breaker {
            BreakerState::Closed => Duration::ZERO,
            BreakerState::Open { tripped_at } => self.cooldown.saturating_sub(tripped_at.elapsed()),
        }
    }
}
