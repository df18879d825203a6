//! # Retry schedules for supervised work.
//!
//! [`Backoff`] is the seam [`supervise`](crate::supervise) asks for the delay
//! before restarting a failed operation. Attempts are counted from `1` (the
//! first failure) and a schedule ends by returning `None`.
//!
//! Two implementations ship with the crate:
//! - [`supervise_backoff`](crate::supervise_backoff), the fixed `2^attempt × 10ms`
//!   schedule (any `Fn(u32) -> Option<Duration>` is a `Backoff`);
//! - [`BackoffPolicy`], a configurable exponential schedule with jitter and an
//!   optional attempt limit.
//!
//! # Example
//! ```rust
//! use std::time::Duration;
//! use effectvisor::{Backoff, BackoffPolicy, JitterPolicy};
//!
//! let backoff = BackoffPolicy {
//!     first: Duration::from_millis(100),
//!     max: Duration::from_secs(10),
//!     factor: 2.0,
//!     jitter: JitterPolicy::None,
//!     max_attempts: 3,
//! };
//!
//! assert_eq!(backoff.delay(1), Some(Duration::from_millis(100)));
//! assert_eq!(backoff.delay(2), Some(Duration::from_millis(200)));
//! assert_eq!(backoff.delay(3), Some(Duration::from_millis(400)));
//! assert_eq!(backoff.delay(4), None);
//! ```

use std::time::Duration;

use crate::policies::jitter::JitterPolicy;

/// Delay schedule consulted between restarts of a supervised operation.
///
/// `attempt` is the number of consecutive failures so far (starting at `1`).
/// Returning `None` stops the supervisor.
pub trait Backoff: Send + Sync + 'static {
    /// Delay before the next run, or `None` once the schedule is exhausted.
    fn delay(&self, attempt: u32) -> Option<Duration>;
}

impl<F> Backoff for F
where
    F: Fn(u32) -> Option<Duration> + Send + Sync + 'static,
{
    fn delay(&self, attempt: u32) -> Option<Duration> {
        self(attempt)
    }
}

/// Exponential retry policy.
///
/// The delay for attempt `n` is `first × factor^(n-1)`, clamped to `max`,
/// then jittered. `max_attempts = 0` never gives up.
#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Delay after the first failure.
    pub first: Duration,
    /// Maximum delay cap.
    pub max: Duration,
    /// Multiplicative growth factor (`>= 1.0` recommended).
    pub factor: f64,
    /// Jitter applied to the clamped delay.
    pub jitter: JitterPolicy,
    /// Number of consecutive failures tolerated (`0` = unlimited).
    pub max_attempts: u32,
}

impl Default for BackoffPolicy {
    /// Same curve as [`supervise_backoff`](crate::supervise_backoff):
    /// - `first = 20ms`, `factor = 2.0`;
    /// - `max = 10_240ms`;
    /// - `max_attempts = 10`, no jitter.
    fn default() -> Self {
        Self {
            first: Duration::from_millis(20),
            max: Duration::from_millis(10_240),
            factor: 2.0,
            jitter: JitterPolicy::None,
            max_attempts: 10,
        }
    }
}

impl BackoffPolicy {
    /// Computes the delay for the given 0-indexed step.
    ///
    /// The base is derived from `step` alone, so jitter output never feeds
    /// back into later delays.
    pub fn next(&self, step: u32) -> Duration {
        let max_secs = self.max.as_secs_f64();
        let exp = step.min(i32::MAX as u32) as i32;
        let unclamped = self.first.as_secs_f64() * self.factor.powi(exp);

        let base = if !unclamped.is_finite() || unclamped < 0.0 || unclamped > max_secs {
            self.max
        } else {
            Duration::from_secs_f64(unclamped)
        };
        self.jitter.apply(base)
    }

    /// Returns the attempt limit as an `Option` (`None` = unlimited).
    #[inline]
    pub fn attempt_limit(&self) -> Option<u32> {
        if self.max_attempts == 0 {
            None
        } else {
            Some(self.max_attempts)
        }
    }
}

impl Backoff for BackoffPolicy {
    fn delay(&self, attempt: u32) -> Option<Duration> {
        match self.attempt_limit() {
            Some(limit) if attempt > limit => None,
            _ => Some(self.next(attempt.saturating_sub(1))),
        }
    }
}
