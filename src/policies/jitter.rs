//! # Jitter for retry delays.
//!
//! [`JitterPolicy`] spreads restarts of many supervised effects that failed at
//! the same moment (for example when a shared backend went away).
//!
//! - [`JitterPolicy::None`] keeps the exact delay
//! - [`JitterPolicy::Full`] picks uniformly in `[0, delay]`
//! - [`JitterPolicy::Equal`] picks uniformly in `[delay/2, delay]`

use std::time::Duration;

use rand::Rng;

/// Randomization applied to a backoff delay.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum JitterPolicy {
    /// Exact delay. Deterministic, which is what tests want.
    #[default]
    None,

    /// Random delay in `[0, delay]`.
    Full,

    /// `delay/2 + random[0, delay/2]`.
    Equal,
}

impl JitterPolicy {
    /// Applies jitter to the given delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as u64;
        if ms == 0 {
            return delay;
        }
        match self {
            JitterPolicy::None => delay,
            JitterPolicy::Full => Duration::from_millis(rand::rng().random_range(0..=ms)),
            JitterPolicy::Equal => {
                let half = ms / 2;
                let jitter = if half == 0 {
                    0
                } else {
                    rand::rng().random_range(0..=half)
                };
                Duration::from_millis(half + jitter)
            }
        }
    }
}
