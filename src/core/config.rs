//! # Global runtime configuration.
//!
//! Provides [`Config`], the settings shared by a [`Scope`](crate::Scope) tree
//! and the registries registered into it.
//!
//! Config is used in three ways:
//! 1. **Scope creation**: `Scope::new(config)`; children inherit it.
//! 2. **Registry creation**: `Thunks::builder().with_config(config)`.
//! 3. **Strategy defaults**: `Poll::from_config`, `Timer::from_config`.
//!
//! ## Sentinel values
//! - `grace = 0s` → shutdown cancels and returns without waiting
//! - `signal_capacity = 0` → clamped to 1

use std::time::Duration;

use crate::policies::BackoffPolicy;

/// Global configuration for the effect runtime.
///
/// ## Field semantics
/// - `grace`: maximum wait for the task tree to stop (`0s` = no wait)
/// - `signal_capacity`: buffer of a registry's "effect declared" signal (min 1)
/// - `backoff`: schedule used to keep registered effects alive
/// - `poll_interval`: default period of the [`Poll`](crate::Poll) strategy
/// - `timer_duration`: default window of the [`Timer`](crate::Timer) strategy
///
/// All fields are public. Prefer the helper accessors over sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time to wait for graceful shutdown.
    ///
    /// `Scope::shutdown` cancels the tree, then waits up to `grace` for every
    /// tracked task to exit before returning `RuntimeError::GraceExceeded`.
    pub grace: Duration,

    /// Capacity of the broadcast signal announcing effects declared after
    /// `register()`.
    ///
    /// A registration that lags further than this logs a warning and misses
    /// the skipped declarations.
    pub signal_capacity: usize,

    /// Backoff used by `register()` to supervise every effect watcher, and by
    /// `keep_alive` (which has no schedule argument).
    pub backoff: BackoffPolicy,

    /// Default `Poll` period when the trigger carries no `timer` field.
    pub poll_interval: Duration,

    /// Default `Timer` window.
    pub timer_duration: Duration,
}

impl Config {
    /// Returns the grace period as an `Option` (`None` = do not wait).
    #[inline]
    pub fn grace_period(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns a signal capacity clamped to a minimum of 1.
    #[inline]
    pub fn signal_capacity_clamped(&self) -> usize {
        self.signal_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `grace = 60s`
    /// - `signal_capacity = 1024`
    /// - `backoff = BackoffPolicy::default()` (20ms doubling, 10 attempts)
    /// - `poll_interval = 5s`
    /// - `timer_duration = 5min`
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(60),
            signal_capacity: 1024,
            backoff: BackoffPolicy::default(),
            poll_interval: Duration::from_secs(5),
            timer_duration: Duration::from_secs(5 * 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.grace_period(), Some(Duration::from_secs(60)));
        cfg.grace = Duration::ZERO;
        assert_eq!(cfg.grace_period(), None);

        cfg.signal_capacity = 0;
        assert_eq!(cfg.signal_capacity_clamped(), 1);
    }
}
