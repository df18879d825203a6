//! Retry policies.
//!
//! Knobs that control **how long** a supervisor waits before restarting a
//! failed operation and **when** it gives up.
//!
//! ## Contents
//! - [`Backoff`] the schedule seam consulted by [`supervise`](crate::supervise)
//! - [`BackoffPolicy`] exponential schedule (first / factor / max + jitter + attempt limit)
//! - [`JitterPolicy`] randomization to avoid synchronized restarts
//!
//! ## Quick wiring
//! ```text
//! supervise(op, backoff)
//!      └─► on failure #n: backoff.delay(n)
//!           ├─ Some(d) ─► publish "supervise" action, sleep(d), run op again
//!           └─ None    ─► stop
//! ```
//!
//! ## Defaults
//! - `BackoffPolicy::default()` → 20ms doubling to 10.24s, 10 attempts, no jitter.
//! - `JitterPolicy::None`; consider `Equal` when many effects share a backend.

mod backoff;
mod jitter;

pub use backoff::{Backoff, BackoffPolicy};
pub use jitter::JitterPolicy;
