//! Structured-concurrency combinators.
//!
//! - [`safe`]: capture failures (including panics) as values;
//! - [`parallel`]: fan-out with completion-order and input-order fan-in;
//! - [`race`]: first to finish wins, the rest are halted;
//! - [`supervise`] / [`keep_alive`]: restart loops driven by a [`Backoff`](crate::Backoff).

mod parallel;
mod race;
mod safe;
mod supervise;

pub use parallel::{Parallel, parallel};
pub use race::race;
pub use safe::{Outcome, safe};
pub use supervise::{
    SUPERVISE_MAX_ATTEMPTS, keep_alive, keep_alive_with, supervise, supervise_backoff,
    supervise_backoff_with,
};
