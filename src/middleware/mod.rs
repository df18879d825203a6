//! Middleware pipelines.
//!
//! See [`compose`] for ordering rules.

mod compose;

pub use compose::{Compose, Middleware, Next, compose};
