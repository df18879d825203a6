//! # effectvisor
//!
//! **Effectvisor** is an action-driven effect orchestration library for Rust.
//!
//! Work is triggered by publishing [`Action`]s on a multicast [`Bus`].
//! Named effects declared on a [`Thunks`] registry watch for their action,
//! run an onion-style [`Middleware`] pipeline over a per-dispatch [`Context`],
//! and are kept alive by a supervisor that restarts them with backoff.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   scope.put(action) ──────────────────────────────────────────┐
//!                                                               ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Bus (multicast, per-subscriber filtered queues)                  │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!   ┌──────────┐       ┌──────────┐       ┌──────────┐
//!   │ Strategy │       │ Strategy │       │ Strategy │   take_every / take_latest /
//!   │ (effect) │       │ (effect) │       │ (effect) │   take_leading / poll / timer
//!   └────┬─────┘       └────┬─────┘       └────┬─────┘
//!        │ supervise()      │                  │          restart with backoff,
//!        ▼                  ▼                  ▼          publish "supervise" on failure
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  on_api: Context{name, key, payload, result, scope}               │
//! │     └─► global stack ─► routes() ─► effect middleware ─► next     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Structured concurrency
//! ```text
//! Scope (root)
//!   ├─ spawn ─► Task ── child Scope ─┬─ spawn ─► Task ...
//!   │                                └─ halted when the parent task ends
//!   └─ halt() / shutdown(): cancel, then wait for every task in the tree
//! ```
//!
//! ## Features
//! | Area              | Description                                                   | Key types / functions                              |
//! |-------------------|---------------------------------------------------------------|----------------------------------------------------|
//! | **Actions**       | Typed messages, pattern matching, multicast bus.              | [`Action`], [`Pattern`], [`Bus`], [`create_action`] |
//! | **Runtime**       | Scopes, spawn/halt handles, graceful shutdown.                | [`Scope`], [`Task`], [`Config`]                    |
//! | **Combinators**   | Failure capture, fan-out, races, restart loops.               | [`safe`], [`parallel`], [`race`], [`supervise`]    |
//! | **Middleware**    | Onion composition with a next-once guard, error boundary.     | [`compose`], [`Middleware`], [`catch_errors`]      |
//! | **Strategies**    | How matching actions start handlers.                          | [`Strategy`], [`TakeEvery`], [`Poll`], [`Timer`]   |
//! | **Effects**       | Named effect registry with dedup keys and managed resources.  | [`Thunks`], [`ActionCreator`], [`Managed`]         |
//! | **Policies**      | Backoff schedules for supervisors.                            | [`Backoff`], [`BackoffPolicy`], [`JitterPolicy`]   |
//! | **Errors**        | Typed errors for programmer and operational failures.         | [`TaskError`], [`RuntimeError`]                    |
//!
//! ## Example
//! ```rust
//! use effectvisor::{Config, Context, Middleware, Scope, Thunks};
//! use serde_json::json;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let thunks: Thunks = Thunks::new();
//!     thunks.use_middleware(thunks.routes());
//!
//!     let double = thunks.create(
//!         "double",
//!         Middleware::new(|ctx: &mut Context, next| {
//!             Box::pin(async move {
//!                 let n = ctx.payload.as_i64().unwrap_or(0);
//!                 ctx.result = Ok(json!(n * 2));
//!                 next.run(ctx).await
//!             })
//!         }),
//!     )?;
//!
//!     let scope = Scope::new(Config::default());
//!     let _registration = thunks.register_in(&scope);
//!
//!     // `scope.put(double.call(json!(21)))` dispatches through the bus;
//!     // `run` executes the pipeline directly.
//!     let ctx = double.run(&scope, json!(21)).await?;
//!     assert_eq!(ctx.result?, json!(42));
//!
//!     scope.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod actions;
mod core;
mod error;
mod fx;
mod middleware;
mod policies;
mod strategies;
mod thunks;

// ---- Public re-exports ----

pub use actions::{
    Action, ActionFn, Batch, Bus, Pattern, STREAM_CLOSED, SUPERVISE, Subscription, Target,
    create_action, get_id_from_action,
};
pub use core::{BoxOp, Config, Op, Scope, Task, op};
pub use error::{RuntimeError, TaskError};
pub use fx::{
    Outcome, Parallel, SUPERVISE_MAX_ATTEMPTS, keep_alive, keep_alive_with, parallel, race, safe,
    supervise, supervise_backoff, supervise_backoff_with,
};
pub use middleware::{Compose, Middleware, Next, compose};
pub use policies::{Backoff, BackoffPolicy, JitterPolicy};
pub use strategies::{
    CLEAR_TIMERS, ClearTimer, Handler, Poll, Strategy, TakeEvery, TakeLatest, TakeLeading, Timer,
    clear_timers, handler, take_every, take_latest, take_leading,
};
pub use thunks::{
    ActionCreator, Context, CreateOptions, Declare, EffectPayload, Managed, Method, RunInput,
    ThunkCtx, Thunks, ThunksBuilder, Uri, catch_errors, create_key,
};
