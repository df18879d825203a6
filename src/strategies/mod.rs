//! # Dispatch strategies ("supervisors").
//!
//! A [`Strategy`] decides how actions matching a pattern start runs of a
//! [`Handler`]. Every effect in a registry is watched by one strategy.
//!
//! | Strategy        | On each match                                             |
//! |-----------------|-----------------------------------------------------------|
//! | [`TakeEvery`]   | spawn a new handler; runs overlap                         |
//! | [`TakeLatest`]  | halt the running handler, then spawn a new one            |
//! | [`TakeLeading`] | run the handler; matches arriving meanwhile are dropped   |
//! | [`Poll`]        | re-run the handler every interval until a cancel arrives  |
//! | [`Timer`]       | run once per dedup key, then ignore that key for a window |
//!
//! ## Rules
//! - Handlers run in child scopes of the watcher; halting the watcher halts them.
//! - A failing handler fails the watcher (so a supervisor can restart it);
//!   handlers halted by the strategy itself are not failures.
//! - A watcher returns `Ok(())` when the bus closes.

mod every;
mod latest;
mod leading;
mod poll;
mod timer;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::actions::{Action, Pattern};
use crate::core::{BoxOp, Scope};
use crate::error::TaskError;

pub use every::{TakeEvery, take_every};
pub use latest::{TakeLatest, take_latest};
pub use leading::{TakeLeading, take_leading};
pub use poll::Poll;
pub use timer::{CLEAR_TIMERS, ClearTimer, Timer, clear_timers};

/// Work started for a matching action.
pub type Handler = Arc<dyn Fn(Scope, Action) -> BoxOp<'static> + Send + Sync>;

/// Wraps a closure as a [`Handler`].
pub fn handler<F, Fut>(f: F) -> Handler
where
    F: Fn(Scope, Action) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
{
    Arc::new(move |scope, action| Box::pin(f(scope, action)))
}

/// How matching actions start handler runs.
#[async_trait]
pub trait Strategy: Send + Sync + 'static {
    /// Stable name for logs.
    fn name(&self) -> &'static str;

    /// Watches `pattern` in `scope` until the bus closes or a handler fails.
    async fn watch(
        &self,
        scope: Scope,
        pattern: Pattern,
        handler: Handler,
    ) -> Result<(), TaskError>;
}

/// Spawns a handler run that reports its failure (halts excluded) on `fail`.
pub(crate) fn spawn_reporting(
    scope: &Scope,
    handler: &Handler,
    action: Action,
    fail: &tokio::sync::mpsc::UnboundedSender<TaskError>,
) -> crate::core::Task<()> {
    let handler = Arc::clone(handler);
    let fail = fail.clone();
    scope.spawn(move |s| async move {
        let res = handler(s, action).await;
        match &res {
            Err(err) if !err.is_canceled() => {
                let _ = fail.send(err.clone());
            }
            _ => {}
        }
        res
    })
}
