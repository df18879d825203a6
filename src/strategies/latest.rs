use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::actions::Pattern;
use crate::core::{Scope, Task};
use crate::error::TaskError;
use crate::strategies::{Handler, Strategy, spawn_reporting};

/// Keeps at most one handler running; a new match halts the previous run
/// (waiting for its cleanup) before starting.
#[derive(Clone, Copy, Debug, Default)]
pub struct TakeLatest;

#[async_trait]
impl Strategy for TakeLatest {
    fn name(&self) -> &'static str {
        "take_latest"
    }

    async fn watch(
        &self,
        scope: Scope,
        pattern: Pattern,
        handler: Handler,
    ) -> Result<(), TaskError> {
        let mut sub = scope.bus().subscribe(pattern);
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();
        let mut current: Option<Task<()>> = None;

        loop {
            tokio::select! {
                biased;
                Some(err) = fail_rx.recv() => return Err(err),
                next = sub.next() => {
                    let Some(action) = next else { return Ok(()) };
                    if let Some(prev) = current.take() {
                        if !prev.is_finished() {
                            trace!(action = %action.kind, "take_latest: halting previous run");
                        }
                        let _ = prev.halt().await;
                    }
                    current = Some(spawn_reporting(&scope, &handler, action, &fail_tx));
                }
            }
        }
    }
}

/// Runs [`TakeLatest`] in `scope`.
pub async fn take_latest(
    scope: &Scope,
    pattern: impl Into<Pattern>,
    handler: Handler,
) -> Result<(), TaskError> {
    TakeLatest.watch(scope.clone(), pattern.into(), handler).await
}
