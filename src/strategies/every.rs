use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::trace;

use crate::actions::Pattern;
use crate::core::Scope;
use crate::error::TaskError;
use crate::strategies::{Handler, Strategy, spawn_reporting};

/// Spawns a handler for every match; runs may overlap.
#[derive(Clone, Copy, Debug, Default)]
pub struct TakeEvery;

#[async_trait]
impl Strategy for TakeEvery {
    fn name(&self) -> &'static str {
        "take_every"
    }

    async fn watch(
        &self,
        scope: Scope,
        pattern: Pattern,
        handler: Handler,
    ) -> Result<(), TaskError> {
        let mut sub = scope.bus().subscribe(pattern);
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel();

        loop {
            tokio::select! {
                biased;
                Some(err) = fail_rx.recv() => return Err(err),
                next = sub.next() => {
                    let Some(action) = next else { return Ok(()) };
                    trace!(action = %action.kind, "take_every: spawning handler");
                    let _ = spawn_reporting(&scope, &handler, action, &fail_tx);
                }
            }
        }
    }
}

/// Runs [`TakeEvery`] in `scope`.
pub async fn take_every(
    scope: &Scope,
    pattern: impl Into<Pattern>,
    handler: Handler,
) -> Result<(), TaskError> {
    TakeEvery.watch(scope.clone(), pattern.into(), handler).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::core::Config;
    use crate::strategies::handler;
    use crate::strategies::testing::{recording, settle};
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn handlers_overlap() {
        let scope = Scope::new(Config::default());
        let (h, log) = recording(10);
        let watcher = scope.spawn(move |s| async move { take_every(&s, "job", h).await });
        settle().await;

        for i in 0..3 {
            scope.put(Action::new("job").with_payload(i));
        }
        scope.put(Action::new("other").with_payload(9));
        tokio::time::sleep(Duration::from_millis(20)).await;

        let log = log.lock().unwrap().clone();
        assert_eq!(log.len(), 6);
        assert_eq!(&log[..3], ["start:0", "start:1", "start:2"]);
        assert!(log[3..].iter().all(|e| e.starts_with("done:")));
        let _ = watcher.halt().await;
    }

    #[tokio::test(start_paused = true)]
    async fn failing_handler_fails_the_watcher() {
        let scope = Scope::new(Config::default());
        let h = handler(|_, _| async { Err(TaskError::fail("bad")) });
        let watcher = scope.spawn(move |s| async move { take_every(&s, "*", h).await });
        settle().await;

        scope.put(Action::new("anything"));
        assert_eq!(watcher.await, Err(TaskError::fail("bad")));
    }

    #[tokio::test(start_paused = true)]
    async fn closed_bus_ends_the_watcher() {
        let scope = Scope::new(Config::default());
        let (h, _) = recording(0);
        let watcher = scope.spawn(move |s| async move { take_every(&s, "*", h).await });
        settle().await;
        scope.bus().close();
        assert_eq!(watcher.await, Ok(()));
    }
}
