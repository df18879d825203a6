use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::actions::{Action, Pattern};
use crate::core::{Config, Op, Scope, op};
use crate::error::TaskError;
use crate::fx::race;
use crate::strategies::{Handler, Strategy};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Arm {
    Fire,
    Cancel,
}

/// Polling: a trigger starts running the handler every interval until a
/// cancel action arrives, then the strategy waits for the next trigger.
///
/// The interval is the trigger's `payload.timer` (or `payload.options.timer`)
/// in milliseconds when present and non-zero, else the configured default.
/// Without an explicit cancel pattern, the trigger pattern itself cancels,
/// so triggers toggle polling on and off.
#[derive(Clone, Debug)]
pub struct Poll {
    interval: Duration,
    cancel: Option<Pattern>,
}

impl Default for Poll {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Poll {
    /// Polls every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            cancel: None,
        }
    }

    /// Uses [`Config::poll_interval`].
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.poll_interval)
    }

    /// Stops polling when `pattern` matches instead of on the next trigger.
    pub fn with_cancel(mut self, pattern: impl Into<Pattern>) -> Self {
        self.cancel = Some(pattern.into());
        self
    }

    fn interval_for(&self, action: &Action) -> Duration {
        let payload = action.payload.as_ref();
        payload
            .and_then(|p| p.get("timer"))
            .or_else(|| payload.and_then(|p| p.pointer("/options/timer")))
            .and_then(Value::as_u64)
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(self.interval)
    }
}

#[async_trait]
impl Strategy for Poll {
    fn name(&self) -> &'static str {
        "poll"
    }

    async fn watch(
        &self,
        scope: Scope,
        pattern: Pattern,
        handler: Handler,
    ) -> Result<(), TaskError> {
        let cancel = self.cancel.clone().unwrap_or_else(|| pattern.clone());
        loop {
            let trigger = scope.take(pattern.clone()).await;
            if trigger.is_closed() {
                return Ok(());
            }
            let interval = self.interval_for(&trigger);
            debug!(action = %trigger.kind, ?interval, "poll: started");

            let fire: Op<Option<Action>> = {
                let handler = handler.clone();
                op(move |s: Scope| {
                    let handler = handler.clone();
                    let trigger = trigger.clone();
                    async move {
                        loop {
                            let (h, a) = (handler.clone(), trigger.clone());
                            if let Err(err) = s.call(move |c| h(c, a)).await {
                                return Err::<Option<Action>, TaskError>(err);
                            }
                            tokio::time::sleep(interval).await;
                        }
                    }
                })
            };
            let stop: Op<Option<Action>> = {
                let cancel = cancel.clone();
                op(move |s: Scope| {
                    let cancel = cancel.clone();
                    async move { Ok(Some(s.take(cancel).await)) }
                })
            };

            let out = race(&scope, vec![(Arm::Fire, fire), (Arm::Cancel, stop)]).await;
            match out.get(&Arm::Fire) {
                Some(Err(err)) => return Err(err.clone()),
                _ => debug!("poll: cancelled"),
            }
            if let Some(Ok(Some(action))) = out.get(&Arm::Cancel) {
                if action.is_closed() {
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::handler;
    use crate::strategies::testing::settle;
    use serde_json::json;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn counting() -> (Handler, Arc<AtomicU32>) {
        let hits = Arc::new(AtomicU32::new(0));
        let counter = hits.clone();
        let h = handler(move |_, _| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });
        (h, hits)
    }

    #[tokio::test(start_paused = true)]
    async fn polls_until_cancelled() {
        let scope = Scope::new(Config::default());
        let (h, hits) = counting();
        let poll = Poll::new(Duration::from_millis(100)).with_cancel("stop");
        let watcher = scope.spawn(move |s| async move { poll.watch(s, "start".into(), h).await });
        settle().await;

        scope.put(Action::new("start"));
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 4);

        scope.put(Action::new("stop"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert!(!watcher.is_finished());
        let _ = watcher.halt().await;
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_toggles_and_payload_sets_interval() {
        let scope = Scope::new(Config::default());
        let (h, hits) = counting();
        let watcher = scope.spawn(move |s| async move { Poll::default().watch(s, "tick".into(), h).await });
        settle().await;

        scope.put(Action::new("tick").with_payload(json!({"timer": 10})));
        tokio::time::sleep(Duration::from_millis(25)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);

        scope.put(Action::new("tick"));
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 3);
        let _ = watcher.halt().await;
    }

    #[test]
    fn interval_lookup() {
        let p = Poll::new(Duration::from_secs(5));
        let opts = Action::new("x").with_payload(json!({"options": {"timer": 250}}));
        assert_eq!(p.interval_for(&opts), Duration::from_millis(250));
        let zero = Action::new("x").with_payload(json!({"timer": 0}));
        assert_eq!(p.interval_for(&zero), Duration::from_secs(5));
    }
}
