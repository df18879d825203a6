use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::actions::{Action, Pattern, Target};
use crate::core::{Config, Scope, Task};
use crate::error::TaskError;
use crate::strategies::{Handler, Strategy};

/// Type of the action that clears [`Timer`] windows.
pub const CLEAR_TIMERS: &str = "clear-timers";

/// One entry of a [`clear_timers`] request.
///
/// The "clear everything" request is its own variant, so a timer whose key
/// happens to be `"*"` can still be cleared individually.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "clear", content = "id", rename_all = "snake_case")]
pub enum ClearTimer {
    /// Every active window.
    All,
    /// The window of one dedup key.
    Key(String),
    /// The window of the key carried by an action (`payload.key`, else its type).
    Action(Action),
}

impl ClearTimer {
    fn covers(&self, id: &str) -> bool {
        match self {
            ClearTimer::All => true,
            ClearTimer::Key(key) => key == id,
            ClearTimer::Action(action) => action.id() == id,
        }
    }
}

impl From<&str> for ClearTimer {
    fn from(key: &str) -> Self {
        ClearTimer::Key(key.to_string())
    }
}

impl From<String> for ClearTimer {
    fn from(key: String) -> Self {
        ClearTimer::Key(key)
    }
}

impl From<Action> for ClearTimer {
    fn from(action: Action) -> Self {
        ClearTimer::Action(action)
    }
}

impl From<Target> for ClearTimer {
    fn from(target: Target) -> Self {
        match target {
            Target::Action(action) => ClearTimer::Action(action),
            other => ClearTimer::Key(other.id().to_string()),
        }
    }
}

/// Builds a `clear-timers` action.
///
/// # Example
/// ```
/// use effectvisor::{ClearTimer, clear_timers};
///
/// let one = clear_timers(["fetchApp|00c0ffee"]);
/// let all = clear_timers([ClearTimer::All]);
/// assert_eq!(one.kind, "clear-timers");
/// assert_ne!(one, all);
/// ```
pub fn clear_timers<I>(entries: I) -> Action
where
    I: IntoIterator,
    I::Item: Into<ClearTimer>,
{
    let entries: Vec<ClearTimer> = entries.into_iter().map(Into::into).collect();
    let payload = serde_json::to_value(&entries).unwrap_or(Value::Null);
    Action::new(CLEAR_TIMERS).with_payload(payload)
}

fn clears(action: &Action, id: &str) -> bool {
    if action.kind != CLEAR_TIMERS {
        return false;
    }
    let Some(payload) = &action.payload else {
        return false;
    };
    let entries = match payload {
        Value::Array(items) => items.clone(),
        single => vec![single.clone()],
    };
    entries.into_iter().any(|entry| {
        serde_json::from_value::<ClearTimer>(entry)
            .map(|c| c.covers(id))
            .unwrap_or_else(|err| {
                trace!(error = %err, "ignoring malformed clear-timers entry");
                false
            })
    })
}

/// Per-key throttle: the first action for a dedup key runs the handler,
/// then the key is closed for `duration` (or until a matching
/// [`clear_timers`] action). Other keys are independent.
#[derive(Clone, Copy, Debug)]
pub struct Timer {
    duration: Duration,
}

impl Default for Timer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl Timer {
    /// Window of `duration` per key.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }

    /// Uses [`Config::timer_duration`].
    pub fn from_config(cfg: &Config) -> Self {
        Self::new(cfg.timer_duration)
    }
}

#[async_trait]
impl Strategy for Timer {
    fn name(&self) -> &'static str {
        "timer"
    }

    async fn watch(
        &self,
        scope: Scope,
        pattern: Pattern,
        handler: Handler,
    ) -> Result<(), TaskError> {
        let mut sub = scope.bus().subscribe(pattern);
        let (fail_tx, mut fail_rx) = mpsc::unbounded_channel::<TaskError>();
        let mut windows: HashMap<String, Task<()>> = HashMap::new();
        let duration = self.duration;

        loop {
            let action = tokio::select! {
                biased;
                Some(err) = fail_rx.recv() => return Err(err),
                next = sub.next() => match next {
                    Some(action) => action,
                    None => return Ok(()),
                },
            };

            windows.retain(|_, task| !task.is_finished());
            let key = action.id().to_string();
            if windows.contains_key(&key) {
                trace!(%key, "timer: window open, ignoring");
                continue;
            }

            let h = handler.clone();
            let fail = fail_tx.clone();
            let id = key.clone();
            let task = scope.spawn(move |s| async move {
                if let Err(err) = s.call(move |c| h(c, action)).await {
                    if !err.is_canceled() {
                        let _ = fail.send(err.clone());
                    }
                    return Err(err);
                }
                let clear = Pattern::predicate(move |a: &Action| clears(a, &id));
                tokio::select! {
                    _ = tokio::time::sleep(duration) => {},
                    _ = s.take(clear) => debug!("timer: window cleared"),
                }
                Ok(())
            });
            windows.insert(key, task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::handler;
    use crate::strategies::testing::settle;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn keyed(key: &str) -> Action {
        Action::new("fetch").with_payload(json!({"name": "fetch", "key": key}))
    }

    fn recorder() -> (Handler, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let h = handler(move |_, action: Action| {
            let sink = sink.clone();
            async move {
                sink.lock().unwrap().push(action.id().to_string());
                Ok(())
            }
        });
        (h, seen)
    }

    async fn start(scope: &Scope, timer: Timer, h: Handler) -> Task<()> {
        let task = scope.spawn(move |s| async move { timer.watch(s, "fetch".into(), h).await });
        settle().await;
        task
    }

    #[tokio::test(start_paused = true)]
    async fn same_key_runs_once_per_window() {
        let scope = Scope::new(Config::default());
        let (h, seen) = recorder();
        let watcher = start(&scope, Timer::new(Duration::from_millis(10)), h).await;

        scope.put(keyed("a"));
        settle().await;
        scope.put(keyed("a"));
        scope.put(keyed("b"));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), ["a", "b"]);

        tokio::time::sleep(Duration::from_millis(20)).await;
        scope.put(keyed("a"));
        settle().await;
        assert_eq!(*seen.lock().unwrap(), ["a", "b", "a"]);
        let _ = watcher.halt().await;
    }

    #[tokio::test(start_paused = true)]
    async fn clear_timers_reopens_keys() {
        let scope = Scope::new(Config::default());
        let (h, seen) = recorder();
        let watcher = start(&scope, Timer::new(Duration::from_secs(60)), h).await;

        scope.put(vec![keyed("a"), keyed("b"), keyed("*")]);
        settle().await;

        scope.put(clear_timers(["a"]));
        settle().await;
        scope.put(vec![keyed("a"), keyed("b")]);
        settle().await;
        assert_eq!(*seen.lock().unwrap(), ["a", "b", "*", "a"]);

        scope.put(clear_timers([keyed("b")]));
        settle().await;
        scope.put(keyed("b"));
        settle().await;
        assert_eq!(seen.lock().unwrap().len(), 5);

        scope.put(clear_timers([ClearTimer::All]));
        settle().await;
        scope.put(vec![keyed("a"), keyed("b"), keyed("*")]);
        settle().await;
        assert_eq!(seen.lock().unwrap().len(), 8);
        let _ = watcher.halt().await;
    }

    #[test]
    fn literal_star_key_is_not_a_wildcard() {
        let only_star = clear_timers(["*"]);
        assert!(clears(&only_star, "*"));
        assert!(!clears(&only_star, "a"));
        assert!(clears(&clear_timers([ClearTimer::All]), "a"));
        assert!(!clears(&Action::new("other").with_payload(json!([])), "a"));
    }

    #[test]
    fn entries_serialize_tagged() {
        let v = serde_json::to_value(vec![ClearTimer::All, ClearTimer::from("k")]).unwrap();
        assert_eq!(v, json!([{"clear": "all"}, {"clear": "key", "id": "k"}]));
    }
}
