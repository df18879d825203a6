//! # Supervision: restart-on-failure loops.
//!
//! ```text
//! supervise(op, backoff)
//!
//! attempt = 1, wait = backoff(1)
//! while let Some(delay) = wait {
//!   ├─► run op in a fresh child scope (panics captured)
//!   │     ├─ Ok  ──► attempt = 0
//!   │     └─ Err ──► put {type:"supervise", payload:error, meta:"…waiting Nms…"}
//!   │                warn!, sleep(delay)
//!   └─► attempt += 1, wait = backoff(attempt)
//! }
//! ```
//!
//! A supervised op is expected to be a long-running loop; an op that returns
//! successfully is started again right away. The loop ends quietly when the
//! schedule is exhausted or when the bus has been closed.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::actions::Action;
use crate::core::{Op, Scope, op};
use crate::fx::parallel::{Parallel, parallel};
use crate::policies::Backoff;

/// Default number of consecutive failures tolerated by [`supervise_backoff`].
pub const SUPERVISE_MAX_ATTEMPTS: u32 = 10;

/// The standard supervisor schedule: `2^attempt × 10ms`, `None` after
/// [`SUPERVISE_MAX_ATTEMPTS`] failures.
///
/// # Example
/// ```
/// use std::time::Duration;
/// use effectvisor::supervise_backoff;
///
/// assert_eq!(supervise_backoff(1), Some(Duration::from_millis(20)));
/// assert_eq!(supervise_backoff(10), Some(Duration::from_millis(10_240)));
/// assert_eq!(supervise_backoff(11), None);
/// ```
pub fn supervise_backoff(attempt: u32) -> Option<Duration> {
    supervise_backoff_with(attempt, SUPERVISE_MAX_ATTEMPTS)
}

/// [`supervise_backoff`] with a custom attempt limit.
pub fn supervise_backoff_with(attempt: u32, max: u32) -> Option<Duration> {
    if attempt > max {
        return None;
    }
    2u64.checked_pow(attempt)
        .and_then(|p| p.checked_mul(10))
        .map(Duration::from_millis)
}

/// Wraps `work` in a retry loop driven by `backoff`.
pub fn supervise<T, B>(work: Op<T>, backoff: B) -> Op<()>
where
    T: Send + 'static,
    B: Backoff,
{
    let backoff = Arc::new(backoff);
    op(move |scope: Scope| {
        let work = Arc::clone(&work);
        let backoff = Arc::clone(&backoff);
        async move {
            let mut attempt = 1;
            let mut wait = backoff.delay(attempt);
            while let Some(delay) = wait {
                let run = Arc::clone(&work);
                match scope.call(move |s| run(s)).await {
                    Ok(_) => {
                        if scope.bus().is_closed() {
                            debug!("bus closed; supervisor exits");
                            return Ok(());
                        }
                        attempt = 0;
                    }
                    Err(err) => {
                        warn!(
                            error = %err,
                            label = err.as_label(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "supervised operation failed; restarting"
                        );
                        scope.put(Action::supervise(&err, delay.as_millis()));
                        tokio::time::sleep(delay).await;
                    }
                }
                attempt += 1;
                wait = backoff.delay(attempt);
            }
            debug!(attempt, "backoff exhausted; supervisor exits");
            Ok(())
        }
    })
}

/// Supervises every op with the scope's [`Config::backoff`](crate::Config::backoff)
/// and runs them in parallel.
pub fn keep_alive<T>(scope: &Scope, ops: Vec<Op<T>>) -> Parallel<()>
where
    T: Send + 'static,
{
    keep_alive_with(scope, ops, scope.config().backoff)
}

/// Like [`keep_alive`] with a custom schedule.
pub fn keep_alive_with<T, B>(scope: &Scope, ops: Vec<Op<T>>, backoff: B) -> Parallel<()>
where
    T: Send + 'static,
    B: Backoff + Clone,
{
    let supervised = ops
        .into_iter()
        .map(|work| supervise(work, backoff.clone()))
        .collect();
    parallel(scope, supervised)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::SUPERVISE;
    use crate::core::Config;
    use crate::error::TaskError;
    use crate::policies::BackoffPolicy;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn backoff_curve() {
        for a in 1..=10 {
            assert_eq!(
                supervise_backoff(a),
                Some(Duration::from_millis(2u64.pow(a) * 10))
            );
        }
        assert_eq!(supervise_backoff(11), None);
        assert_eq!(supervise_backoff(1000), None);
        assert_eq!(supervise_backoff_with(3, 2), None);
        assert_eq!(supervise_backoff_with(2, 2), Some(Duration::from_millis(40)));
    }

    #[tokio::test(start_paused = true)]
    async fn restarts_until_success_then_keeps_running() {
        let scope = Scope::new(Config::default());
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let flaky: Op<()> = op(move |s: Scope| {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    return Err(TaskError::fail(format!("run {n}")));
                }
                s.take("never").await;
                Ok(())
            }
        });

        let mut diagnostics = scope.bus().subscribe(SUPERVISE);
        let task = scope.spawn(move |s| supervise(flaky, supervise_backoff)(s));

        let first = diagnostics.next().await.unwrap();
        assert_eq!(first.payload, Some(json!("execution failed: run 0")));
        assert_eq!(
            first.meta,
            Some(json!("Exception caught, waiting 20ms before restarting operation"))
        );
        let second = diagnostics.next().await.unwrap();
        assert_eq!(
            second.meta,
            Some(json!("Exception caught, waiting 40ms before restarting operation"))
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!task.is_finished());
        assert_eq!(task.halt().await, Err(TaskError::Canceled));
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_when_schedule_is_exhausted() {
        let scope = Scope::new(Config::default());
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let broken: Op<()> = op(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TaskError::fail("down"))
            }
        });

        let backoff = |attempt: u32| supervise_backoff_with(attempt, 3);
        let res = scope.call(move |s| supervise(broken, backoff)(s)).await;
        assert_eq!(res, Ok(()));
        assert_eq!(runs.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn panics_are_supervised_like_errors() {
        let scope = Scope::new(Config::default());
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let panicky: Op<()> = op(move |_| {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first run explodes");
                }
                Err(TaskError::fail("then fails"))
            }
        });
        let once = |attempt: u32| supervise_backoff_with(attempt, 2);
        assert_eq!(scope.call(move |s| supervise(panicky, once)(s)).await, Ok(()));
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_runs_every_loop() {
        let scope = Scope::new(Config::default());
        let started = Arc::new(AtomicU32::new(0));
        let ops: Vec<Op<()>> = (0..3)
            .map(|_| {
                let started = started.clone();
                op(move |s: Scope| {
                    let started = started.clone();
                    async move {
                        started.fetch_add(1, Ordering::SeqCst);
                        s.take("never").await;
                        Ok(())
                    }
                })
            })
            .collect();

        let group = keep_alive(&scope, ops);
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);
        group.halt().await;
    }

    #[tokio::test(start_paused = true)]
    async fn keep_alive_restarts_on_the_config_schedule() {
        let cfg = Config {
            backoff: BackoffPolicy {
                first: Duration::from_millis(100),
                max_attempts: 2,
                ..BackoffPolicy::default()
            },
            ..Config::default()
        };
        let scope = Scope::new(cfg);
        let runs = Arc::new(AtomicU32::new(0));
        let counter = runs.clone();
        let failing: Op<()> = op(move |_| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(TaskError::fail("down"))
            }
        });

        let group = keep_alive(&scope, vec![failing]);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 2);
        let _ = group.await;
    }
}
