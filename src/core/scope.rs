//! # Scope: the structured-concurrency context.
//!
//! A [`Scope`] owns a tree of spawned work. Every task gets its own child
//! scope, so halting a task halts everything it started.
//!
//! ## Architecture
//! ```text
//! Scope (root: host id, Config, Bus, CancellationToken, TaskTracker)
//!   ├─► spawn(f) ──► Task ── child Scope (token = parent.child_token())
//!   │                          ├─► spawn(g) ──► Task ── grandchild Scope
//!   │                          └─► put / take on the shared Bus
//!   └─► shutdown(): cancel tree ─► wait ≤ grace ─► GraceExceeded | Ok
//! ```
//!
//! ## Rules
//! - **Shared bus**: all scopes of a tree publish to and take from the same [`Bus`].
//! - **Host identity**: children inherit the root's id; registries key on it.
//! - **First poll**: spawned work is always polled once, even when the scope
//!   is cancelled before the task starts, so setup up to its first await runs.
//! - **Halt order**: on cancellation the task's future is dropped first (its
//!   drop guards run), then its child scope is halted and awaited.
//! - **Completion halts children**: when a task's future returns, whatever it
//!   left running in its scope is halted before the task resolves.
//! - **Panics are isolated**: they surface as [`TaskError::Panicked`].

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::pin::pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::Poll;

use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use crate::actions::{Action, Batch, Bus, Pattern};
use crate::core::config::Config;
use crate::core::shutdown::wait_for_shutdown_signal;
use crate::core::task::Task;
use crate::error::{RuntimeError, TaskError};

static NEXT_HOST: AtomicU64 = AtomicU64::new(1);

struct Inner {
    host: u64,
    config: Arc<Config>,
    bus: Bus,
    token: CancellationToken,
    tracker: TaskTracker,
}

/// Structured-concurrency context. Cheap to clone.
#[derive(Clone)]
pub struct Scope {
    inner: Arc<Inner>,
}

impl Scope {
    /// Creates a root scope with a fresh bus.
    pub fn new(config: Config) -> Self {
        Self::with_bus(config, Bus::new())
    }

    /// Creates a root scope publishing to an existing bus.
    pub fn with_bus(config: Config, bus: Bus) -> Self {
        Self {
            inner: Arc::new(Inner {
                host: NEXT_HOST.fetch_add(1, Ordering::Relaxed),
                config: Arc::new(config),
                bus,
                token: CancellationToken::new(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    fn child(&self) -> Self {
        Self {
            inner: Arc::new(Inner {
                host: self.inner.host,
                config: Arc::clone(&self.inner.config),
                bus: self.inner.bus.clone(),
                token: self.inner.token.child_token(),
                tracker: TaskTracker::new(),
            }),
        }
    }

    /// Identity of the root scope this scope belongs to.
    pub fn id(&self) -> u64 {
        self.inner.host
    }

    /// Runtime configuration shared by the tree.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// The tree's action bus.
    pub fn bus(&self) -> &Bus {
        &self.inner.bus
    }

    /// Cancellation token of this scope.
    pub fn token(&self) -> &CancellationToken {
        &self.inner.token
    }

    /// True once this scope (or an ancestor) was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.inner.token.is_cancelled()
    }

    /// Completes once this scope is cancelled.
    pub async fn cancelled(&self) {
        self.inner.token.cancelled().await
    }

    /// Number of live tasks spawned directly into this scope.
    pub fn tasks(&self) -> usize {
        self.inner.tracker.len()
    }

    #[cfg(test)]
    pub(crate) fn tracker(&self) -> &TaskTracker {
        &self.inner.tracker
    }

    /// Spawns work into this scope.
    ///
    /// `f` receives the task's own child scope; anything it spawns there is
    /// halted when the task ends.
    pub fn spawn<T, F, Fut>(&self, f: F) -> Task<T>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        let child = self.child();
        let token = child.inner.token.clone();
        let fut = f(child.clone());

        let handle = self.inner.tracker.spawn({
            let token = token.clone();
            async move {
                let res = {
                    let mut work = pin!(AssertUnwindSafe(fut).catch_unwind());
                    match futures::poll!(work.as_mut()) {
                        Poll::Ready(res) => res,
                        Poll::Pending => tokio::select! {
                            biased;
                            _ = token.cancelled() => Ok(Err(TaskError::Canceled)),
                            res = work.as_mut() => res,
                        },
                    }
                };
                let res = res.unwrap_or_else(|panic| Err(TaskError::panicked(panic)));
                child.halt().await;
                res
            }
        });
        Task::new(handle, token)
    }

    /// Spawns work and waits for its result.
    ///
    /// If the caller is dropped first, the work is halted.
    pub async fn call<T, F, Fut>(&self, f: F) -> Result<T, TaskError>
    where
        F: FnOnce(Scope) -> Fut,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
        T: Send + 'static,
    {
        let task = self.spawn(f);
        let _guard = task.token().clone().drop_guard();
        task.await
    }

    /// Publishes one action or a batch on the tree's bus.
    pub fn put(&self, batch: impl Into<Batch>) {
        self.inner.bus.put(batch)
    }

    /// Waits for the next action matching `pattern`.
    ///
    /// Returns [`Action::closed`] if the bus closes first.
    pub async fn take(&self, pattern: impl Into<Pattern>) -> Action {
        self.inner.bus.take(pattern).await
    }

    /// Resolves once `predicate` holds.
    ///
    /// Checked immediately, then again after every published action.
    pub async fn wait_for<F>(&self, mut predicate: F)
    where
        F: FnMut() -> bool,
    {
        let mut sub = self.inner.bus.subscribe(Pattern::Any);
        while !predicate() {
            if sub.next().await.is_none() {
                return;
            }
        }
    }

    /// Cancels this scope and waits until every task in it has exited.
    pub async fn halt(&self) {
        self.inner.token.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
    }

    /// Cancels the tree and waits up to [`Config::grace`] for it to exit.
    ///
    /// # Errors
    /// [`RuntimeError::GraceExceeded`] if tasks are still alive after the grace period.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.inner.token.cancel();
        self.inner.tracker.close();

        let Some(grace) = self.inner.config.grace_period() else {
            return Ok(());
        };
        match tokio::time::timeout(grace, self.inner.tracker.wait()).await {
            Ok(()) => Ok(()),
            Err(_) => {
                let stuck = self.inner.tracker.len();
                error!(?grace, stuck, "grace period exceeded");
                Err(RuntimeError::GraceExceeded { grace, stuck })
            }
        }
    }

    /// Runs until an OS termination signal arrives (or the scope is cancelled
    /// elsewhere), then shuts down gracefully.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        tokio::select! {
            sig = wait_for_shutdown_signal() => match sig {
                Ok(name) => info!(signal = name, "shutdown requested"),
                Err(err) => warn!(error = %err, "signal handlers unavailable; shutting down"),
            },
            _ = self.cancelled() => debug!(scope = self.id(), "scope cancelled"),
        }
        self.shutdown().await
    }
}

impl std::fmt::Debug for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scope")
            .field("host", &self.inner.host)
            .field("cancelled", &self.inner.token.is_cancelled())
            .field("tasks", &self.inner.tracker.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn spawn_and_await() {
        let scope = Scope::new(Config::default());
        let task = scope.spawn(|_| async { Ok(21 * 2) });
        assert_eq!(task.await, Ok(42));
    }

    #[tokio::test]
    async fn panics_become_errors() {
        let scope = Scope::new(Config::default());
        let task = scope.spawn(|_| async {
            if true {
                panic!("kaboom");
            }
            Ok(())
        });
        assert_eq!(task.await, Err(TaskError::Panicked { info: "kaboom".into() }));
    }

    #[tokio::test(start_paused = true)]
    async fn halt_runs_cleanup_of_the_subtree() {
        let scope = Scope::new(Config::default());
        let outer_dropped = Arc::new(AtomicBool::new(false));
        let inner_dropped = Arc::new(AtomicBool::new(false));

        let task = {
            let outer = outer_dropped.clone();
            let inner = inner_dropped.clone();
            scope.spawn(move |s| async move {
                let _guard = SetOnDrop(outer);
                let _child = s.spawn(move |_| async move {
                    let _guard = SetOnDrop(inner);
                    std::future::pending::<()>().await;
                    Ok(())
                });
                std::future::pending::<()>().await;
                Ok(())
            })
        };

        tokio::time::sleep(Duration::from_millis(1)).await;
        assert_eq!(task.halt().await, Err(TaskError::Canceled));
        assert!(outer_dropped.load(Ordering::SeqCst));
        assert!(inner_dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn returning_halts_leftover_children() {
        let scope = Scope::new(Config::default());
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = dropped.clone();
        let res = scope
            .call(move |s| async move {
                let _bg = s.spawn(move |_| async move {
                    let _guard = SetOnDrop(flag);
                    std::future::pending::<()>().await;
                    Ok(())
                });
                Ok("done")
            })
            .await;
        assert_eq!(res, Ok("done"));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn work_halted_before_it_starts_still_runs_its_setup() {
        let scope = Scope::new(Config::default());
        let dropped = Arc::new(AtomicBool::new(false));
        let flag = dropped.clone();
        let task = scope.spawn(move |_| async move {
            let _guard = SetOnDrop(flag);
            std::future::pending::<()>().await;
            Ok(())
        });
        assert_eq!(task.halt().await, Err(TaskError::Canceled));
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn children_share_bus_and_host() {
        let scope = Scope::new(Config::default());
        let host = scope.id();
        let task = scope.spawn(move |s| async move {
            assert_eq!(s.id(), host);
            Ok(s.take("ping").await)
        });
        tokio::time::sleep(Duration::from_millis(1)).await;
        scope.put(Action::new("ping"));
        assert_eq!(task.await.map(|a| a.kind), Ok("ping".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_rechecks_after_each_action() {
        let scope = Scope::new(Config::default());
        let hits = Arc::new(AtomicU64::new(0));
        let waiter = {
            let hits = hits.clone();
            scope.spawn(move |s| async move {
                s.wait_for(|| hits.load(Ordering::SeqCst) >= 2).await;
                Ok(())
            })
        };
        tokio::time::sleep(Duration::from_millis(1)).await;
        hits.store(1, Ordering::SeqCst);
        scope.put(Action::new("tick"));
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(!waiter.is_finished());
        hits.store(2, Ordering::SeqCst);
        scope.put(Action::new("tick"));
        assert_eq!(waiter.await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_reports_stuck_tasks() {
        let cfg = Config {
            grace: Duration::from_millis(50),
            ..Config::default()
        };
        let scope = Scope::new(cfg);
        scope.tracker().spawn(std::future::pending::<()>());
        assert_eq!(
            scope.shutdown().await,
            Err(RuntimeError::GraceExceeded {
                grace: Duration::from_millis(50),
                stuck: 1
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_clean_when_tasks_cooperate() {
        let scope = Scope::new(Config::default());
        let _t = scope.spawn(|s| async move {
            s.take("never").await;
            Ok(())
        });
        assert_eq!(scope.shutdown().await, Ok(()));
        assert_eq!(scope.tasks(), 0);
    }
}
