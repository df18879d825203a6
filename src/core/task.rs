//! # Task handles and operation factories.
//!
//! - [`Task`] is the handle to work spawned with [`Scope::spawn`]. Awaiting it
//!   yields the work's result; [`Task::halt`] cancels it and waits until its
//!   cleanup (drop guards, child tasks) has finished.
//! - [`Op`] is a re-runnable factory of work: every call produces a fresh
//!   future bound to the given scope. Supervisors and combinators take `Op`s
//!   because they may need to start the same work more than once.
//!
//! ## Example
//! ```rust
//! use effectvisor::{op, Config, Op, Scope, TaskError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), TaskError> {
//! let hello: Op<&'static str> = op(|_scope: Scope| async { Ok("hello") });
//!
//! let scope = Scope::new(Config::default());
//! let task = scope.spawn(|s| hello(s));
//! assert_eq!(task.await?, "hello");
//! # Ok(())
//! # }
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::core::scope::Scope;
use crate::error::TaskError;

/// Boxed unit of work returning `Result<T, TaskError>`.
pub type BoxOp<'a, T = ()> = BoxFuture<'a, Result<T, TaskError>>;

/// Re-runnable operation: a shared factory producing fresh work per call.
pub type Op<T = ()> = Arc<dyn Fn(Scope) -> BoxOp<'static, T> + Send + Sync>;

/// Wraps a closure as an [`Op`].
pub fn op<T, F, Fut>(f: F) -> Op<T>
where
    F: Fn(Scope) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
{
    Arc::new(move |scope| Box::pin(f(scope)))
}

/// Handle to spawned work.
///
/// Dropping the handle does **not** stop the work; it stays owned by the
/// scope that spawned it and is halted together with that scope.
#[must_use = "a dropped Task keeps running until its scope is halted"]
#[derive(Debug)]
pub struct Task<T> {
    handle: JoinHandle<Result<T, TaskError>>,
    token: CancellationToken,
}

impl<T> Task<T> {
    pub(crate) fn new(handle: JoinHandle<Result<T, TaskError>>, token: CancellationToken) -> Self {
        Self { handle, token }
    }

    /// Requests cancellation without waiting.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Cancels the work and waits until it (and its subtree) has exited.
    ///
    /// Returns the work's result if it finished before noticing the cancel,
    /// otherwise [`TaskError::Canceled`].
    pub async fn halt(self) -> Result<T, TaskError> {
        self.token.cancel();
        self.await
    }

    /// True once the work has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Token cancelled when this task is halted.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

fn join_error(err: JoinError) -> TaskError {
    if err.is_panic() {
        TaskError::panicked(err.into_panic())
    } else {
        TaskError::Canceled
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, TaskError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(res)) => Poll::Ready(res),
            Poll::Ready(Err(err)) => Poll::Ready(Err(join_error(err))),
            Poll::Pending => Poll::Pending,
        }
    }
}
