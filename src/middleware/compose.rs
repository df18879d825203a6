//! # Onion-style middleware composition.
//!
//! [`compose`] turns an ordered list of [`Middleware`] into one pipeline.
//! Each middleware receives the mutable context and a [`Next`] continuation;
//! calling `next.run(ctx)` runs the rest of the stack.
//!
//! ```text
//! compose([m1, m2, m3]).run(ctx)
//!
//!   m1 pre ─► m2 pre ─► m3 pre ─► (tail)
//!                                   │
//!   m1 post ◄─ m2 post ◄─ m3 post ◄─┘
//! ```
//!
//! ## Rules
//! - The tail is either nothing, a trailing middleware (`run_with`), or the
//!   outer pipeline's `Next` when a composition is nested (`into_middleware`).
//! - Each step may call `next` at most once; a second call fails with
//!   [`RuntimeError::NextCalledMultipleTimes`].
//! - Not calling `next` short-circuits the remaining stack.
//! - Errors propagate outwards unless a middleware handles the result of `next`.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::core::BoxOp;
use crate::error::{RuntimeError, TaskError};

type MiddlewareFn<C> = dyn for<'a> Fn(&'a mut C, Next<'a, C>) -> BoxOp<'a> + Send + Sync;

/// An interceptor `(ctx, next)` around the rest of a pipeline.
///
/// # Example
/// ```rust
/// use effectvisor::Middleware;
///
/// let log: Middleware<Vec<&'static str>> = Middleware::new(|ctx: &mut Vec<&'static str>, next| {
///     Box::pin(async move {
///         ctx.push("before");
///         next.run(ctx).await?;
///         ctx.push("after");
///         Ok(())
///     })
/// });
/// ```
pub struct Middleware<C>(Arc<MiddlewareFn<C>>);

impl<C> Clone for Middleware<C> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<C> fmt::Debug for Middleware<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Middleware(..)")
    }
}

impl<C: Send + 'static> Middleware<C> {
    /// Wraps a closure returning a boxed future.
    pub fn new<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut C, Next<'a, C>) -> BoxOp<'a> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    /// Middleware that only calls `next`.
    pub fn passthrough() -> Self {
        Self::new(|ctx, next| next.run(ctx))
    }

    /// Invokes the middleware.
    pub fn call<'a>(&self, ctx: &'a mut C, next: Next<'a, C>) -> BoxOp<'a> {
        (self.0)(ctx, next)
    }
}

/// Continuation handed to a middleware.
pub struct Next<'a, C> {
    dispatch: &'a Dispatch<'a, C>,
    index: usize,
}

impl<C> Clone for Next<'_, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<C> Copy for Next<'_, C> {}

impl<'a, C: Send + 'static> Next<'a, C> {
    /// Runs the remainder of the pipeline.
    pub fn run<'b>(&self, ctx: &'b mut C) -> BoxOp<'b>
    where
        'a: 'b,
    {
        let dispatch: &'b Dispatch<'b, C> = self.dispatch;
        dispatch.call(self.index, ctx)
    }
}

enum Tail<'a, C> {
    Done,
    Middleware(&'a Middleware<C>),
    Next(Next<'a, C>),
}

struct Dispatch<'a, C> {
    stack: &'a [Middleware<C>],
    tail: Tail<'a, C>,
    /// Highest step entered, plus one (`0` = none).
    entered: AtomicUsize,
}

impl<'a, C: Send + 'static> Dispatch<'a, C> {
    fn new(stack: &'a [Middleware<C>], tail: Tail<'a, C>) -> Self {
        Self {
            stack,
            tail,
            entered: AtomicUsize::new(0),
        }
    }

    fn call(&'a self, i: usize, ctx: &'a mut C) -> BoxOp<'a> {
        if self.entered.fetch_max(i + 1, Ordering::SeqCst) > i {
            return Box::pin(async { Err(RuntimeError::NextCalledMultipleTimes.into()) });
        }
        let next = Next {
            dispatch: self,
            index: i + 1,
        };
        let len = self.stack.len();
        if i < len {
            return self.stack[i].call(ctx, next);
        }
        match (&self.tail, i == len) {
            (Tail::Middleware(last), true) => last.call(ctx, next),
            (Tail::Next(outer), true) => outer.run(ctx),
            _ => Box::pin(async { Ok(()) }),
        }
    }
}

/// A composed pipeline. Cheap to clone.
pub struct Compose<C> {
    stack: Arc<[Middleware<C>]>,
}

impl<C> Clone for Compose<C> {
    fn clone(&self) -> Self {
        Self {
            stack: Arc::clone(&self.stack),
        }
    }
}

impl<C> fmt::Debug for Compose<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compose")
            .field("len", &self.stack.len())
            .finish()
    }
}

/// Composes middleware into a single pipeline, outermost first.
pub fn compose<C, I>(middleware: I) -> Compose<C>
where
    I: IntoIterator<Item = Middleware<C>>,
{
    Compose {
        stack: middleware.into_iter().collect(),
    }
}

impl<C: Send + 'static> Compose<C> {
    /// Number of composed middleware.
    pub fn len(&self) -> usize {
        self.stack.len()
    }

    /// True when nothing was composed.
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Runs the pipeline against `ctx`.
    pub async fn run(&self, ctx: &mut C) -> Result<(), TaskError> {
        self.run_with(ctx, None).await
    }

    /// Runs the pipeline with `last` as the innermost step.
    pub async fn run_with(
        &self,
        ctx: &mut C,
        last: Option<&Middleware<C>>,
    ) -> Result<(), TaskError> {
        let tail = last.map_or(Tail::Done, Tail::Middleware);
        let dispatch = Dispatch::new(&self.stack, tail);
        dispatch.call(0, ctx).await
    }

    /// Turns the pipeline into a single middleware whose tail is the
    /// enclosing pipeline's `next`.
    pub fn into_middleware(self) -> Middleware<C> {
        Middleware::new(move |ctx, next| {
            let stack = Arc::clone(&self.stack);
            Box::pin(async move {
                let dispatch = Dispatch::new(&stack, Tail::Next(next));
                dispatch.call(0, ctx).await
            })
        })
    }
}
