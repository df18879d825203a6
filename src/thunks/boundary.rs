//! # Error boundary.
//!
//! [`catch_errors`] is a middleware for the front of a global stack: it runs
//! the rest of the pipeline under [`safe`], stores a failure in `ctx.result`
//! and logs it, so dispatch itself succeeds.
//!
//! ```text
//! catch_errors ─► safe(next) ─┬─ Ok  ─► result left as the pipeline set it
//!                             └─ Err ─► ctx.result = Err(e), error! log, Ok(())
//! ```

use tracing::error;

use crate::fx::safe;
use crate::middleware::Middleware;
use crate::thunks::context::ThunkCtx;

/// Middleware that turns pipeline failures (errors and panics) into
/// `ctx.result = Err(..)` instead of propagating them.
pub fn catch_errors<C: ThunkCtx>() -> Middleware<C> {
    Middleware::new(|ctx: &mut C, next| {
        Box::pin(async move {
            if let Err(err) = safe(next.run(ctx)).await {
                let base = ctx.context_mut();
                error!(effect = %base.name, key = %base.key, error = %err, "effect failed; check the endpoint");
                base.result = Err(err);
            }
            Ok(())
        })
    })
}
