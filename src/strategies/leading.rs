use async_trait::async_trait;

use crate::actions::Pattern;
use crate::core::Scope;
use crate::error::TaskError;
use crate::strategies::{Handler, Strategy};

/// Runs one handler to completion before listening again; matches that
/// arrive while it runs are dropped.
#[derive(Clone, Copy, Debug, Default)]
pub struct TakeLeading;

#[async_trait]
impl Strategy for TakeLeading {
    fn name(&self) -> &'static str {
        "take_leading"
    }

    async fn watch(
        &self,
        scope: Scope,
        pattern: Pattern,
        handler: Handler,
    ) -> Result<(), TaskError> {
        loop {
            // Fresh subscription per round, so nothing is buffered mid-run.
            let action = scope.take(pattern.clone()).await;
            if action.is_closed() {
                return Ok(());
            }
            let h = handler.clone();
            scope.call(move |s| h(s, action)).await?;
        }
    }
}

/// Runs [`TakeLeading`] in `scope`.
pub async fn take_leading(
    scope: &Scope,
    pattern: impl Into<Pattern>,
    handler: Handler,
) -> Result<(), TaskError> {
    TakeLeading.watch(scope.clone(), pattern.into(), handler).await
}
