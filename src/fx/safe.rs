//! # Failure capture.
//!
//! [`safe`] awaits work and returns its outcome as a value: errors stay
//! errors and panics become [`TaskError::Panicked`]. It never unwinds into
//! the caller.

use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::error::TaskError;

/// Outcome of a unit of work.
pub type Outcome<T> = Result<T, TaskError>;

/// Runs `fut`, converting panics into [`TaskError::Panicked`].
///
/// # Example
/// ```rust
/// use effectvisor::{safe, TaskError};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let ok = safe(async { Ok::<_, TaskError>(1) }).await;
/// assert_eq!(ok, Ok(1));
///
/// let caught = safe(async {
///     if true { panic!("nope") }
///     Ok::<u8, TaskError>(0)
/// })
/// .await;
/// assert!(matches!(caught, Err(TaskError::Panicked { .. })));
/// # }
/// ```
pub async fn safe<T, F>(fut: F) -> Outcome<T>
where
    F: Future<Output = Outcome<T>>,
{
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(panic) => Err(TaskError::panicked(panic)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn errors_are_values() {
        let res: Outcome<()> = safe(async { Err(TaskError::fail("bad input")) }).await;
        assert_eq!(res, Err(TaskError::fail("bad input")));
    }

    #[tokio::test]
    async fn panics_with_non_string_payloads_are_wrapped() {
        let res: Outcome<()> = safe(async {
            if true {
                std::panic::panic_any(7_u32);
            }
            Ok(())
        })
        .await;
        assert_eq!(
            res,
            Err(TaskError::Panicked {
                info: "non-string panic payload".into()
            })
        );
    }
}
