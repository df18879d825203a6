//! Error types used by the effectvisor runtime and effects.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] raised by the orchestration runtime itself (misuse, lifecycle).
//! - [`TaskError`] raised by individual units of work (effects, handlers, ops).
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging.
//! `TaskError` is `Clone` because a single outcome is fanned out to several
//! channels by [`parallel`](crate::parallel).

use std::any::Any;
use std::time::Duration;

use thiserror::Error;

/// # Errors produced by the effectvisor runtime.
///
/// These represent misuse of the runtime API or failures of the runtime
/// lifecycle, as opposed to failures inside user work.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// A middleware invoked its `next` continuation more than once.
    #[error("next() called multiple times")]
    NextCalledMultipleTimes,

    /// An action type or endpoint name was empty.
    #[error("name must not be empty")]
    EmptyName,

    /// A managed resource was read before its registry was registered.
    #[error("resource {name:?} read before activation; call register() first")]
    NotActivated {
        /// Name the resource was declared with.
        name: String,
    },

    /// A payload could not be decoded into the expected shape.
    #[error("invalid {kind} payload: {reason}")]
    InvalidPayload {
        /// What was being decoded.
        kind: &'static str,
        /// Decoder message.
        reason: String,
    },

    /// Shutdown grace period was exceeded; some tasks did not stop in time.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Number of tasks still alive when the grace period ran out.
        stuck: usize,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use effectvisor::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::EmptyName.as_label(), "runtime_empty_name");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::NextCalledMultipleTimes => "runtime_next_called_twice",
            RuntimeError::EmptyName => "runtime_empty_name",
            RuntimeError::NotActivated { .. } => "runtime_not_activated",
            RuntimeError::InvalidPayload { .. } => "runtime_invalid_payload",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck tasks={stuck}")
            }
            other => other.to_string(),
        }
    }
}

/// # Errors produced by units of work.
///
/// Anything that fails inside an effect, handler or combinator surfaces as a
/// `TaskError`. Panics are caught at task boundaries and reported as
/// [`TaskError::Panicked`].
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Work failed with an error message.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// Work panicked; the payload was captured as text.
    #[error("panicked: {info}")]
    Panicked {
        /// Panic payload rendered as a string.
        info: String,
    },

    /// Work was halted before it could finish.
    #[error("context cancelled")]
    Canceled,

    /// The runtime rejected an operation.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`].
    pub fn fail(error: impl Into<String>) -> Self {
        TaskError::Fail {
            error: error.into(),
        }
    }

    /// Builds a [`TaskError::Panicked`] from a caught panic payload.
    pub fn panicked(payload: Box<dyn Any + Send>) -> Self {
        TaskError::Panicked {
            info: panic_message(payload.as_ref()),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use effectvisor::TaskError;
    ///
    /// assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
    /// assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Panicked { .. } => "task_panicked",
            TaskError::Canceled => "task_canceled",
            TaskError::Runtime(e) => e.as_label(),
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Panicked { info } => format!("panic: {info}"),
            TaskError::Canceled => "context cancelled".to_string(),
            TaskError::Runtime(e) => e.as_message(),
        }
    }

    /// True when the work was halted rather than failing on its own.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

impl From<anyhow::Error> for TaskError {
    fn from(err: anyhow::Error) -> Self {
        TaskError::Fail {
            error: format!("{err:#}"),
        }
    }
}

impl From<serde_json::Error> for TaskError {
    fn from(err: serde_json::Error) -> Self {
        TaskError::Runtime(RuntimeError::InvalidPayload {
            kind: "json",
            reason: err.to_string(),
        })
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
