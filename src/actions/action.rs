//! # Actions: the messages carried by the bus.
//!
//! An [`Action`] is a typed message `{type, payload?, meta?, error?}`. Once it
//! is published it is never mutated; every subscriber receives its own clone.
//!
//! [`ActionFn`] is a minimal action creator bound to one type string, built by
//! [`create_action`]. Registry effects have a richer creator,
//! [`ActionCreator`](crate::ActionCreator).

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RuntimeError;

/// Type of the pseudo-action returned by `take` when the bus has been closed.
pub const STREAM_CLOSED: &str = "@@effectvisor/stream-closed";

/// Type of the diagnostic action published by supervisors on failure.
pub const SUPERVISE: &str = "supervise";

/// A typed message published on the action bus.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Action {
    /// Dispatch key.
    #[serde(rename = "type")]
    pub kind: String,
    /// Optional body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Optional out-of-band data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
    /// Marks the payload as an error value.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,
}

impl Action {
    /// Creates an action with only a type.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: None,
            meta: None,
            error: false,
        }
    }

    /// Sets the payload.
    #[inline]
    pub fn with_payload(mut self, payload: impl Into<Value>) -> Self {
        self.payload = Some(payload.into());
        self
    }

    /// Sets the meta field.
    #[inline]
    pub fn with_meta(mut self, meta: impl Into<Value>) -> Self {
        self.meta = Some(meta.into());
        self
    }

    /// Marks the action as carrying an error.
    #[inline]
    pub fn with_error(mut self) -> Self {
        self.error = true;
        self
    }

    /// The sentinel returned by `take` once the stream is closed.
    pub fn closed() -> Self {
        Self::new(STREAM_CLOSED)
    }

    /// True for the [`Action::closed`] sentinel.
    pub fn is_closed(&self) -> bool {
        self.kind == STREAM_CLOSED
    }

    /// Diagnostic published by a supervisor before it sleeps and restarts.
    pub(crate) fn supervise(error: &crate::TaskError, wait_ms: u128) -> Self {
        Self::new(SUPERVISE)
            .with_payload(error.to_string())
            .with_meta(format!(
                "Exception caught, waiting {wait_ms}ms before restarting operation"
            ))
            .with_error()
    }

    /// Identity used by timers and clear requests.
    ///
    /// Registry actions carry their dedup key in `payload.key`; any other
    /// action is identified by its type.
    pub fn id(&self) -> &str {
        self.payload
            .as_ref()
            .and_then(|p| p.get("key"))
            .and_then(Value::as_str)
            .unwrap_or(&self.kind)
    }
}

/// One action or a batch of them, as accepted by `put`.
#[derive(Clone, Debug, PartialEq)]
pub enum Batch {
    /// A single action.
    One(Action),
    /// Several actions delivered in order. Empty is a no-op.
    Many(Vec<Action>),
}

impl Batch {
    /// True when there is nothing to deliver.
    pub fn is_empty(&self) -> bool {
        matches!(self, Batch::Many(v) if v.is_empty())
    }
}

impl From<Action> for Batch {
    fn from(a: Action) -> Self {
        Batch::One(a)
    }
}

impl From<Vec<Action>> for Batch {
    fn from(v: Vec<Action>) -> Self {
        Batch::Many(v)
    }
}

impl IntoIterator for Batch {
    type Item = Action;
    type IntoIter = std::vec::IntoIter<Action>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Batch::One(a) => vec![a].into_iter(),
            Batch::Many(v) => v.into_iter(),
        }
    }
}

/// Action creator bound to a single type.
///
/// Its `Display` output is the type, so a creator can be used wherever a
/// pattern or an identity string is expected.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ActionFn {
    kind: String,
}

impl ActionFn {
    /// The type this creator produces.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// An action with no payload.
    pub fn action(&self) -> Action {
        Action::new(self.kind.clone())
    }

    /// An action with the given payload.
    pub fn with(&self, payload: impl Into<Value>) -> Action {
        self.action().with_payload(payload)
    }
}

impl fmt::Display for ActionFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)
    }
}

/// Builds an [`ActionFn`] for `kind`.
///
/// # Errors
/// [`RuntimeError::EmptyName`] when `kind` is empty.
///
/// # Example
/// ```
/// use effectvisor::create_action;
///
/// let inc = create_action("counter/inc").unwrap();
/// assert_eq!(inc.to_string(), "counter/inc");
/// assert_eq!(inc.with(2).payload, Some(2.into()));
/// assert!(create_action("").is_err());
/// ```
pub fn create_action(kind: impl Into<String>) -> Result<ActionFn, RuntimeError> {
    let kind = kind.into();
    if kind.is_empty() {
        return Err(RuntimeError::EmptyName);
    }
    Ok(ActionFn { kind })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_kind_as_type() {
        let a = Action::new("users/load").with_payload(json!({"id": 1}));
        let v = serde_json::to_value(&a).unwrap();
        assert_eq!(v, json!({"type": "users/load", "payload": {"id": 1}}));

        let back: Action = serde_json::from_value(v).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn id_prefers_payload_key() {
        let keyed = Action::new("fetch").with_payload(json!({"name": "fetch", "key": "fetch|1a2b3c4d"}));
        assert_eq!(keyed.id(), "fetch|1a2b3c4d");
        assert_eq!(Action::new("plain").id(), "plain");
        assert_eq!(Action::new("num").with_payload(3).id(), "num");
    }

    #[test]
    fn batches_flatten_in_order() {
        let b: Batch = vec![Action::new("a"), Action::new("b")].into();
        let kinds: Vec<_> = b.into_iter().map(|a| a.kind).collect();
        assert_eq!(kinds, ["a", "b"]);
        assert!(Batch::from(Vec::new()).is_empty());
        assert!(!Batch::from(Action::new("x")).is_empty());
    }

    #[test]
    fn supervise_diagnostic_shape() {
        let a = Action::supervise(&crate::TaskError::fail("boom"), 40);
        assert_eq!(a.kind, SUPERVISE);
        assert!(a.error);
        assert_eq!(
            a.meta,
            Some(json!("Exception caught, waiting 40ms before restarting operation"))
        );
    }
}
