//! # Per-dispatch context.
//!
//! Every effect run builds a fresh [`Context`] that the middleware pipeline
//! mutates. Registries can use a richer context type: anything implementing
//! [`ThunkCtx`] that wraps a `Context` (extensions such as request/response
//! state live in the wrapper).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::actions::{Action, ActionFn};
use crate::core::Scope;
use crate::error::TaskError;

/// Payload carried by registry actions: `{name, key, options, decl}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EffectPayload {
    /// Effect name.
    pub name: String,
    /// Dedup key derived from `name` and `options`.
    pub key: String,
    /// Caller-provided options (`null` when none).
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub options: Value,
    /// Declaration that built the action; routes to the latest declaration
    /// of `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decl: Option<u64>,
}

/// Mutable record threaded through an effect's middleware.
#[derive(Debug)]
pub struct Context {
    /// Effect name.
    pub name: String,
    /// Dedup key.
    pub key: String,
    /// The action that started this run.
    pub action: Action,
    /// Creator of the effect's actions.
    pub action_fn: ActionFn,
    /// Options the effect was called with.
    pub payload: Value,
    /// Outcome slot for middleware to fill; starts as `Ok(null)`.
    pub result: Result<Value, TaskError>,
    /// Scope of this run; spawn, put and take through it.
    pub scope: Scope,
    pub(crate) decl: Option<u64>,
}

/// Context types usable by a registry.
pub trait ThunkCtx: Send + 'static {
    /// Builds the context for one run.
    fn from_context(ctx: Context) -> Self;

    /// The base context.
    fn context(&self) -> &Context;

    /// The base context, mutably.
    fn context_mut(&mut self) -> &mut Context;
}

impl ThunkCtx for Context {
    fn from_context(ctx: Context) -> Self {
        ctx
    }

    fn context(&self) -> &Context {
        self
    }

    fn context_mut(&mut self) -> &mut Context {
        self
    }
}
