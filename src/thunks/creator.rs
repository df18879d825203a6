//! # Effect declarations and action creators.
//!
//! [`Declare`] is what [`Thunks::create`](crate::Thunks::create) accepts; every
//! accepted shape converts into it:
//!
//! ```text
//! ()                                  default middleware, registry strategy
//! CreateOptions                       custom strategy
//! Middleware | Vec<Middleware>        middleware (lists are composed)
//! (CreateOptions, Middleware | Vec)   both
//! ```
//!
//! [`ActionCreator`] is the handle returned for a declared effect.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::actions::{Action, Pattern, Target};
use crate::core::Scope;
use crate::error::TaskError;
use crate::middleware::{Middleware, compose};
use crate::strategies::Strategy;
use crate::thunks::context::{EffectPayload, ThunkCtx};
use crate::thunks::key::create_key;
use crate::thunks::registry::Thunks;

/// Per-effect options.
#[derive(Clone, Default)]
pub struct CreateOptions {
    /// Strategy watching this effect; the registry default when `None`.
    pub supervisor: Option<Arc<dyn Strategy>>,
}

impl CreateOptions {
    /// Options with a custom strategy.
    pub fn supervisor(strategy: impl Strategy) -> Self {
        Self {
            supervisor: Some(Arc::new(strategy)),
        }
    }
}

impl fmt::Debug for CreateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateOptions")
            .field("supervisor", &self.supervisor.as_ref().map(|s| s.name()))
            .finish()
    }
}

/// Normalized arguments of `create()`.
pub struct Declare<C> {
    pub(crate) options: CreateOptions,
    pub(crate) middleware: Option<Middleware<C>>,
}

impl<C> From<()> for Declare<C> {
    fn from(_: ()) -> Self {
        Self {
            options: CreateOptions::default(),
            middleware: None,
        }
    }
}

impl<C> From<CreateOptions> for Declare<C> {
    fn from(options: CreateOptions) -> Self {
        Self {
            options,
            middleware: None,
        }
    }
}

impl<C> From<Middleware<C>> for Declare<C> {
    fn from(mw: Middleware<C>) -> Self {
        Self {
            options: CreateOptions::default(),
            middleware: Some(mw),
        }
    }
}

impl<C: ThunkCtx> From<Vec<Middleware<C>>> for Declare<C> {
    fn from(list: Vec<Middleware<C>>) -> Self {
        Self {
            options: CreateOptions::default(),
            middleware: Some(compose(list).into_middleware()),
        }
    }
}

impl<C> From<(CreateOptions, Middleware<C>)> for Declare<C> {
    fn from((options, mw): (CreateOptions, Middleware<C>)) -> Self {
        Self {
            options,
            middleware: Some(mw),
        }
    }
}

impl<C: ThunkCtx> From<(CreateOptions, Vec<Middleware<C>>)> for Declare<C> {
    fn from((options, list): (CreateOptions, Vec<Middleware<C>>)) -> Self {
        Self {
            options,
            middleware: Some(compose(list).into_middleware()),
        }
    }
}

/// What [`ActionCreator::run`] executes.
#[derive(Clone, Debug, PartialEq)]
pub enum RunInput {
    /// A complete action (e.g. one taken from the bus).
    Action(Action),
    /// Options to build the action from.
    Options(Value),
}

impl From<Action> for RunInput {
    fn from(a: Action) -> Self {
        RunInput::Action(a)
    }
}

impl From<Value> for RunInput {
    fn from(v: Value) -> Self {
        RunInput::Options(v)
    }
}

impl From<()> for RunInput {
    fn from(_: ()) -> Self {
        RunInput::Options(Value::Null)
    }
}

/// Handle to a declared effect.
///
/// Its `Display` output is the effect's action type, which is also its name.
/// Each `create()` yields a distinct declaration: its actions run its own
/// middleware even when another effect shares the name.
pub struct ActionCreator<C: ThunkCtx> {
    pub(crate) name: String,
    pub(crate) decl: u64,
    pub(crate) thunks: Thunks<C>,
}

impl<C: ThunkCtx> Clone for ActionCreator<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            decl: self.decl,
            thunks: self.thunks.clone(),
        }
    }
}

impl<C: ThunkCtx> ActionCreator<C> {
    /// Effect name (and action type).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the effect's action for `options` (`Value::Null` for none).
    ///
    /// Logs a warning when the registry is not registered anywhere yet: the
    /// action is still produced, but nothing will handle it.
    pub fn call(&self, options: impl Into<Value>) -> Action {
        if !self.thunks.is_registered() {
            warn!(effect = %self.name, "effect called before register(); nothing will handle it");
        }
        self.build(options.into())
    }

    /// Builds the effect's action without options.
    pub fn action(&self) -> Action {
        self.call(Value::Null)
    }

    fn build(&self, options: Value) -> Action {
        let payload = EffectPayload {
            key: create_key(&self.name, &options),
            name: self.name.clone(),
            options,
            decl: Some(self.decl),
        };
        let payload = serde_json::to_value(payload).unwrap_or(Value::Null);
        Action::new(self.name.clone()).with_payload(payload)
    }

    /// Runs the pipeline directly (bypassing the bus) and returns the
    /// resulting context.
    pub async fn run(&self, scope: &Scope, input: impl Into<RunInput>) -> Result<C, TaskError> {
        let action = match input.into() {
            RunInput::Action(action) => action,
            RunInput::Options(options) => self.build(options),
        };
        self.thunks.on_api(scope.clone(), action).await
    }

    /// Installs a dynamic override composed after the static middleware.
    ///
    /// Replaces any previous override; [`Thunks::reset`] removes it.
    pub fn use_middleware(&self, mw: Middleware<C>) {
        self.thunks.set_dynamic(self.decl, mw);
    }
}

impl<C: ThunkCtx> fmt::Display for ActionCreator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl<C: ThunkCtx> fmt::Debug for ActionCreator<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ActionCreator").field(&self.name).finish()
    }
}

impl<C: ThunkCtx> From<&ActionCreator<C>> for Pattern {
    fn from(c: &ActionCreator<C>) -> Self {
        Pattern::Type(c.name.clone())
    }
}

impl<C: ThunkCtx> From<&ActionCreator<C>> for Target {
    fn from(c: &ActionCreator<C>) -> Self {
        Target::Effect(c.name.clone())
    }
}
