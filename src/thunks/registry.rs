//! # Effect registry.
//!
//! [`Thunks`] owns every effect declared through it and activates them inside
//! the scopes it is registered into.
//!
//! ## Architecture
//! ```text
//! create(name, decl) ──► statics[id] = middleware, latest[name] = id
//!                    ├─► visors.push(watch(name) under strategy)   (first declaration only)
//!                    └─► signal.send(visor) ──┐
//!                                             ▼
//! register(scope) ──► mark host ──► supervise(each known visor)
//!                               └─► listen on signal ─► supervise(late visors)
//!
//! action{type:name} ─► strategy ─► on_api ─► Context ─► compose(global stack)
//!                                                          └─► routes(): dynamics[id] | statics[id] | next
//! ```
//!
//! ## Rules
//! - Registries are fully isolated from each other.
//! - A registry is active at most once per host scope; a second `register()`
//!   in the same host warns and returns.
//! - The global stack must include [`Thunks::routes`] for per-effect middleware to run.
//! - Every `create()` is a separate declaration with its own middleware; its
//!   actions carry the declaration id, so two creators sharing a name stay
//!   independent. Redeclaring a name warns and reuses the existing watcher.
//! - Actions without a declaration id route to the latest declaration of their name.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::actions::{Action, Pattern, create_action};
use crate::core::{Config, Op, Scope, Task, op};
use crate::error::{RuntimeError, TaskError};
use crate::fx::supervise;
use crate::middleware::{Middleware, compose};
use crate::strategies::{Strategy, TakeEvery, handler};
use crate::thunks::context::{Context, EffectPayload, ThunkCtx};
use crate::thunks::creator::{ActionCreator, Declare};
use crate::thunks::managed::Managed;

/// Something to keep alive while registered.
#[derive(Clone)]
pub(crate) struct Visor {
    id: u64,
    name: String,
    op: Op<()>,
}

struct State<C> {
    middleware: Vec<Middleware<C>>,
    /// Per-declaration middleware.
    statics: HashMap<u64, Middleware<C>>,
    /// Overrides installed through `ActionCreator::use_middleware`.
    dynamics: HashMap<u64, Middleware<C>>,
    /// Most recent declaration of each effect name.
    latest: HashMap<String, u64>,
    resources: HashSet<String>,
    visors: Vec<Visor>,
    registered: HashSet<u64>,
    next_id: u64,
}

impl<C> State<C> {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub(crate) struct Inner<C> {
    state: RwLock<State<C>>,
    signal: broadcast::Sender<Visor>,
    strategy: Arc<dyn Strategy>,
    config: Config,
}

impl<C> Inner<C> {
    fn read(&self) -> RwLockReadGuard<'_, State<C>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, State<C>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Builder for [`Thunks`].
pub struct ThunksBuilder {
    strategy: Arc<dyn Strategy>,
    config: Config,
}

impl Default for ThunksBuilder {
    fn default() -> Self {
        Self {
            strategy: Arc::new(TakeEvery),
            config: Config::default(),
        }
    }
}

impl ThunksBuilder {
    /// Default strategy for effects declared without one ([`TakeEvery`] otherwise).
    pub fn with_strategy(mut self, strategy: impl Strategy) -> Self {
        self.strategy = Arc::new(strategy);
        self
    }

    /// Configuration (signal capacity, keep-alive backoff).
    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Builds the registry.
    pub fn build<C: ThunkCtx>(self) -> Thunks<C> {
        let (signal, _) = broadcast::channel(self.config.signal_capacity_clamped());
        Thunks {
            inner: Arc::new(Inner {
                state: RwLock::new(State {
                    middleware: Vec::new(),
                    statics: HashMap::new(),
                    dynamics: HashMap::new(),
                    latest: HashMap::new(),
                    resources: HashSet::new(),
                    visors: Vec::new(),
                    registered: HashSet::new(),
                    next_id: 0,
                }),
                signal,
                strategy: self.strategy,
                config: self.config,
            }),
        }
    }
}

/// Registry of named effects. Cheap to clone; clones share state.
///
/// # Example
/// ```rust
/// use effectvisor::{Config, Context, Middleware, Scope, Thunks};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let thunks: Thunks = Thunks::new();
/// thunks.use_middleware(thunks.routes());
///
/// let greet = thunks.create(
///     "greet",
///     Middleware::new(|ctx: &mut Context, next| {
///         Box::pin(async move {
///             ctx.result = Ok(format!("hello {}", ctx.payload).into());
///             next.run(ctx).await
///         })
///     }),
/// )?;
///
/// let scope = Scope::new(Config::default());
/// let ctx = greet.run(&scope, serde_json::json!("bob")).await?;
/// assert_eq!(ctx.result?, serde_json::json!("hello \"bob\""));
/// # Ok(())
/// # }
/// ```
pub struct Thunks<C: ThunkCtx = Context> {
    inner: Arc<Inner<C>>,
}

impl<C: ThunkCtx> Clone for Thunks<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Thunks {
    /// Starts building a registry; the context type is chosen by
    /// [`ThunksBuilder::build`].
    pub fn builder() -> ThunksBuilder {
        ThunksBuilder::default()
    }
}

impl<C: ThunkCtx> Default for Thunks<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ThunkCtx> Thunks<C> {
    /// Registry with [`TakeEvery`] and the default config.
    pub fn new() -> Self {
        ThunksBuilder::default().build()
    }

    /// Appends to the global middleware stack every dispatch runs.
    pub fn use_middleware(&self, mw: Middleware<C>) {
        self.inner.write().middleware.push(mw);
    }

    /// Declares an effect.
    ///
    /// # Errors
    /// [`RuntimeError::EmptyName`] for an empty name.
    pub fn create(
        &self,
        name: impl Into<String>,
        decl: impl Into<Declare<C>>,
    ) -> Result<ActionCreator<C>, RuntimeError> {
        let name = name.into();
        if name.is_empty() {
            return Err(RuntimeError::EmptyName);
        }
        let Declare {
            options,
            middleware,
        } = decl.into();
        let middleware = middleware.unwrap_or_else(Middleware::passthrough);

        let (decl, visor) = {
            let mut state = self.inner.write();
            let decl = state.next_id();
            state.statics.insert(decl, middleware);
            if state.latest.insert(name.clone(), decl).is_some() {
                warn!(effect = %name, "effect declared twice; sharing its watcher");
                (decl, None)
            } else {
                let strategy = options
                    .supervisor
                    .unwrap_or_else(|| Arc::clone(&self.inner.strategy));
                let visor = Visor {
                    id: state.next_id(),
                    name: name.clone(),
                    op: self.watcher(name.clone(), strategy),
                };
                state.visors.push(visor.clone());
                (decl, Some(visor))
            }
        };
        if let Some(visor) = visor {
            let _ = self.inner.signal.send(visor);
        }

        Ok(ActionCreator {
            name,
            decl,
            thunks: self.clone(),
        })
    }

    /// Declares a long-lived resource, built by `factory` when the registry
    /// is registered and dropped when that scope exits.
    pub fn manage<T, F, Fut>(&self, name: impl Into<String>, factory: F) -> Managed<T>
    where
        T: Send + Sync + 'static,
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let managed = Managed::new(name.into());
        let visor = {
            let mut state = self.inner.write();
            if !state.resources.insert(managed.name().to_string()) {
                warn!(resource = %managed.name(), "resource declared twice; each handle gets its own instance");
            }
            let visor = Visor {
                id: state.next_id(),
                name: format!("@@manage/{}", managed.name()),
                op: managed.activation(factory),
            };
            state.visors.push(visor.clone());
            visor
        };
        let _ = self.inner.signal.send(visor);
        managed
    }

    /// Middleware dispatching to the declaration that produced the action
    /// (or the latest declaration of `ctx.name`): its dynamic override if any,
    /// else its static middleware, else `next`.
    pub fn routes(&self) -> Middleware<C> {
        let weak: Weak<Inner<C>> = Arc::downgrade(&self.inner);
        Middleware::new(move |ctx: &mut C, next| {
            let found = weak.upgrade().and_then(|inner| {
                let state = inner.read();
                let base = ctx.context();
                let decl = base
                    .decl
                    .filter(|d| state.statics.contains_key(d))
                    .or_else(|| state.latest.get(&base.name).copied())?;
                state
                    .dynamics
                    .get(&decl)
                    .or_else(|| state.statics.get(&decl))
                    .cloned()
            });
            match found {
                Some(mw) => mw.call(ctx, next),
                None => next.run(ctx),
            }
        })
    }

    /// Drops every dynamic override installed with `use_middleware` on a creator.
    pub fn reset(&self) {
        self.inner.write().dynamics.clear();
    }

    /// True when registered in at least one scope.
    pub fn is_registered(&self) -> bool {
        !self.inner.read().registered.is_empty()
    }

    /// Activates the registry in `scope` and keeps it active until the scope
    /// is cancelled.
    ///
    /// Every effect is watched by its strategy under [`supervise`], using
    /// [`Config::backoff`]. Effects declared later are picked up as they appear.
    pub async fn register(&self, scope: Scope) -> Result<(), TaskError> {
        let host = scope.id();
        if !self.inner.write().registered.insert(host) {
            warn!(scope = host, "registry already registered in this scope");
            return Ok(());
        }
        let _unmark = Unmark {
            inner: Arc::downgrade(&self.inner),
            host,
        };

        // Subscribe before the snapshot so nothing declared in between is lost.
        let mut late = self.inner.signal.subscribe();
        let known = self.inner.read().visors.clone();
        let mut started = HashSet::new();
        for visor in known {
            self.activate(&scope, visor, &mut started);
        }
        debug!(scope = host, effects = started.len(), "registry registered");

        loop {
            tokio::select! {
                _ = scope.cancelled() => break,
                msg = late.recv() => match msg {
                    Ok(visor) => self.activate(&scope, visor, &mut started),
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(scope = host, skipped, "registry signal lagged; late effects missed");
                    }
                }
            }
        }
        Ok(())
    }

    /// Spawns [`Thunks::register`] into `scope`.
    pub fn register_in(&self, scope: &Scope) -> Task<()> {
        let thunks = self.clone();
        scope.spawn(move |s| async move { thunks.register(s).await })
    }

    fn activate(&self, scope: &Scope, visor: Visor, started: &mut HashSet<u64>) {
        if !started.insert(visor.id) {
            return;
        }
        debug!(effect = %visor.name, visor = visor.id, "activating");
        let supervised = supervise(visor.op, self.inner.config.backoff);
        let _ = scope.spawn(move |s| supervised(s));
    }

    fn watcher(&self, name: String, strategy: Arc<dyn Strategy>) -> Op<()> {
        let weak = Arc::downgrade(&self.inner);
        op(move |scope: Scope| {
            let weak = weak.clone();
            let strategy = Arc::clone(&strategy);
            let pattern = Pattern::Type(name.clone());
            let on_action = handler(move |s, action| {
                let weak = weak.clone();
                async move {
                    let Some(inner) = weak.upgrade() else {
                        return Ok(());
                    };
                    Thunks { inner }.on_api(s, action).await.map(drop)
                }
            });
            async move { strategy.watch(scope, pattern, on_action).await }
        })
    }

    pub(crate) fn set_dynamic(&self, decl: u64, mw: Middleware<C>) {
        let mut state = self.inner.write();
        let composed = match state.statics.get(&decl) {
            Some(cur) => compose(vec![cur.clone(), mw]).into_middleware(),
            None => mw,
        };
        state.dynamics.insert(decl, composed);
    }

    /// Builds the context for `action` and runs the global stack over it.
    pub(crate) async fn on_api(&self, scope: Scope, action: Action) -> Result<C, TaskError> {
        let payload: EffectPayload =
            serde_json::from_value(action.payload.clone().unwrap_or(Value::Null)).map_err(
                |err| RuntimeError::InvalidPayload {
                    kind: "effect",
                    reason: err.to_string(),
                },
            )?;
        let action_fn = create_action(payload.name.clone())?;
        let mut ctx = C::from_context(Context {
            name: payload.name,
            key: payload.key,
            action,
            action_fn,
            payload: payload.options,
            result: Ok(Value::Null),
            scope,
            decl: payload.decl,
        });
        let pipeline = compose(self.inner.read().middleware.clone());
        pipeline.run(&mut ctx).await?;
        Ok(ctx)
    }
}

/// Un-marks the host when `register()` exits, however it exits.
struct Unmark<C> {
    inner: Weak<Inner<C>>,
    host: u64,
}

impl<C> Drop for Unmark<C> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.upgrade() {
            inner.write().registered.remove(&self.host);
        }
    }
}
