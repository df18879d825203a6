//! # Pattern matching for subscriptions.
//!
//! A [`Pattern`] decides whether an action is of interest to a subscriber.
//!
//! ```text
//! "*"              ─► Any           matches every action
//! "users/load"     ─► Type          matches by action type
//! |a| a.error      ─► Predicate     arbitrary test
//! vec![p1, p2]     ─► List          OR of the elements
//! ```
//!
//! Messages that name an effect (a plain action, an [`ActionFn`], a registry
//! [`ActionCreator`](crate::ActionCreator)) are modeled by [`Target`] and
//! normalize to a type pattern.

use std::fmt;
use std::sync::Arc;

use crate::actions::action::{Action, ActionFn};

type PredicateFn = Arc<dyn Fn(&Action) -> bool + Send + Sync>;

/// Subscription pattern.
#[derive(Clone)]
pub enum Pattern {
    /// Wildcard `"*"`.
    Any,
    /// Exact action type.
    Type(String),
    /// Arbitrary predicate.
    Predicate(PredicateFn),
    /// Matches when any element matches.
    List(Vec<Pattern>),
}

impl Pattern {
    /// Wraps a closure as a predicate pattern.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Action) -> bool + Send + Sync + 'static,
    {
        Pattern::Predicate(Arc::new(f))
    }

    /// Tests an action against the pattern.
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            Pattern::Any => true,
            Pattern::Type(kind) => action.kind == *kind,
            Pattern::Predicate(f) => f(action),
            Pattern::List(list) => list.iter().any(|p| p.matches(action)),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Any => f.write_str("Any"),
            Pattern::Type(kind) => f.debug_tuple("Type").field(kind).finish(),
            Pattern::Predicate(_) => f.write_str("Predicate(..)"),
            Pattern::List(list) => f.debug_tuple("List").field(list).finish(),
        }
    }
}

impl From<&str> for Pattern {
    fn from(s: &str) -> Self {
        if s == "*" {
            Pattern::Any
        } else {
            Pattern::Type(s.to_string())
        }
    }
}

impl From<String> for Pattern {
    fn from(s: String) -> Self {
        if s == "*" {
            Pattern::Any
        } else {
            Pattern::Type(s)
        }
    }
}

impl<P: Into<Pattern>> From<Vec<P>> for Pattern {
    fn from(v: Vec<P>) -> Self {
        Pattern::List(v.into_iter().map(Into::into).collect())
    }
}

impl From<&Action> for Pattern {
    fn from(a: &Action) -> Self {
        Pattern::Type(a.kind.clone())
    }
}

impl From<&ActionFn> for Pattern {
    fn from(f: &ActionFn) -> Self {
        Pattern::Type(f.kind().to_string())
    }
}

impl From<Target> for Pattern {
    fn from(t: Target) -> Self {
        t.pattern()
    }
}

/// A message that names something on the bus.
#[derive(Clone, Debug, PartialEq)]
pub enum Target {
    /// A concrete action.
    Action(Action),
    /// An [`ActionFn`], identified by its type.
    Creator(String),
    /// A registry effect, identified by its name.
    Effect(String),
}

impl Target {
    /// Pattern that matches actions produced for this target.
    pub fn pattern(&self) -> Pattern {
        match self {
            Target::Action(a) => Pattern::from(a),
            Target::Creator(kind) | Target::Effect(kind) => Pattern::Type(kind.clone()),
        }
    }

    /// Identity string (see [`get_id_from_action`]).
    pub fn id(&self) -> &str {
        match self {
            Target::Action(a) => a.id(),
            Target::Creator(kind) | Target::Effect(kind) => kind,
        }
    }
}

impl From<Action> for Target {
    fn from(a: Action) -> Self {
        Target::Action(a)
    }
}

impl From<&ActionFn> for Target {
    fn from(f: &ActionFn) -> Self {
        Target::Creator(f.kind().to_string())
    }
}

/// Identity of a message for timers and clear requests.
///
/// Creators and effects are identified by their type; actions by
/// `payload.key` when present, else by type.
pub fn get_id_from_action(target: impl Into<Target>) -> String {
    target.into().id().to_string()
}
