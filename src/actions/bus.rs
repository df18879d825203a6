//! # Action bus.
//!
//! [`Bus`] is a multicast stream of [`Action`]s. Each subscriber owns a
//! [`FilterQueue`](super::queue) with its own read cursor starting at the
//! moment it subscribed.
//!
//! ## Architecture
//! ```text
//! Publishers (many):                      Subscribers (many):
//!   effect ──┐                   ┌──► FilterQueue("users/load") ──► take()
//!   strategy ┼──► Bus::put() ────┼──► FilterQueue("*")          ──► take_every()
//!   host   ──┘   (synchronous)   └──► FilterQueue(predicate)    ──► wait_for()
//! ```
//!
//! ## Rules
//! - **Synchronous delivery**: `put()` hands the action to every current
//!   subscriber before it returns, in publish order.
//! - **No replay**: a subscriber only sees actions published after it subscribed.
//! - **Unbounded**: queues never drop; a slow consumer only buffers actions it matches.
//! - **Pruning**: queues whose consumer was dropped are removed on the next `put()`.
//! - **Close is terminal**: after `close()` pending and future subscriptions end.
//!   Patterns must not publish from inside `matches`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::trace;

use crate::actions::action::{Action, Batch};
use crate::actions::matcher::Pattern;
use crate::actions::queue::{FilterQueue, Subscription};

#[derive(Default)]
struct State {
    queues: Vec<FilterQueue>,
    closed: bool,
}

/// Multicast action stream. Cheap to clone; clones share the same stream.
#[derive(Clone, Default)]
pub struct Bus {
    state: Arc<Mutex<State>>,
}

impl Bus {
    /// Creates an open bus with no subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publishes one action or a batch to all current subscribers.
    ///
    /// An empty batch, or any batch on a closed bus, is a no-op.
    pub fn put(&self, batch: impl Into<Batch>) {
        let batch = batch.into();
        if batch.is_empty() {
            return;
        }
        let mut state = self.lock();
        if state.closed {
            trace!("put on closed bus ignored");
            return;
        }
        for action in batch {
            state.queues.retain(|q| q.offer(&action));
        }
    }

    /// Subscribes to actions matching `pattern`.
    pub fn subscribe(&self, pattern: impl Into<Pattern>) -> Subscription {
        let (queue, sub) = FilterQueue::new(pattern.into());
        let mut state = self.lock();
        if !state.closed {
            state.queues.push(queue);
        }
        sub
    }

    /// Closes the stream; every subscription drains and then ends.
    pub fn close(&self) {
        let mut state = self.lock();
        state.closed = true;
        state.queues.clear();
    }

    /// True once [`Bus::close`] was called.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of live subscriptions (as of the last prune).
    pub fn subscribers(&self) -> usize {
        self.lock().queues.len()
    }

    /// Waits for the next action matching `pattern`.
    ///
    /// Returns [`Action::closed`] if the stream closes first.
    pub async fn take(&self, pattern: impl Into<Pattern>) -> Action {
        self.subscribe(pattern)
            .next()
            .await
            .unwrap_or_else(Action::closed)
    }
}

impl std::fmt::Debug for Bus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("Bus")
            .field("subscribers", &state.queues.len())
            .field("closed", &state.closed)
            .finish()
    }
}
