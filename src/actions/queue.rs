//! # Filtered queues.
//!
//! A [`FilterQueue`] is the producer half of a subscription: it admits only
//! actions accepted by its [`Pattern`] and buffers them (unbounded, FIFO) for
//! the matching [`Subscription`]. Non-matching actions are never buffered.

use tokio::sync::mpsc;

use crate::actions::action::Action;
use crate::actions::matcher::Pattern;

/// Producer half of a subscription, held by the bus.
pub(crate) struct FilterQueue {
    pattern: Pattern,
    tx: mpsc::UnboundedSender<Action>,
}

impl FilterQueue {
    /// Creates a queue and its consumer.
    pub(crate) fn new(pattern: Pattern) -> (Self, Subscription) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { pattern, tx }, Subscription { rx })
    }

    /// Offers an action to the queue.
    ///
    /// Returns `false` once the consumer is gone so the bus can prune it.
    pub(crate) fn offer(&self, action: &Action) -> bool {
        if self.tx.is_closed() {
            return false;
        }
        if !self.pattern.matches(action) {
            return true;
        }
        self.tx.send(action.clone()).is_ok()
    }
}

/// Consumer half of a subscription.
///
/// Yields matching actions in publish order; `None` once the bus is closed
/// and the buffer is drained.
#[derive(Debug)]
pub struct Subscription {
    rx: mpsc::UnboundedReceiver<Action>,
}

impl Subscription {
    /// Waits for the next matching action.
    pub async fn next(&mut self) -> Option<Action> {
        self.rx.recv().await
    }

    /// Returns a buffered action without waiting.
    pub fn try_next(&mut self) -> Option<Action> {
        self.rx.try_recv().ok()
    }
}
