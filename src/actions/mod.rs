//! Actions and the bus that carries them.
//!
//! - [`action`]: the [`Action`] message, [`Batch`], [`ActionFn`] / [`create_action`]
//! - [`matcher`]: [`Pattern`] and the tagged [`Target`] message shape
//! - [`queue`]: per-subscriber filtered buffers
//! - [`bus`]: the multicast [`Bus`]

mod action;
mod bus;
mod matcher;
mod queue;

pub use action::{Action, ActionFn, Batch, STREAM_CLOSED, SUPERVISE, create_action};
pub use bus::Bus;
pub use matcher::{Pattern, Target, get_id_from_action};
pub use queue::Subscription;
