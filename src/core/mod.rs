//! Runtime core: scopes, tasks and configuration.
//!
//! - [`scope`]: the structured-concurrency [`Scope`] (spawn / halt / shutdown / put / take);
//! - [`task`]: [`Task`] handles and re-runnable [`Op`] factories;
//! - [`config`]: runtime [`Config`];
//! - [`shutdown`]: OS signal handling used by `Scope::run_until_signal`.

mod config;
mod scope;
mod shutdown;
mod task;

pub use config::Config;
pub use scope::Scope;
pub use task::{BoxOp, Op, Task, op};
