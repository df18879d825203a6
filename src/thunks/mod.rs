//! Named effects: declaration, dispatch and activation.
//!
//! - [`registry`]: [`Thunks`], the effect registry (`create`, `use_middleware`, `routes`, `register`);
//! - [`boundary`]: the [`catch_errors`] error-boundary middleware;
//! - [`creator`]: [`ActionCreator`] handles and the accepted `create()` shapes;
//! - [`context`]: the per-dispatch [`Context`];
//! - [`key`]: dedup keys;
//! - [`managed`]: resources tied to a registration;
//! - [`uri`]: per-method endpoint naming.

mod boundary;
mod context;
mod creator;
mod key;
mod managed;
mod registry;
mod uri;

pub use boundary::catch_errors;
pub use context::{Context, EffectPayload, ThunkCtx};
pub use creator::{ActionCreator, CreateOptions, Declare, RunInput};
pub use key::create_key;
pub use managed::Managed;
pub use registry::{Thunks, ThunksBuilder};
pub use uri::{Method, Uri};
