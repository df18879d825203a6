//! # Managed resources.
//!
//! A [`Managed`] value is built when its registry is registered and released
//! when that registration ends. Effects read it through [`Managed::get`].
//!
//! Every registration builds its own instance. Instances are kept in
//! activation order and each one is removed only when its own registration
//! exits, so halting one host leaves the others' resources in place.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::core::{Op, Scope, op};
use crate::error::{RuntimeError, TaskError};

static NEXT_ACTIVATION: AtomicU64 = AtomicU64::new(1);

/// Live instances, oldest first, tagged with their activation id.
type Slots<T> = Arc<RwLock<Vec<(u64, Arc<T>)>>>;

/// Handle to a resource owned by a registry.
///
/// With several active registrations, the most recent live activation is
/// visible.
pub struct Managed<T> {
    name: String,
    slots: Slots<T>,
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<T> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Managed")
            .field("name", &self.name)
            .field("active", &self.activations())
            .finish()
    }
}

impl<T> Managed<T> {
    pub(crate) fn new(name: String) -> Self {
        Self {
            name,
            slots: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Resource name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True while at least one registration holds a built instance.
    pub fn is_active(&self) -> bool {
        self.activations() > 0
    }

    /// Number of live instances.
    pub fn activations(&self) -> usize {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// The current resource.
    ///
    /// # Errors
    /// [`RuntimeError::NotActivated`] outside of an active registration.
    pub fn get(&self) -> Result<Arc<T>, RuntimeError> {
        self.slots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .map(|(_, value)| Arc::clone(value))
            .ok_or_else(|| RuntimeError::NotActivated {
                name: self.name.clone(),
            })
    }
}

impl<T: Send + Sync + 'static> Managed<T> {
    /// Op that builds the resource, publishes it, and holds it until the
    /// scope is cancelled.
    pub(crate) fn activation<F, Fut>(&self, factory: F) -> Op<()>
    where
        F: Fn(Scope) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, TaskError>> + Send + 'static,
    {
        let factory = Arc::new(factory);
        let managed = self.clone();
        op(move |scope: Scope| {
            let factory = Arc::clone(&factory);
            let managed = managed.clone();
            async move {
                let value = factory(scope.clone()).await?;
                let id = NEXT_ACTIVATION.fetch_add(1, Ordering::Relaxed);
                managed
                    .slots
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push((id, Arc::new(value)));
                let _release = Release {
                    slots: Arc::clone(&managed.slots),
                    id,
                };
                debug!(resource = %managed.name, activation = id, "resource activated");
                scope.cancelled().await;
                debug!(resource = %managed.name, activation = id, "resource released");
                Ok(())
            }
        })
    }
}

/// Removes one activation's instance when its registration exits.
struct Release<T> {
    slots: Slots<T>,
    id: u64,
}

impl<T> Drop for Release<T> {
    fn drop(&mut self) {
        self.slots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(id, _)| *id != self.id);
    }
}
