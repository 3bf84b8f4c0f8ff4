//! Single-use continuation values
//!
//! A continuation attached with `then` must run exactly once and be
//! released immediately afterwards. Consuming the callable by value
//! makes both guarantees ownership facts rather than a calling
//! convention, and lets the propagation loop treat every attached
//! continuation uniformly.

use std::fmt::{self, Debug};

use super::engine::PromiseRef;
use crate::runtime::Runtime;

/// A continuation consumed by its single invocation
///
/// The callable receives the runtime context (so it may allocate, free,
/// stash or fire unrelated promises while it runs) and the delivered
/// value, and returns the promise of its own result.
pub struct OnceCallback<V>(Box<dyn FnOnce(&mut Runtime<V>, V) -> PromiseRef>);

impl<V> OnceCallback<V> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&mut Runtime<V>, V) -> PromiseRef + 'static,
    {
        OnceCallback(Box::new(f))
    }

    /// Invoke and release in one step
    pub fn invoke(self, runtime: &mut Runtime<V>, value: V) -> PromiseRef {
        (self.0)(runtime, value)
    }
}

impl<V> Debug for OnceCallback<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "OnceCallback")
    }
}
