//! Lease handles returned by the pool

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

pub(crate) type ReleaseFn<T> = Arc<dyn Fn(T) + Send + Sync>;

/// Exclusive lease on one pooled resource.
///
/// The resource goes back to the pool when the lease is dropped or
/// explicitly [released](Lease::release); either way exactly once.
pub struct Lease<T> {
    value: Option<T>,
    release_fn: ReleaseFn<T>,
}

impl<T> Lease<T> {
    pub(crate) fn new(value: T, release_fn: ReleaseFn<T>) -> Self {
        Self {
            value: Some(value),
            release_fn,
        }
    }

    /// Borrow the leased resource
    pub fn value(&self) -> &T {
        self
    }

    /// Mutably borrow the leased resource
    pub fn value_mut(&mut self) -> &mut T {
        self
    }

    /// Hand the resource back to the pool now
    pub fn release(self) {
        drop(self);
    }
}

impl<T> Deref for Lease<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.value.as_ref().expect("lease holds its value until dropped")
    }
}

impl<T> DerefMut for Lease<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.value.as_mut().expect("lease holds its value until dropped")
    }
}

impl<T> Drop for Lease<T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            (self.release_fn)(value);
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Lease<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease").field("value", &self.value).finish()
    }
}
