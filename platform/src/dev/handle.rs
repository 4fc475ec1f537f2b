//! Lightweight handle types for shared ownership and weak back references.
//!
//! - [Handle<T>] owns a strong reference backed by [alloc::sync::Arc]. The platform bus keeps the
//!   owning handle of every device; handles passed to drivers are temporary clones.
//! - [HandleRef<T>] stores a [alloc::sync::Weak] reference and is what a driver keeps inside its
//!   per-device context to name its device without keeping it alive.
//!
//! Call [HandleRef::get_handle] to upgrade; it returns [None] once every strong owner is gone.
//! **Consumers must handle the [None] case explicitly.**
use alloc::sync::{Arc, Weak};
use core::{fmt::Debug, ops::Deref};

/// Strong owning handle backed by [Arc<T>].
pub struct Handle<T> {
    inner: Arc<T>,
}

impl<T> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.inner
    }
}

impl<T> From<T> for Handle<T> {
    fn from(value: T) -> Self {
        Self {
            inner: Arc::new(value),
        }
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Debug> Debug for Handle<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        self.inner.fmt(f)
    }
}

impl<T> Handle<T> {
    /// Create a non-owning [HandleRef<T>] that refers to the same object.
    ///
    /// The returned reference does not keep the object alive and must be upgraded with
    /// [HandleRef::get_handle] before use.
    pub fn create_ref(&self) -> HandleRef<T> {
        HandleRef {
            inner: Arc::downgrade(&self.inner),
        }
    }

    /// Whether both handles name the same object.
    pub fn ptr_eq(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Weak (non-owning) handle backed by [Weak<T>].
pub struct HandleRef<T> {
    inner: Weak<T>,
}

impl<T> Clone for HandleRef<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Debug for HandleRef<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("HandleRef")
            .field("alive", &(self.inner.strong_count() > 0))
            .finish()
    }
}

impl<T> HandleRef<T> {
    /// Attempt to upgrade the weak reference into a strong [Handle<T>].
    ///
    /// Return `Some(Handle<T>)` if the target is still alive, otherwise return `None`.
    pub fn get_handle(&self) -> Option<Handle<T>> {
        Weak::upgrade(&self.inner).map(|inner| Handle { inner })
    }

    /// Whether this reference points at `handle`'s object.
    pub fn refers_to(&self, handle: &Handle<T>) -> bool {
        Weak::ptr_eq(&self.inner, &Arc::downgrade(&handle.inner))
    }
}
