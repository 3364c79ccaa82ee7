//! Listener registries and scoped subscriptions
//!
//! A [`Subscription`] is the release half of any registration: dropping it
//! removes the listener, frame callback or timer it guards. Effects hold
//! their subscriptions as fields, so tearing an effect down releases every
//! input listener it acquired.
//!
//! # Example
//!
//! ```rust
//! use refraction_core::subscription::Listeners;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let listeners = Listeners::<u32>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! let sub = listeners.subscribe(move |v| {
//!     counter.fetch_add(*v as usize, Ordering::SeqCst);
//! });
//!
//! listeners.emit(&2);
//! drop(sub);
//! listeners.emit(&5);
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//! assert!(listeners.is_empty());
//! ```

use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

new_key_type! {
    /// Handle to a registered listener
    pub struct ListenerId;
}

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Guard that releases a registration when dropped
#[must_use = "dropping a Subscription immediately releases it"]
pub struct Subscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Create a subscription that runs `release` when dropped
    pub fn new<F>(release: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// A subscription with nothing to release (e.g. the scheduler is gone)
    pub fn empty() -> Self {
        Self { release: None }
    }

    /// Release now instead of waiting for drop
    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }

    /// Whether this guard still owns a registration
    pub fn is_active(&self) -> bool {
        self.release.is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// A set of listeners for values of type `T`
///
/// Emission clones the listener list first and calls each listener with no
/// lock held, so a listener may subscribe, unsubscribe or emit again.
pub struct Listeners<T: 'static> {
    inner: Arc<Mutex<SlotMap<ListenerId, Listener<T>>>>,
}

impl<T: 'static> Listeners<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SlotMap::with_key())),
        }
    }

    /// Register a listener; it stays registered until the subscription drops
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = lock(&self.inner).insert(Arc::new(listener));
        let weak: Weak<Mutex<SlotMap<ListenerId, Listener<T>>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner).remove(id);
            }
        })
    }

    /// Call every registered listener with `value`
    pub fn emit(&self, value: &T) {
        let snapshot: SmallVec<[Listener<T>; 4]> = lock(&self.inner).values().cloned().collect();
        for listener in snapshot {
            listener(value);
        }
    }

    pub fn len(&self) -> usize {
        lock(&self.inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T: 'static> Default for Listeners<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Clone for Listeners<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Lock a mutex, recovering the data if a panicking holder poisoned it
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
