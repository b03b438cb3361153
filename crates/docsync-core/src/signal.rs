//! Reactive cell with effect-scoped observers
//!
//! A [`Signal`] holds one value and a list of observers. Observers are
//! called synchronously, outside the lock, in the order values were
//! published. A value published from inside an observer is queued and
//! delivered once the current value has reached every observer, so no
//! observer ever sees values out of order.
//!
//! Dropping the [`Subscription`] returned by [`Signal::subscribe`] detaches
//! the observer.

use parking_lot::{Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Weak};

type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Inner<T> {
    value: T,
    observers: Vec<(u64, Observer<T>)>,
    next_id: u64,
    queue: VecDeque<T>,
    delivering: bool,
}

/// Shared reactive value
pub struct Signal<T> {
    inner: Arc<Mutex<Inner<T>>>,
}

impl<T> Signal<T>
where
    T: Clone + PartialEq + Send + 'static,
{
    /// Create a signal holding `value`
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                value,
                observers: Vec::new(),
                next_id: 0,
                queue: VecDeque::new(),
                delivering: false,
            })),
        }
    }

    /// Current value
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.lock().value.clone()
    }

    /// Read the current value without cloning it
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.lock().value)
    }

    /// Replace the value; observers run only if it changed.
    ///
    /// Returns whether the value changed.
    pub fn set(&self, value: T) -> bool {
        let mut guard = self.inner.lock();
        if guard.value == value {
            return false;
        }
        guard.value = value.clone();
        self.publish(guard, value);
        true
    }

    /// Replace the value and notify observers even if it is unchanged
    pub fn replace(&self, value: T) -> T {
        let mut guard = self.inner.lock();
        let previous = std::mem::replace(&mut guard.value, value.clone());
        self.publish(guard, value);
        previous
    }

    /// Compute the next value from the current one under the lock.
    ///
    /// `f` returns `Ok(None)` to leave the value untouched. On `Ok(Some)`
    /// the value is replaced and observers are notified.
    pub fn try_update<E>(
        &self,
        f: impl FnOnce(&T) -> Result<Option<T>, E>,
    ) -> Result<Option<T>, E> {
        let mut guard = self.inner.lock();
        let Some(next) = f(&guard.value)? else {
            return Ok(None);
        };
        guard.value = next.clone();
        self.publish(guard, next.clone());
        Ok(Some(next))
    }

    /// Register an observer. It is not called for the current value.
    #[must_use = "dropping the subscription detaches the observer"]
    pub fn subscribe(&self, observer: impl Fn(&T) + Send + Sync + 'static) -> Subscription {
        let id = {
            let mut guard = self.inner.lock();
            let id = guard.next_id;
            guard.next_id += 1;
            guard.observers.push((id, Arc::new(observer)));
            id
        };

        let weak: Weak<Mutex<Inner<T>>> = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.lock().observers.retain(|(oid, _)| *oid != id);
            }
        })
    }

    /// Number of attached observers
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.inner.lock().observers.len()
    }

    fn publish(&self, mut guard: MutexGuard<'_, Inner<T>>, value: T) {
        guard.queue.push_back(value);
        if guard.delivering {
            return;
        }
        guard.delivering = true;
        drop(guard);

        let _unwind = DeliveryReset(&*self.inner);
        loop {
            let (next, observers) = {
                let mut guard = self.inner.lock();
                let Some(next) = guard.queue.pop_front() else {
                    guard.delivering = false;
                    return;
                };
                let observers: Vec<Observer<T>> =
                    guard.observers.iter().map(|(_, o)| Arc::clone(o)).collect();
                (next, observers)
            };
            for observer in &observers {
                observer(&next);
            }
        }
    }
}

/// Clears the delivering flag if an observer panics mid-delivery.
/// Undelivered values stay queued for the next publish.
struct DeliveryReset<'a, T>(&'a Mutex<Inner<T>>);

impl<T> Drop for DeliveryReset<'_, T> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().delivering = false;
        }
    }
}

impl<T: Clone + PartialEq + Send + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.inner.lock();
        f.debug_struct("Signal")
            .field("value", &guard.value)
            .field("observers", &guard.observers.len())
            .finish()
    }
}

/// Keeps an observer attached; dropping it detaches the observer
pub struct Subscription {
    detach: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Wrap a detach action
    pub fn new(detach: impl FnOnce() + Send + 'static) -> Self {
        Self {
            detach: Some(Box::new(detach)),
        }
    }

    /// A subscription with nothing to detach
    #[must_use]
    pub fn empty() -> Self {
        Self { detach: None }
    }

    /// Detach now instead of at drop
    pub fn unsubscribe(mut self) {
        self.run_detach();
    }

    fn run_detach(&mut self) {
        if let Some(detach) = self.detach.take() {
            detach();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_detach();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("attached", &self.detach.is_some())
            .finish()
    }
}
