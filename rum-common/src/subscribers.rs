use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Handle returned by [`Subscribers::subscribe`], used to unsubscribe.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub struct SubscriptionId(u64);

/// A list of callbacks notified synchronously about changes of type `T`.
///
/// Callbacks run on the notifying thread after the internal lock has been released, so a
/// callback may subscribe, unsubscribe or trigger further notifications.
pub struct Subscribers<T> {
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> Subscribers<T> {
    /// Creates an empty subscriber list.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    /// Registers a callback.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Removes a callback. Returns `false` if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(other, _)| *other != id);
        callbacks.len() != before
    }

    /// Removes all callbacks.
    pub fn clear(&self) {
        self.callbacks.lock().clear();
    }

    /// Invokes all callbacks in registration order.
    pub fn notify(&self, value: &T) {
        let callbacks: Vec<_> = self
            .callbacks
            .lock()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in callbacks {
            callback(value);
        }
    }

    /// Returns the number of registered callbacks.
    pub fn len(&self) -> usize {
        self.callbacks.lock().len()
    }

    /// Returns `true` if no callback is registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Default for Subscribers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Subscribers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;

    #[test]
    fn test_notify_and_unsubscribe() {
        let subscribers = Subscribers::<u32>::new();
        let sum = Arc::new(AtomicUsize::new(0));

        let sum_clone = Arc::clone(&sum);
        let id = subscribers.subscribe(move |v| {
            sum_clone.fetch_add(*v as usize, Ordering::SeqCst);
        });

        subscribers.notify(&3);
        assert!(subscribers.unsubscribe(id));
        assert!(!subscribers.unsubscribe(id));
        subscribers.notify(&4);

        assert_eq!(sum.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_reentrant_subscribe() {
        let subscribers = Arc::new(Subscribers::<()>::new());
        let inner = Arc::clone(&subscribers);
        subscribers.subscribe(move |_| {
            inner.subscribe(|_| {});
        });

        subscribers.notify(&());
        assert_eq!(subscribers.len(), 2);
    }
}
