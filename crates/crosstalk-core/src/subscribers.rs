//! Callback lists for pushing engine events to consumers.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Error type subscribers may return.
pub type SubscriberError = Box<dyn std::error::Error + Send + Sync>;

/// What a subscriber callback returns.
pub type SubscriberResult = std::result::Result<(), SubscriberError>;

type Callback<T> = Arc<dyn Fn(&T) -> SubscriberResult + Send + Sync>;

/// Handle returned by `subscribe`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// An ordered list of callbacks.
///
/// Notification iterates over a snapshot taken under the lock, so a callback
/// may subscribe or unsubscribe (itself included) while being notified.
/// Errors and panics are contained per callback.
pub struct SubscriberList<T> {
    name: &'static str,
    next_id: AtomicU64,
    callbacks: Mutex<Vec<(SubscriptionId, Callback<T>)>>,
}

impl<T> SubscriberList<T> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            next_id: AtomicU64::new(0),
            callbacks: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&T) -> SubscriberResult + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, Arc::new(callback)));
        id
    }

    /// Returns false if the id was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut callbacks = self.lock();
        let before = callbacks.len();
        callbacks.retain(|(existing, _)| *existing != id);
        callbacks.len() != before
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `value` to every subscriber. Returns the number that failed.
    pub fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<_> = self.lock().clone();

        let mut failures = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| (*callback)(value))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    failures += 1;
                    warn!(target: "crosstalk::dispatch", "{} subscriber {:?} failed: {}", self.name, id, e);
                }
                Err(_) => {
                    failures += 1;
                    warn!(target: "crosstalk::dispatch", "{} subscriber {:?} panicked", self.name, id);
                }
            }
        }
        failures
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<(SubscriptionId, Callback<T>)>> {
        // Callbacks run outside the lock, so a poisoned list is still consistent.
        self.callbacks.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_failing_subscriber_does_not_block_others() {
        let list: SubscriberList<u32> = SubscriberList::new("test");
        let seen = Arc::new(AtomicUsize::new(0));

        list.subscribe(|_| Err("boom".into()));
        list.subscribe(|_| panic!("subscriber panic"));
        let counter = seen.clone();
        list.subscribe(move |v| {
            counter.fetch_add(*v as usize, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(list.notify(&3), 2);
        assert_eq!(list.notify(&4), 2);
        assert_eq!(seen.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_unsubscribe() {
        let list: SubscriberList<()> = SubscriberList::new("test");
        let id = list.subscribe(|_| Ok(()));
        assert_eq!(list.len(), 1);
        assert!(list.unsubscribe(id));
        assert!(!list.unsubscribe(id));
        assert!(list.is_empty());
    }

    #[test]
    fn test_self_unsubscribe_during_notify() {
        let list: Arc<SubscriberList<()>> = Arc::new(SubscriberList::new("test"));
        let calls = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let (list_ref, slot_ref, calls_ref) = (Arc::downgrade(&list), slot.clone(), calls.clone());
        let id = list.subscribe(move |_| {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            if let (Some(list), Some(id)) = (list_ref.upgrade(), *slot_ref.lock().unwrap()) {
                list.unsubscribe(id);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(id);

        let other_calls = calls.clone();
        list.subscribe(move |_| {
            other_calls.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        list.notify(&());
        list.notify(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1 + 10 + 10);
        assert_eq!(list.len(), 1);
    }
}
