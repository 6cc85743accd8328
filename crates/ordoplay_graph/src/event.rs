// SPDX-License-Identifier: MIT OR Apache-2.0
//! Thread-safe multicast callbacks.

use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;

type Callback<A> = Arc<dyn Fn(&A) + Send + Sync>;

/// Handle returned by [`Event::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Subscribers<A> {
    next_id: u64,
    removable: Vec<(SubscriptionId, Callback<A>)>,
    permanent: Vec<Callback<A>>,
}

/// A list of callbacks invoked with a shared argument.
///
/// `fire` copies the callback list under the lock and calls the copies after
/// releasing it, so callbacks may subscribe or unsubscribe re-entrantly.
/// Changes made during a `fire` apply to the next one.
pub struct Event<A> {
    subscribers: Mutex<Subscribers<A>>,
}

impl<A> Event<A> {
    /// Create an event without subscribers
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Subscribers {
                next_id: 0,
                removable: Vec::new(),
                permanent: Vec::new(),
            }),
        }
    }

    /// Add a callback that can later be removed
    pub fn subscribe(&self, callback: impl Fn(&A) + Send + Sync + 'static) -> SubscriptionId {
        let mut subscribers = self.subscribers.lock();
        let id = SubscriptionId(subscribers.next_id);
        subscribers.next_id += 1;
        subscribers.removable.push((id, Arc::new(callback)));
        id
    }

    /// Add a callback for the lifetime of the event
    pub fn subscribe_forever(&self, callback: impl Fn(&A) + Send + Sync + 'static) {
        self.subscribers.lock().permanent.push(Arc::new(callback));
    }

    /// Remove a callback; `false` if it was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.subscribers.lock();
        let before = subscribers.removable.len();
        subscribers.removable.retain(|(existing, _)| *existing != id);
        subscribers.removable.len() != before
    }

    /// Invoke removable callbacks in subscription order, then permanent ones
    pub fn fire(&self, argument: &A) {
        let snapshot: Vec<Callback<A>> = {
            let subscribers = self.subscribers.lock();
            subscribers
                .removable
                .iter()
                .map(|(_, callback)| Arc::clone(callback))
                .chain(subscribers.permanent.iter().cloned())
                .collect()
        };
        for callback in snapshot {
            callback(argument);
        }
    }

    /// Number of callbacks of both kinds
    pub fn subscriber_count(&self) -> usize {
        let subscribers = self.subscribers.lock();
        subscribers.removable.len() + subscribers.permanent.len()
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_fire_in_order() {
        let event = Event::<u32>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let forever = Arc::clone(&log);
        event.subscribe_forever(move |value| forever.lock().push(("forever", *value)));
        let first = Arc::clone(&log);
        event.subscribe(move |value| first.lock().push(("first", *value)));

        event.fire(&7);
        assert_eq!(*log.lock(), vec![("first", 7), ("forever", 7)]);
    }

    #[test]
    fn test_unsubscribe() {
        let event = Event::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let id = event.subscribe(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        event.fire(&());
        assert!(event.unsubscribe(id));
        assert!(!event.unsubscribe(id));
        event.fire(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(event.subscriber_count(), 0);
    }

    #[test]
    fn test_reentrant_subscribe() {
        let event = Arc::new(Event::<()>::new());
        let inner = Arc::clone(&event);
        event.subscribe(move |()| {
            inner.subscribe(|()| {});
        });

        event.fire(&());
        assert_eq!(event.subscriber_count(), 2);
    }

    #[test]
    fn test_fire_from_threads() {
        let event = Arc::new(Event::<usize>::new());
        let total = Arc::new(AtomicUsize::new(0));
        let sum = Arc::clone(&total);
        event.subscribe(move |value| {
            sum.fetch_add(*value, Ordering::SeqCst);
        });

        let handles: Vec<_> = (1..=4)
            .map(|value| {
                let event = Arc::clone(&event);
                std::thread::spawn(move || event.fire(&value))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(total.load(Ordering::SeqCst), 10);
    }
}
