//! Single-writer connection state with observer broadcast.
//!
//! Only the connection manager writes; everything else reads a snapshot or
//! subscribes. Runs on one thread, so interior mutability is `RefCell`-based.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::models::ConnectionState;

type Subscriber = Rc<dyn Fn(&ConnectionState)>;

pub struct StateStore {
    state: RefCell<ConnectionState>,
    revision: Cell<u64>,
    subscribers: RefCell<Vec<(u64, Subscriber)>>,
    next_subscriber: Cell<u64>,
}

impl StateStore {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            state: RefCell::new(ConnectionState::default()),
            revision: Cell::new(0),
            subscribers: RefCell::new(Vec::new()),
            next_subscriber: Cell::new(0),
        })
    }

    pub fn snapshot(&self) -> ConnectionState {
        self.state.borrow().clone()
    }

    /// Bumped on every published change.
    pub fn revision(&self) -> u64 {
        self.revision.get()
    }

    /// Replace the state and notify subscribers. Equal states are dropped
    /// without notification.
    pub fn publish(&self, next: ConnectionState) {
        if *self.state.borrow() == next {
            return;
        }
        *self.state.borrow_mut() = next.clone();
        self.revision.set(self.revision.get() + 1);

        // Snapshot the list so a subscriber may (un)subscribe while notified.
        let subscribers: Vec<Subscriber> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, f)| Rc::clone(f))
            .collect();
        for subscriber in subscribers {
            subscriber(&next);
        }
    }

    pub fn subscribe(self: &Rc<Self>, f: impl Fn(&ConnectionState) + 'static) -> Subscription {
        let id = self.next_subscriber.get();
        self.next_subscriber.set(id + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(f)));
        Subscription {
            store: Rc::downgrade(self),
            id,
        }
    }

    fn unsubscribe(&self, id: u64) {
        self.subscribers.borrow_mut().retain(|(sid, _)| *sid != id);
    }

    #[cfg(test)]
    fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

/// Keeps a subscriber registered; dropping it unsubscribes.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    store: Weak<StateStore>,
    id: u64,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Phase;

    #[test]
    fn test_publish_notifies_and_bumps_revision() {
        let store = StateStore::new();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let _sub = store.subscribe(move |s| sink.borrow_mut().push(s.phase()));

        store.publish(ConnectionState::connecting());
        store.publish(ConnectionState::failed("boom"));

        assert_eq!(*seen.borrow(), vec![Phase::Connecting, Phase::Disconnected]);
        assert_eq!(store.revision(), 2);
        assert_eq!(store.snapshot().error_message(), Some("boom"));
    }

    #[test]
    fn test_equal_state_is_not_rebroadcast() {
        let store = StateStore::new();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let _sub = store.subscribe(move |_| counter.set(counter.get() + 1));

        store.publish(ConnectionState::default());
        store.publish(ConnectionState::connecting());
        store.publish(ConnectionState::connecting());

        assert_eq!(count.get(), 1);
        assert_eq!(store.revision(), 1);
    }

    #[test]
    fn test_dropping_subscription_unsubscribes() {
        let store = StateStore::new();
        let count = Rc::new(Cell::new(0));
        let counter = Rc::clone(&count);
        let sub = store.subscribe(move |_| counter.set(counter.get() + 1));
        assert_eq!(store.subscriber_count(), 1);

        drop(sub);
        store.publish(ConnectionState::connecting());

        assert_eq!(store.subscriber_count(), 0);
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_many_independent_subscribers() {
        let store = StateStore::new();
        let a = Rc::new(Cell::new(0));
        let b = Rc::new(Cell::new(0));
        let (ca, cb) = (Rc::clone(&a), Rc::clone(&b));
        let _sa = store.subscribe(move |_| ca.set(ca.get() + 1));
        let _sb = store.subscribe(move |_| cb.set(cb.get() + 1));

        store.publish(ConnectionState::connecting());

        assert_eq!((a.get(), b.get()), (1, 1));
    }
}
