use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tracing::trace;

use crate::cloning::{Cloning, Replicate};

/// Callback type for selector change notifications.
pub type Observer<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Deferred observer calls, run once the store has released its state lock.
pub(crate) type Notification = Box<dyn FnOnce() + Send>;

/// Unique handle for a subscription, returned by [`Selector::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Slot<T> {
    /// Last published value, copied per the cloning level.
    published: T,
    /// Detached copy of the same value that change detection compares against.
    baseline: T,
}

struct SelectorCell<T> {
    slot: RwLock<Slot<T>>,
    observers: RwLock<Vec<(SubscriptionId, Observer<T>)>>,
    next_id: AtomicU64,
    cloning: Cloning,
}

/// Live handle to a value derived from a store's state.
///
/// The value is computed once at registration and recomputed after every
/// processed action. Observers are called only when the recomputed value
/// differs (by `PartialEq`) from the last published one; they run on the
/// store's worker thread and receive a copy made with the store's
/// [`Cloning`] level. Cloning a `Selector` yields another handle to the
/// same cell.
pub struct Selector<T> {
    cell: Arc<SelectorCell<T>>,
}

impl<T> Selector<T>
where
    T: Replicate + PartialEq + Send + Sync + 'static,
{
    pub(crate) fn new(initial: T, cloning: Cloning) -> Self {
        Self {
            cell: Arc::new(SelectorCell {
                slot: RwLock::new(Slot {
                    baseline: initial.deep_copy(),
                    published: cloning.apply(initial),
                }),
                observers: RwLock::new(Vec::new()),
                next_id: AtomicU64::new(1),
                cloning,
            }),
        }
    }

    /// Current value, copied per the store's cloning level.
    pub fn get(&self) -> T {
        self.cell.cloning.copy(&self.cell.slot.read().published)
    }

    /// Register a change handler. Returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, observer: F) -> SubscriptionId
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = SubscriptionId(self.cell.next_id.fetch_add(1, Ordering::Relaxed));
        self.cell.observers.write().push((id, Arc::new(observer)));
        id
    }

    /// Remove a change handler. Returns false if `id` was not subscribed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut observers = self.cell.observers.write();
        let before = observers.len();
        observers.retain(|(sub, _)| *sub != id);
        observers.len() != before
    }

    pub fn subscriber_count(&self) -> usize {
        self.cell.observers.read().len()
    }

    /// Record a freshly computed value.
    ///
    /// Returns the pending notification when the value changed.
    pub(crate) fn publish(&self, next: T) -> Option<Notification> {
        let published = {
            let mut slot = self.cell.slot.write();
            if slot.baseline == next {
                return None;
            }
            slot.baseline = next.deep_copy();
            slot.published = self.cell.cloning.apply(next);
            self.cell.cloning.copy(&slot.published)
        };

        let observers: Vec<Observer<T>> = self
            .cell
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        trace!(observers = observers.len(), "selector value changed");
        if observers.is_empty() {
            return None;
        }
        Some(Box::new(move || {
            for observer in observers {
                observer(&published);
            }
        }))
    }
}

impl<T> Clone for Selector<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Selector<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Selector")
            .field("value", &self.cell.slot.read().published)
            .field("observers", &self.cell.observers.read().len())
            .finish()
    }
}

/// Type-erased selector as seen by the store that owns it.
pub(crate) trait Refresh<S>: Send + Sync {
    /// Recompute from `state`; returns observer calls to run if the value changed.
    fn refresh(&self, state: &S) -> Option<Notification>;
}

pub(crate) struct SelectorBinding<S, T> {
    compute: Box<dyn Fn(&S) -> T + Send + Sync>,
    selector: Selector<T>,
}

impl<S, T> SelectorBinding<S, T> {
    pub(crate) fn new<F>(compute: F, selector: Selector<T>) -> Self
    where
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        Self {
            compute: Box::new(compute),
            selector,
        }
    }
}

impl<S, T> Refresh<S> for SelectorBinding<S, T>
where
    T: Replicate + PartialEq + Send + Sync + 'static,
{
    fn refresh(&self, state: &S) -> Option<Notification> {
        self.selector.publish((self.compute)(state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::Shared;
    use std::sync::Mutex;

    fn run(notification: Option<Notification>) -> bool {
        match notification {
            Some(notify) => {
                notify();
                true
            }
            None => false,
        }
    }

    // ========================================================================
    // Change detection
    // ========================================================================

    #[test]
    fn equal_value_does_not_notify() {
        let selector = Selector::new(3u32, Cloning::NoCopy);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = seen.clone();
        selector.subscribe(move |v| seen_c.lock().unwrap().push(*v));

        assert!(!run(selector.publish(3)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[test]
    fn changed_value_notifies_once_with_new_value() {
        let selector = Selector::new(3u32, Cloning::NoCopy);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_c = seen.clone();
        selector.subscribe(move |v| seen_c.lock().unwrap().push(*v));

        assert!(run(selector.publish(4)));
        assert_eq!(*seen.lock().unwrap(), vec![4]);
        assert_eq!(selector.get(), 4);
    }

    #[test]
    fn none_to_some_is_a_change() {
        let selector = Selector::new(None::<String>, Cloning::NoCopy);
        let count = Arc::new(AtomicU64::new(0));
        let count_c = count.clone();
        selector.subscribe(move |_| {
            count_c.fetch_add(1, Ordering::Relaxed);
        });

        run(selector.publish(Some(String::new())));
        run(selector.publish(None));
        assert_eq!(count.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn value_is_stored_even_without_observers() {
        let selector = Selector::new(1i32, Cloning::NoCopy);
        assert!(selector.publish(2).is_none());
        assert_eq!(selector.get(), 2);
    }

    #[test]
    fn every_observer_is_called() {
        let selector = Selector::new(0u8, Cloning::NoCopy);
        let count = Arc::new(AtomicU64::new(0));
        for _ in 0..3 {
            let count_c = count.clone();
            selector.subscribe(move |_| {
                count_c.fetch_add(1, Ordering::Relaxed);
            });
        }
        run(selector.publish(1));
        assert_eq!(count.load(Ordering::Relaxed), 3);
    }

    // ========================================================================
    // Subscribe / unsubscribe
    // ========================================================================

    #[test]
    fn unsubscribe_stops_notifications() {
        let selector = Selector::new(0u8, Cloning::NoCopy);
        let count = Arc::new(AtomicU64::new(0));
        let count_c = count.clone();
        let id = selector.subscribe(move |_| {
            count_c.fetch_add(1, Ordering::Relaxed);
        });
        assert_eq!(selector.subscriber_count(), 1);

        assert!(selector.unsubscribe(id));
        assert!(!selector.unsubscribe(id));
        assert_eq!(selector.subscriber_count(), 0);

        run(selector.publish(1));
        assert_eq!(count.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn subscription_ids_are_distinct() {
        let selector = Selector::new(0u8, Cloning::NoCopy);
        let a = selector.subscribe(|_| {});
        let b = selector.subscribe(|_| {});
        assert_ne!(a, b);
    }

    // ========================================================================
    // Cloning of published values
    // ========================================================================

    #[test]
    fn deep_cloning_isolates_readers() {
        let node = Shared::new(1u32);
        let selector = Selector::new(node.clone(), Cloning::Deep);
        let read = selector.get();
        assert!(!read.ptr_eq(&node));

        read.set(5);
        assert_eq!(node.get(), 1);
    }

    #[test]
    fn no_copy_readers_alias_the_value() {
        let node = Shared::new(1u32);
        let selector = Selector::new(node.clone(), Cloning::NoCopy);
        assert!(selector.get().ptr_eq(&node));
    }

    #[test]
    fn in_place_node_change_is_detected_at_every_level() {
        for cloning in [Cloning::NoCopy, Cloning::Shallow, Cloning::Deep] {
            let node = Shared::new(1u32);
            let selector = Selector::new(node.clone(), cloning);
            let seen = Arc::new(Mutex::new(Vec::new()));
            let seen_c = seen.clone();
            selector.subscribe(move |v: &Shared<u32>| seen_c.lock().unwrap().push(v.get()));

            node.set(2);
            assert!(run(selector.publish(node.clone())), "{cloning:?}");
            assert_eq!(*seen.lock().unwrap(), vec![2], "{cloning:?}");
            assert!(!run(selector.publish(node.clone())), "{cloning:?}");
        }
    }

    #[test]
    fn binding_recomputes_from_state() {
        let selector = Selector::new(0usize, Cloning::NoCopy);
        let binding = SelectorBinding::new(|s: &String| s.len(), selector.clone());
        assert!(binding.refresh(&"abc".to_string()).is_none());
        assert_eq!(selector.get(), 3);
    }
}
