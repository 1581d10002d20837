//! The root store: owner of the live state tree and the dispatch pipeline.
//!
//! One dedicated worker thread drains the action queue. For each action it
//! runs every matching reducer in registration order against the live tree,
//! then recomputes every selector and notifies observers of those whose
//! value changed. Producers only ever touch the queue.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace, warn};

use crate::action::{Action, ActionId, ActionInfo, Invocation};
use crate::cloning::{Cloning, Replicate};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::lens::Lens;
use crate::reducer::{Apply, Reducer};
use crate::selector::{Notification, Refresh, Selector, SelectorBinding};
use crate::store::Store;

/// State and registries shared between store handles and the worker.
struct Core<S> {
    /// Live state tree. Written only by the worker.
    state: Mutex<S>,
    reducers: RwLock<Vec<Arc<dyn Apply<S>>>>,
    selectors: RwLock<Vec<Arc<dyn Refresh<S>>>>,
    actions: RwLock<HashMap<ActionId, ActionInfo>>,
    cloning: Cloning,
}

impl<S: 'static> Core<S> {
    fn process(&self, invocation: Invocation) {
        trace!(action = %invocation.action, "processing action");

        // Snapshot, so registration from an observer cannot deadlock with us.
        let reducers: Vec<Arc<dyn Apply<S>>> = self
            .reducers
            .read()
            .iter()
            .filter(|reducer| reducer.action() == invocation.action)
            .cloned()
            .collect();

        if !reducers.is_empty() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut state = self.state.lock();
                for reducer in &reducers {
                    reducer.apply(&mut state, invocation.arg.as_ref(), self.cloning)?;
                }
                Ok::<(), StoreError>(())
            }));
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(err)) => {
                    error!(action = %invocation.action, error = %err, "reducer failed, remaining reducers skipped");
                }
                Err(payload) => {
                    error!(
                        action = %invocation.action,
                        panic = panic_message(payload.as_ref()),
                        "reducer panicked, remaining reducers skipped"
                    );
                }
            }
        }

        self.refresh_selectors();
    }

    fn refresh_selectors(&self) {
        let selectors: Vec<Arc<dyn Refresh<S>>> = self.selectors.read().clone();

        let mut pending: Vec<Notification> = Vec::new();
        {
            let state = self.state.lock();
            for (index, selector) in selectors.iter().enumerate() {
                match panic::catch_unwind(AssertUnwindSafe(|| selector.refresh(&state))) {
                    Ok(Some(notify)) => pending.push(notify),
                    Ok(None) => {}
                    Err(payload) => {
                        error!(
                            selector = index,
                            panic = panic_message(payload.as_ref()),
                            "selector panicked, value kept"
                        );
                    }
                }
            }
        }

        // State lock released: observers may read selectors, dispatch or register.
        for notify in pending {
            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(notify)) {
                error!(panic = panic_message(payload.as_ref()), "selector observer panicked");
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        *msg
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.as_str()
    } else {
        "non-string panic payload"
    }
}

async fn consume<S: 'static>(
    core: Arc<Core<S>>,
    mut queue: mpsc::UnboundedReceiver<Invocation>,
    cancel: CancellationToken,
) {
    loop {
        // Cancellation is checked first so pending actions are dropped on dispose.
        let invocation = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(invocation) => invocation,
                None => break,
            },
        };
        core.process(invocation);
    }
    debug!("store worker stopped");
}

struct Handle<S> {
    core: Arc<Core<S>>,
    queue: mpsc::UnboundedSender<Invocation>,
    cancel: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl<S> Handle<S> {
    fn dispose(&self) {
        self.cancel.cancel();
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        // Disposed from an observer: the worker exits once the current action is done.
        if worker.thread().id() == thread::current().id() {
            debug!("store disposed from its own worker");
            return;
        }
        if worker.join().is_err() {
            error!("store worker terminated with a panic");
        }
        debug!("store disposed");
    }
}

impl<S> Drop for Handle<S> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Owner of a state tree of type `S` and of its dispatch pipeline.
///
/// Cloning a `RootStore` yields another handle to the same store. The store
/// is disposed by [`dispose`](Self::dispose) or when the last handle is
/// dropped; a handle captured by one of the store's own observers keeps it
/// alive until `dispose` is called.
///
/// # Examples
///
/// ```
/// use std::sync::mpsc;
/// use std::time::Duration;
/// use slice_store::{Cloning, Lens, RootStore, Store};
///
/// let store = RootStore::new(0u32, Cloning::NoCopy).unwrap();
/// let increment = store.add_action::<u32>("increment");
/// store
///     .add_reducer(&increment, &Lens::identity(), |n: &u32, by: &u32| n + by)
///     .unwrap();
///
/// let total = store.add_selector(|n: &u32| *n);
/// let (tx, rx) = mpsc::channel();
/// total.subscribe(move |n| tx.send(*n).unwrap());
///
/// store.dispatch(&increment, 2);
/// assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 2);
/// ```
pub struct RootStore<S> {
    inner: Arc<Handle<S>>,
}

impl<S> RootStore<S>
where
    S: Replicate + Send + 'static,
{
    /// Seed a store from `initial`, copied per `cloning`, and start its worker.
    pub fn new(initial: S, cloning: Cloning) -> Result<Self, StoreError> {
        Self::with_config(initial, StoreConfig::new(cloning))
    }

    pub fn with_config(initial: S, config: StoreConfig) -> Result<Self, StoreError> {
        let core = Arc::new(Core {
            state: Mutex::new(config.cloning.apply(initial)),
            reducers: RwLock::new(Vec::new()),
            selectors: RwLock::new(Vec::new()),
            actions: RwLock::new(HashMap::new()),
            cloning: config.cloning,
        });
        let (queue, receiver) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let runtime = tokio::runtime::Builder::new_current_thread().build()?;
        let worker = thread::Builder::new().name(config.worker_name.clone()).spawn({
            let core = Arc::clone(&core);
            let cancel = cancel.clone();
            move || runtime.block_on(consume(core, receiver, cancel))
        })?;
        debug!(worker = %config.worker_name, cloning = ?config.cloning, "store worker started");

        Ok(Self {
            inner: Arc::new(Handle {
                core,
                queue,
                cancel,
                worker: Mutex::new(Some(worker)),
            }),
        })
    }
}

impl<S> RootStore<S> {
    pub fn cloning(&self) -> Cloning {
        self.inner.core.cloning
    }

    /// Metadata for an action declared on this store.
    pub fn action_info(&self, action: ActionId) -> Option<ActionInfo> {
        self.inner.core.actions.read().get(&action).cloned()
    }

    /// Stop the worker. Pending actions are discarded; an action already being
    /// processed completes first. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.cancel.is_cancelled()
    }

    fn enqueue(&self, invocation: Invocation) -> Result<(), StoreError> {
        if self.is_disposed() {
            return Err(StoreError::Disposed);
        }
        self.inner
            .queue
            .send(invocation)
            .map_err(|_| StoreError::Disposed)
    }
}

impl<S> Clone for RootStore<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S> std::fmt::Debug for RootStore<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootStore")
            .field("cloning", &self.inner.core.cloning)
            .field("reducers", &self.inner.core.reducers.read().len())
            .field("selectors", &self.inner.core.selectors.read().len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl<S> Store<S> for RootStore<S>
where
    S: Replicate + Send + 'static,
{
    fn add_action<A: Send + 'static>(&self, description: &str) -> Action<A> {
        let action = Action::new(description);
        self.inner
            .core
            .actions
            .write()
            .insert(action.id(), action.info());
        action
    }

    fn add_reducer<T, A, F>(
        &self,
        action: &Action<A>,
        target: &Lens<S, T>,
        updater: F,
    ) -> Result<(), StoreError>
    where
        T: Replicate + Send + 'static,
        A: Send + 'static,
        F: Fn(&S, &A) -> T + Send + Sync + 'static,
    {
        let reducer = Reducer::new(action, target.clone(), updater)?;
        self.inner.core.reducers.write().push(Arc::new(reducer));
        trace!(action = %action.id(), lens = %target, "reducer registered");
        Ok(())
    }

    fn add_selector<T, F>(&self, compute: F) -> Selector<T>
    where
        T: Replicate + PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let initial = compute(&*self.inner.core.state.lock());
        let selector = Selector::new(initial, self.inner.core.cloning);
        self.inner
            .core
            .selectors
            .write()
            .push(Arc::new(SelectorBinding::new(compute, selector.clone())));
        selector
    }

    fn dispatch<A: Send + 'static>(&self, action: &Action<A>, arg: A) {
        let invocation = Invocation {
            action: action.id(),
            arg: Box::new(arg),
        };
        if self.enqueue(invocation).is_err() {
            warn!(action = %action.id(), "dispatch on a disposed store ignored");
        }
    }

    fn dispatch_any(&self, action: ActionId, arg: Box<dyn Any + Send>) -> Result<(), StoreError> {
        {
            let actions = self.inner.core.actions.read();
            let info = actions.get(&action).ok_or(StoreError::UnknownAction(action))?;
            if !info.accepts(arg.as_ref()) {
                return Err(StoreError::ArgumentTypeMismatch {
                    action,
                    expected: info.arg_type_name,
                });
            }
        }
        self.enqueue(Invocation { action, arg })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::mpsc as std_mpsc;
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(2);

    #[derive(Clone, Debug, Default, PartialEq)]
    struct Counter {
        value: i64,
        text: String,
    }

    impl Replicate for Counter {
        fn deep_copy(&self) -> Self {
            self.clone()
        }
    }

    fn value() -> Lens<Counter, i64> {
        Lens::field("value", |c| &c.value, |c| &mut c.value)
    }

    fn text() -> Lens<Counter, String> {
        Lens::field("text", |c| &c.text, |c| &mut c.text)
    }

    fn store() -> RootStore<Counter> {
        RootStore::new(Counter::default(), Cloning::NoCopy).unwrap()
    }

    fn channel_for<T>(selector: &Selector<T>) -> std_mpsc::Receiver<T>
    where
        T: Replicate + PartialEq + Send + Sync + 'static,
    {
        let (tx, rx) = std_mpsc::channel();
        selector.subscribe(move |v: &T| {
            let _ = tx.send(v.clone());
        });
        rx
    }

    // ========================================================================
    // Registration
    // ========================================================================

    #[test]
    fn selector_starts_from_current_state() {
        let store = RootStore::new(
            Counter {
                value: 5,
                ..Counter::default()
            },
            Cloning::NoCopy,
        )
        .unwrap();
        let selector = store.add_selector(|c: &Counter| c.value * 10);
        assert_eq!(selector.get(), 50);
    }

    #[test]
    fn add_action_records_metadata() {
        let store = store();
        let action = store.add_action::<String>("append text");
        let info = store.action_info(action.id()).unwrap();
        assert_eq!(&*info.description, "append text");
        assert_eq!(info.arg_type_name, std::any::type_name::<String>());
    }

    #[test]
    fn computed_reducer_target_is_rejected_at_registration() {
        let store = store();
        let action = store.add_action::<()>("double");
        let doubled = Lens::computed("doubled", |c: &Counter| c.value * 2);
        let err = store
            .add_reducer(&action, &doubled, |c: &Counter, _: &()| c.value)
            .unwrap_err();
        assert!(matches!(err, StoreError::Lens(_)));
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    #[test]
    fn dispatch_runs_reducer_and_notifies() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let selector = store.select(&value());
        let rx = channel_for(&selector);

        store.dispatch(&add, 3);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 3);
        store.dispatch(&add, 4);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 7);
        assert_eq!(selector.get(), 7);
    }

    #[test]
    fn later_reducer_sees_earlier_write_of_same_action() {
        let store = store();
        let bump = store.add_action::<()>("bump");
        store
            .add_reducer(&bump, &value(), |c: &Counter, _: &()| c.value + 1)
            .unwrap();
        store
            .add_reducer(&bump, &text(), |c: &Counter, _: &()| c.value.to_string())
            .unwrap();
        let rx = channel_for(&store.select(&text()));

        store.dispatch_unit(&bump);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "1");
    }

    #[test]
    fn unchanged_value_is_not_notified() {
        let store = store();
        let set = store.add_action::<i64>("set");
        store
            .add_reducer(&set, &value(), |_: &Counter, n: &i64| *n)
            .unwrap();
        let rx = channel_for(&store.select(&value()));

        store.dispatch(&set, 0);
        store.dispatch(&set, 9);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 9);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn non_matching_action_leaves_state_alone() {
        let store = store();
        let add = store.add_action::<i64>("add");
        let other = store.add_action::<()>("other");
        let mark = store.add_action::<()>("mark");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        store
            .add_reducer(&mark, &text(), |_: &Counter, _: &()| "marked".to_string())
            .unwrap();
        let value_sel = store.select(&value());
        let rx = channel_for(&store.select(&text()));

        store.dispatch_unit(&other);
        store.dispatch_unit(&mark);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), "marked");
        assert_eq!(value_sel.get(), 0);
    }

    #[test]
    fn dispatch_any_checks_action_and_argument() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let rx = channel_for(&store.select(&value()));

        let err = store.dispatch_any(add.id(), Box::new("ten")).unwrap_err();
        assert!(matches!(err, StoreError::ArgumentTypeMismatch { .. }));

        let foreign = RootStore::new(0u8, Cloning::NoCopy)
            .unwrap()
            .add_action::<i64>("elsewhere");
        let err = store.dispatch_any(foreign.id(), Box::new(1i64)).unwrap_err();
        assert!(matches!(err, StoreError::UnknownAction(_)));

        store.dispatch_any(add.id(), Box::new(10i64)).unwrap();
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 10);
    }

    // ========================================================================
    // Faults
    // ========================================================================

    #[test]
    fn panicking_reducer_does_not_stop_the_worker() {
        let store = store();
        let boom = store.add_action::<()>("boom");
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&boom, &value(), |_: &Counter, _: &()| -> i64 {
                panic!("reducer fault")
            })
            .unwrap();
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let rx = channel_for(&store.select(&value()));

        store.dispatch_unit(&boom);
        store.dispatch(&add, 1);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 1);
    }

    #[test]
    fn panicking_selector_does_not_drop_other_notifications() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let before = channel_for(&store.select(&value()));
        let broken = store.add_selector(|c: &Counter| {
            if c.value > 0 {
                panic!("selector fault");
            }
            c.value
        });
        let after = channel_for(&store.select(&value()));

        store.dispatch(&add, 3);
        assert_eq!(before.recv_timeout(TIMEOUT).unwrap(), 3);
        assert_eq!(after.recv_timeout(TIMEOUT).unwrap(), 3);
        assert_eq!(broken.get(), 0);

        store.dispatch(&add, 1);
        assert_eq!(before.recv_timeout(TIMEOUT).unwrap(), 4);
    }

    #[test]
    fn panicking_observer_does_not_block_others() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let selector = store.select(&value());
        selector.subscribe(|_| panic!("observer fault"));
        let rx = channel_for(&store.select(&value()));

        store.dispatch(&add, 2);
        assert_eq!(rx.recv_timeout(TIMEOUT).unwrap(), 2);
    }

    // ========================================================================
    // Disposal
    // ========================================================================

    #[test]
    fn dispose_stops_processing() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let selector = store.select(&value());

        store.dispose();
        assert!(store.is_disposed());
        store.dispatch(&add, 5);
        assert!(matches!(
            store.dispatch_any(add.id(), Box::new(5i64)),
            Err(StoreError::Disposed)
        ));
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(selector.get(), 0);

        store.dispose();
    }

    #[test]
    fn dispose_from_observer_does_not_deadlock() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let selector = store.select(&value());
        let calls = Arc::new(AtomicU64::new(0));
        let (tx, rx) = std_mpsc::channel();
        {
            let store = store.clone();
            let calls = calls.clone();
            selector.subscribe(move |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                store.dispose();
                let _ = tx.send(());
            });
        }

        store.dispatch(&add, 1);
        rx.recv_timeout(TIMEOUT).unwrap();
        assert!(store.is_disposed());

        store.dispatch(&add, 1);
        std::thread::sleep(Duration::from_millis(50));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_last_handle_disposes() {
        let store = store();
        let add = store.add_action::<i64>("add");
        store
            .add_reducer(&add, &value(), |c: &Counter, n: &i64| c.value + n)
            .unwrap();
        let selector = store.select(&value());
        drop(store);
        assert_eq!(selector.get(), 0);
    }

    fn _assert_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<RootStore<Counter>>();
        assert_sync::<RootStore<Counter>>();
    }
}
