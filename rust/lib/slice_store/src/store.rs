use std::any::Any;

use crate::action::{Action, ActionId};
use crate::cloning::Replicate;
use crate::error::StoreError;
use crate::lens::Lens;
use crate::selector::Selector;

/// Registration and dispatch surface shared by root and scoped stores.
///
/// Registration (`add_*`) is meant to happen while a store is being set up,
/// before steady-state dispatch. Dispatch is fire-and-forget and safe from
/// any thread.
pub trait Store<S: 'static>: Send + Sync {
    /// Declare an action taking an argument of type `A`.
    fn add_action<A: Send + 'static>(&self, description: &str) -> Action<A>;

    /// Bind `updater` to `action`: when the action is processed, its result
    /// is written through `target`.
    ///
    /// Fails unless `target` is identity or a writable accessor chain.
    fn add_reducer<T, A, F>(
        &self,
        action: &Action<A>,
        target: &Lens<S, T>,
        updater: F,
    ) -> Result<(), StoreError>
    where
        T: Replicate + Send + 'static,
        A: Send + 'static,
        F: Fn(&S, &A) -> T + Send + Sync + 'static;

    /// Register a derived value, recomputed after every processed action.
    fn add_selector<T, F>(&self, compute: F) -> Selector<T>
    where
        T: Replicate + PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static;

    /// Enqueue `action` with `arg`. Returns before the action is processed.
    fn dispatch<A: Send + 'static>(&self, action: &Action<A>, arg: A);

    /// Enqueue a type-erased invocation.
    ///
    /// The action must have been declared on this store (or its root) and
    /// `arg` must have the declared argument type.
    fn dispatch_any(&self, action: ActionId, arg: Box<dyn Any + Send>) -> Result<(), StoreError>;

    /// Selector reading the value a lens addresses.
    fn select<T>(&self, lens: &Lens<S, T>) -> Selector<T>
    where
        T: Replicate + PartialEq + Send + Sync + 'static,
    {
        let lens = lens.clone();
        self.add_selector(move |state| lens.get(state))
    }

    /// Dispatch an action that takes no argument.
    fn dispatch_unit(&self, action: &Action) {
        self.dispatch(action, ());
    }
}
