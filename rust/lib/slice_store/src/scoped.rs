use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::action::{Action, ActionId};
use crate::cloning::Replicate;
use crate::error::{LensError, StoreError};
use crate::lens::Lens;
use crate::root::RootStore;
use crate::selector::Selector;
use crate::store::Store;

/// A view of a parent store restricted to the slice a lens addresses.
///
/// A scoped store owns nothing: actions, reducers and selectors registered on
/// it land in the parent with paths composed through the scope lens, and
/// dispatch is delegated unchanged. Because `ScopedStore` itself implements
/// [`Store`], scopes nest.
pub struct ScopedStore<R, S, P = RootStore<R>> {
    parent: P,
    scope: Lens<R, S>,
    _root: PhantomData<fn() -> R>,
}

impl<R, S, P> ScopedStore<R, S, P>
where
    R: 'static,
    S: 'static,
    P: Store<R>,
{
    /// Fails unless `scope` is identity or an accessor chain.
    pub fn new(parent: P, scope: Lens<R, S>) -> Result<Self, LensError> {
        if !scope.is_accessor_chain(false) {
            return Err(LensError::NotAccessorChain(scope.to_string()));
        }
        Ok(Self {
            parent,
            scope,
            _root: PhantomData,
        })
    }

    pub fn scope(&self) -> &Lens<R, S> {
        &self.scope
    }

    pub fn parent(&self) -> &P {
        &self.parent
    }
}

impl<R, S, P: Clone> Clone for ScopedStore<R, S, P> {
    fn clone(&self) -> Self {
        Self {
            parent: self.parent.clone(),
            scope: self.scope.clone(),
            _root: PhantomData,
        }
    }
}

impl<R, S, P: fmt::Debug> fmt::Debug for ScopedStore<R, S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedStore")
            .field("scope", &format_args!("{}", self.scope))
            .field("parent", &self.parent)
            .finish()
    }
}

impl<R, S, P> Store<S> for ScopedStore<R, S, P>
where
    R: 'static,
    S: 'static,
    P: Store<R>,
{
    fn add_action<A: Send + 'static>(&self, description: &str) -> Action<A> {
        self.parent.add_action(description)
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
        let path = self.scope.then(target)?;
        let scope = self.scope.clone();
        self.parent.add_reducer(action, &path, move |root: &R, arg: &A| {
            scope.view(root, |slice| updater(slice, arg))
        })
    }

    fn add_selector<T, F>(&self, compute: F) -> Selector<T>
    where
        T: Replicate + PartialEq + Send + Sync + 'static,
        F: Fn(&S) -> T + Send + Sync + 'static,
    {
        let scope = self.scope.clone();
        self.parent
            .add_selector(move |root: &R| scope.view(root, &compute))
    }

    fn dispatch<A: Send + 'static>(&self, action: &Action<A>, arg: A) {
        self.parent.dispatch(action, arg);
    }

    fn dispatch_any(&self, action: ActionId, arg: Box<dyn Any + Send>) -> Result<(), StoreError> {
        self.parent.dispatch_any(action, arg)
    }
}
