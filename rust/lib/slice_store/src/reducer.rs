use std::any::{Any, type_name};
use std::marker::PhantomData;

use crate::action::{Action, ActionId};
use crate::cloning::{Cloning, Replicate};
use crate::error::{LensError, StoreError};
use crate::lens::Lens;

/// Type-erased reducer as seen by the store that owns it.
pub(crate) trait Apply<S>: Send + Sync {
    fn action(&self) -> ActionId;

    /// Compute the new target value from `state` and `arg`, copy it per
    /// `cloning`, and write it through the reducer's lens.
    fn apply(
        &self,
        state: &mut S,
        arg: &(dyn Any + Send),
        cloning: Cloning,
    ) -> Result<(), StoreError>;
}

/// Binds one action to one writable lens and an update function.
pub(crate) struct Reducer<S, T, A> {
    action: ActionId,
    target: Lens<S, T>,
    updater: Box<dyn Fn(&S, &A) -> T + Send + Sync>,
    _arg: PhantomData<fn(A)>,
}

impl<S: 'static, T: 'static, A: 'static> Reducer<S, T, A> {
    /// Fails unless `target` is identity or a writable accessor chain.
    pub(crate) fn new<F>(action: &Action<A>, target: Lens<S, T>, updater: F) -> Result<Self, LensError>
    where
        F: Fn(&S, &A) -> T + Send + Sync + 'static,
    {
        if !target.is_accessor_chain(false) {
            return Err(LensError::NotAccessorChain(target.to_string()));
        }
        if !target.is_writable() {
            return Err(LensError::NotWritable(target.to_string()));
        }
        Ok(Self {
            action: action.id(),
            target,
            updater: Box::new(updater),
            _arg: PhantomData,
        })
    }
}

impl<S, T, A> Apply<S> for Reducer<S, T, A>
where
    S: 'static,
    T: Replicate + Send + 'static,
    A: Send + 'static,
{
    fn action(&self) -> ActionId {
        self.action
    }

    fn apply(
        &self,
        state: &mut S,
        arg: &(dyn Any + Send),
        cloning: Cloning,
    ) -> Result<(), StoreError> {
        let arg = arg
            .downcast_ref::<A>()
            .ok_or(StoreError::ArgumentTypeMismatch {
                action: self.action,
                expected: type_name::<A>(),
            })?;
        let next = cloning.apply((self.updater)(state, arg));
        self.target.write_through(state, next)?;
        Ok(())
    }
}
