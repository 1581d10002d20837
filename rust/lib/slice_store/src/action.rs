use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_ACTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of an [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActionId(u64);

impl ActionId {
    fn next() -> Self {
        Self(NEXT_ACTION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A class of state transition, dispatched with an argument of type `A`.
///
/// Actions carry no behavior. Reducers match on the action's identity,
/// never on the argument value. Actions without an argument use `A = ()`.
pub struct Action<A = ()> {
    id: ActionId,
    description: Arc<str>,
    _arg: PhantomData<fn(A)>,
}

impl<A: 'static> Action<A> {
    pub(crate) fn new(description: &str) -> Self {
        Self {
            id: ActionId::next(),
            description: Arc::from(description),
            _arg: PhantomData,
        }
    }

    pub fn id(&self) -> ActionId {
        self.id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn info(&self) -> ActionInfo {
        ActionInfo {
            description: Arc::clone(&self.description),
            arg_type: TypeId::of::<A>(),
            arg_type_name: type_name::<A>(),
        }
    }
}

impl<A> Clone for Action<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            description: Arc::clone(&self.description),
            _arg: PhantomData,
        }
    }
}

impl<A> PartialEq for Action<A> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<A> Eq for Action<A> {}

impl<A> fmt::Debug for Action<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("id", &self.id)
            .field("description", &&*self.description)
            .field("arg", &type_name::<A>())
            .finish()
    }
}

/// Registration record kept by a root store for every declared action.
#[derive(Debug, Clone)]
pub struct ActionInfo {
    pub description: Arc<str>,
    pub arg_type: TypeId,
    pub arg_type_name: &'static str,
}

impl ActionInfo {
    pub(crate) fn accepts(&self, arg: &(dyn Any + Send)) -> bool {
        arg.type_id() == self.arg_type
    }
}

/// A queued dispatch: which action, with which argument.
pub(crate) struct Invocation {
    pub action: ActionId,
    pub arg: Box<dyn Any + Send>,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("action", &self.action)
            .finish_non_exhaustive()
    }
}
