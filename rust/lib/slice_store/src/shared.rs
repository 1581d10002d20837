use std::fmt;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A reference-counted, lock-protected node inside a state tree.
///
/// `Shared` is how a state tree expresses sub-objects that can be aliased:
/// cloning a `Shared` hands out another handle to the *same* node, so a write
/// through one handle is visible through every other. Whether the store keeps
/// such aliases or breaks them is decided by its [`Cloning`](crate::Cloning)
/// level, via [`Replicate`](crate::Replicate).
///
/// Equality compares the node contents, not the handles.
pub struct Shared<T> {
    node: Arc<RwLock<T>>,
}

impl<T> Shared<T> {
    pub fn new(value: T) -> Self {
        Self {
            node: Arc::new(RwLock::new(value)),
        }
    }

    /// Lock the node for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, T> {
        self.node.read()
    }

    /// Lock the node for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, T> {
        self.node.write()
    }

    /// Replace the node contents in place, visible through every alias.
    pub fn set(&self, value: T) {
        *self.node.write() = value;
    }

    /// True if both handles point at the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.node, &other.node)
    }

    /// Number of live handles to this node.
    pub fn alias_count(&self) -> usize {
        Arc::strong_count(&self.node)
    }
}

impl<T: Clone> Shared<T> {
    /// Clone the node contents out of the lock.
    pub fn get(&self) -> T {
        self.node.read().clone()
    }
}

impl<T> Clone for Shared<T> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<T: PartialEq> PartialEq for Shared<T> {
    fn eq(&self, other: &Self) -> bool {
        // Same node: locking it twice for reading could stall behind a writer.
        if self.ptr_eq(other) {
            return true;
        }
        *self.node.read() == *other.node.read()
    }
}

impl<T: Eq> Eq for Shared<T> {}

impl<T: Default> Default for Shared<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T> From<T> for Shared<T> {
    fn from(value: T) -> Self {
        Self::new(value)
    }
}

impl<T: fmt::Debug> fmt::Debug for Shared<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Shared").field(&*self.node.read()).finish()
    }
}
