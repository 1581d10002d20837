//! Value-copy policy applied at the store's isolation boundaries.
//!
//! A store copies values at three points: when it is seeded with the initial
//! state, when a reducer's result is written into the live tree, and when a
//! selector value is handed to a reader or observer. How deep that copy goes
//! is the store's [`Cloning`] level, chosen once at construction.
//!
//! The copy itself is implemented per type by [`Replicate`]. For plain value
//! types every level is an ordinary `clone`; the levels only differ for trees
//! containing [`Shared`] nodes, which `clone` aliases.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::hash::{BuildHasher, Hash};
use std::rc::Rc;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::shared::Shared;

/// Copy operations the store needs from state and selector values.
///
/// `clone` is the aliasing copy: it must be cheap and may share nested
/// [`Shared`] nodes. `shallow_copy` produces a new top-level container whose
/// immediate fields are cloned. `deep_copy` recursively breaks every alias.
///
/// Derive it with `#[derive(Replicate)]`.
pub trait Replicate: Clone {
    fn shallow_copy(&self) -> Self {
        self.clone()
    }

    fn deep_copy(&self) -> Self;
}

/// How strictly a store isolates its internal state from the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cloning {
    /// Values are moved or aliased as-is. The store may share nodes with the caller.
    #[default]
    NoCopy,
    /// A fresh top-level container; nested shared nodes stay aliased.
    Shallow,
    /// A full structural copy with no aliasing left.
    Deep,
}

impl Cloning {
    /// Copy an owned value. `NoCopy` passes it through untouched.
    pub fn apply<T: Replicate>(self, value: T) -> T {
        match self {
            Cloning::NoCopy => value,
            Cloning::Shallow => value.shallow_copy(),
            Cloning::Deep => value.deep_copy(),
        }
    }

    /// Copy a borrowed value. `NoCopy` falls back to the aliasing `clone`.
    pub fn copy<T: Replicate>(self, value: &T) -> T {
        match self {
            Cloning::NoCopy => value.clone(),
            Cloning::Shallow => value.shallow_copy(),
            Cloning::Deep => value.deep_copy(),
        }
    }
}

impl<T: Replicate> Replicate for Shared<T> {
    fn shallow_copy(&self) -> Self {
        Shared::new(self.read().clone())
    }

    fn deep_copy(&self) -> Self {
        Shared::new(self.read().deep_copy())
    }
}

macro_rules! replicate_by_clone {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Replicate for $ty {
                #[inline]
                fn deep_copy(&self) -> Self {
                    self.clone()
                }
            }
        )*
    };
}

replicate_by_clone!(
    (), bool, char, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32, f64,
    String, &'static str, std::time::Duration,
);

impl<T: Replicate> Replicate for Option<T> {
    fn shallow_copy(&self) -> Self {
        self.as_ref().map(Replicate::shallow_copy)
    }

    fn deep_copy(&self) -> Self {
        self.as_ref().map(Replicate::deep_copy)
    }
}

impl<T: Replicate> Replicate for Box<T> {
    fn shallow_copy(&self) -> Self {
        Box::new((**self).shallow_copy())
    }

    fn deep_copy(&self) -> Self {
        Box::new((**self).deep_copy())
    }
}

// `Arc` and `Rc` clones alias, like `Shared`; only a deep copy detaches them.
impl<T: Replicate> Replicate for Arc<T> {
    fn deep_copy(&self) -> Self {
        Arc::new((**self).deep_copy())
    }
}

impl<T: Replicate> Replicate for Rc<T> {
    fn deep_copy(&self) -> Self {
        Rc::new((**self).deep_copy())
    }
}

impl<T: Replicate> Replicate for Vec<T> {
    fn deep_copy(&self) -> Self {
        self.iter().map(Replicate::deep_copy).collect()
    }
}

impl<T: Replicate> Replicate for VecDeque<T> {
    fn deep_copy(&self) -> Self {
        self.iter().map(Replicate::deep_copy).collect()
    }
}

impl<K, V, S> Replicate for HashMap<K, V, S>
where
    K: Replicate + Eq + Hash,
    V: Replicate,
    S: BuildHasher + Clone,
{
    fn deep_copy(&self) -> Self {
        let mut out = HashMap::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for (k, v) in self {
            out.insert(k.deep_copy(), v.deep_copy());
        }
        out
    }
}

impl<T, S> Replicate for HashSet<T, S>
where
    T: Replicate + Eq + Hash,
    S: BuildHasher + Clone,
{
    fn deep_copy(&self) -> Self {
        let mut out = HashSet::with_capacity_and_hasher(self.len(), self.hasher().clone());
        for v in self {
            out.insert(v.deep_copy());
        }
        out
    }
}

impl<K: Replicate + Ord, V: Replicate> Replicate for BTreeMap<K, V> {
    fn deep_copy(&self) -> Self {
        self.iter().map(|(k, v)| (k.deep_copy(), v.deep_copy())).collect()
    }
}

impl<T: Replicate + Ord> Replicate for BTreeSet<T> {
    fn deep_copy(&self) -> Self {
        self.iter().map(Replicate::deep_copy).collect()
    }
}

macro_rules! replicate_tuple {
    ($($name:ident : $idx:tt),+) => {
        impl<$($name: Replicate),+> Replicate for ($($name,)+) {
            fn deep_copy(&self) -> Self {
                ($(self.$idx.deep_copy(),)+)
            }
        }
    };
}

replicate_tuple!(A: 0);
replicate_tuple!(A: 0, B: 1);
replicate_tuple!(A: 0, B: 1, C: 2);
replicate_tuple!(A: 0, B: 1, C: 2, D: 3);
replicate_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4);
replicate_tuple!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
