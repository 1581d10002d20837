//! Composable read/write paths into a state tree.
//!
//! A [`Lens<R, T>`] addresses one `T` inside an `R`. Field lenses come from
//! `#[derive(Lenses)]`, which only ever projects a named (or positional)
//! field; they are extended by stepping through [`Shared`] nodes
//! ([`Lens::shared`]) and by concatenation ([`Lens::then`]), so every lens
//! knows the exact member path it walks. Anything else has to be spelled
//! [`Lens::computed`], which yields a read-only, non-chain lens that reducers
//! and scoped stores refuse.
//!
//! Writes go *through* the path: the addressed member is assigned in place
//! and every ancestor on the way stays the same instance.
//!
//! # Laws
//!
//! For a writable lens `l`, any root `r` and value `v`:
//!
//! - `l.write_through(&mut r, v.clone()); l.get(&r) == v`
//! - identity: `Lens::identity().get(&r) == r`
//! - `Lens::identity().then(&l) == l == l.then(&Lens::identity())`
//!
//! # Examples
//!
//! ```
//! use slice_store::{Lens, Lenses};
//!
//! #[derive(Clone, Default, Lenses)]
//! struct Inner { count: u32 }
//! #[derive(Clone, Default, Lenses)]
//! struct Root { inner: Inner }
//!
//! let path = Root::lens_inner().then(&Inner::lens_count()).unwrap();
//!
//! let mut root = Root::default();
//! path.write_through(&mut root, 3).unwrap();
//! assert_eq!(path.get(&root), 3);
//! assert_eq!(path.to_string(), "$.inner.count");
//! ```
//!
//! There is no public constructor taking arbitrary accessors, so a method
//! call cannot pose as a member:
//!
//! ```compile_fail
//! use slice_store::Lens;
//!
//! let first: Lens<Vec<u32>, u32> =
//!     Lens::field("first", |v| v.first().unwrap(), |v| v.first_mut().unwrap());
//! ```
//!
//! It has to be a computed lens, which every chain check rejects:
//!
//! ```
//! use slice_store::Lens;
//!
//! let first = Lens::computed("first", |v: &Vec<u32>| v.first().copied());
//! assert!(!first.is_accessor_chain(false));
//! ```

use std::fmt;
use std::sync::Arc;

use crate::error::LensError;
use crate::shared::Shared;

type Reader<R, T> = Arc<dyn Fn(&R, &mut dyn FnMut(&T)) + Send + Sync>;
type Writer<R, T> = Arc<dyn Fn(&mut R, &mut dyn FnMut(&mut T)) + Send + Sync>;

/// One step of an accessor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Segment {
    /// A named member. `writable` is false for members that must not be assigned.
    Field { name: &'static str, writable: bool },
    /// Entering the contents of a [`Shared`] node.
    Shared,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Shape {
    Chain,
    Computed(&'static str),
}

pub struct Lens<R, T> {
    segments: Vec<Segment>,
    shape: Shape,
    reader: Reader<R, T>,
    writer: Option<Writer<R, T>>,
}

impl<R: 'static> Lens<R, R> {
    /// The lens selecting the whole value.
    pub fn identity() -> Self {
        Self {
            segments: Vec::new(),
            shape: Shape::Chain,
            reader: Arc::new(|root: &R, f: &mut dyn FnMut(&R)| f(root)),
            writer: Some(Arc::new(|root: &mut R, f: &mut dyn FnMut(&mut R)| f(root))),
        }
    }
}

impl<T: 'static> Lens<Shared<T>, T> {
    /// The contents of a shared root node.
    pub fn node() -> Self {
        Lens::<Shared<T>, Shared<T>>::identity().shared()
    }
}

impl<R: 'static, T: 'static> Lens<R, T> {
    /// A writable member.
    ///
    /// Accessors are plain function pointers, so they cannot capture state.
    pub(crate) fn field(name: &'static str, get: fn(&R) -> &T, get_mut: fn(&mut R) -> &mut T) -> Self {
        Self::member(name, true, get, get_mut)
    }

    /// A member that can be traversed but never assigned.
    ///
    /// Writes to members *below* it are still allowed.
    pub(crate) fn readonly_field(
        name: &'static str,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        Self::member(name, false, get, get_mut)
    }

    fn member(
        name: &'static str,
        writable: bool,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Self {
        Self {
            segments: vec![Segment::Field { name, writable }],
            shape: Shape::Chain,
            reader: Arc::new(move |root: &R, f: &mut dyn FnMut(&T)| f(get(root))),
            writer: Some(Arc::new(move |root: &mut R, f: &mut dyn FnMut(&mut T)| {
                f(get_mut(root))
            })),
        }
    }

    /// An arbitrary derivation. Readable, but never an accessor chain.
    pub fn computed<F>(name: &'static str, compute: F) -> Self
    where
        F: Fn(&R) -> T + Send + Sync + 'static,
    {
        Self {
            segments: Vec::new(),
            shape: Shape::Computed(name),
            reader: Arc::new(move |root: &R, f: &mut dyn FnMut(&T)| f(&compute(root))),
            writer: None,
        }
    }

    pub fn is_identity(&self) -> bool {
        self.shape == Shape::Chain && self.segments.is_empty()
    }

    /// True if this lens is a pure chain of member reads, and, when
    /// `require_writable` is set, its outermost member can be assigned.
    pub fn is_accessor_chain(&self, require_writable: bool) -> bool {
        self.shape == Shape::Chain && (!require_writable || self.is_writable())
    }

    /// True if [`write_through`](Self::write_through) can succeed.
    ///
    /// The outermost segment decides. A field is writable unless it was
    /// declared read-only. Ending in a [`Segment::Shared`] step replaces the
    /// node's contents and never reassigns the handle, so it is writable
    /// whatever the field holding the node says. An empty chain replaces the
    /// root and is always writable.
    pub fn is_writable(&self) -> bool {
        if self.shape != Shape::Chain || self.writer.is_none() {
            return false;
        }
        match self.segments.last() {
            Some(Segment::Field { writable, .. }) => *writable,
            Some(Segment::Shared) | None => true,
        }
    }

    /// Segments from the root outwards.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Segments from the target inwards: the outermost member comes first.
    pub fn members_in_chain(&self) -> Vec<Segment> {
        self.segments.iter().rev().copied().collect()
    }

    /// Append `child` to this lens.
    ///
    /// Identity on either side yields the other operand unchanged. Otherwise
    /// `self` must be an accessor chain and `child` a writable one.
    pub fn then<U: 'static>(&self, child: &Lens<T, U>) -> Result<Lens<R, U>, LensError> {
        let (segments, shape) = if self.is_identity() {
            (child.segments.clone(), child.shape)
        } else if child.is_identity() {
            (self.segments.clone(), self.shape)
        } else if self.is_accessor_chain(false) && child.is_accessor_chain(true) {
            let mut segments = self.segments.clone();
            segments.extend_from_slice(&child.segments);
            (segments, Shape::Chain)
        } else {
            return Err(LensError::NotConcatenable {
                root: self.to_string(),
                child: child.to_string(),
            });
        };

        let outer = Arc::clone(&self.reader);
        let inner = Arc::clone(&child.reader);
        let reader: Reader<R, U> = Arc::new(move |root: &R, f: &mut dyn FnMut(&U)| {
            outer(root, &mut |mid: &T| inner(mid, &mut *f))
        });

        let writer = match (&self.writer, &child.writer) {
            (Some(outer), Some(inner)) => {
                let (outer, inner) = (Arc::clone(outer), Arc::clone(inner));
                let writer: Writer<R, U> =
                    Arc::new(move |root: &mut R, f: &mut dyn FnMut(&mut U)| {
                        outer(root, &mut |mid: &mut T| inner(mid, &mut *f))
                    });
                Some(writer)
            }
            _ => None,
        };

        Ok(Lens {
            segments,
            shape,
            reader,
            writer,
        })
    }

    /// Borrow the target and map it.
    pub fn view<U>(&self, root: &R, f: impl FnOnce(&T) -> U) -> U {
        let mut f = Some(f);
        let mut out = None;
        (self.reader)(root, &mut |target: &T| {
            if let Some(f) = f.take() {
                out = Some(f(target));
            }
        });
        match out {
            Some(out) => out,
            None => unreachable!("lens {} did not visit its target", self),
        }
    }

    /// Clone the target out of `root`.
    pub fn get(&self, root: &R) -> T
    where
        T: Clone,
    {
        self.view(root, T::clone)
    }

    /// Assign `value` to the addressed member of `root`, in place.
    pub fn write_through(&self, root: &mut R, value: T) -> Result<(), LensError> {
        if self.shape != Shape::Chain {
            return Err(LensError::NotAccessorChain(self.to_string()));
        }
        let writer = match &self.writer {
            Some(writer) if self.is_writable() => writer,
            _ => return Err(LensError::NotWritable(self.to_string())),
        };
        let mut value = Some(value);
        writer(root, &mut |slot: &mut T| {
            if let Some(value) = value.take() {
                *slot = value;
            }
        });
        Ok(())
    }
}

impl<R: 'static, T: 'static> Lens<R, Shared<T>> {
    /// Step into the shared node this lens addresses.
    pub fn shared(&self) -> Lens<R, T> {
        let outer = Arc::clone(&self.reader);
        let reader: Reader<R, T> = Arc::new(move |root: &R, f: &mut dyn FnMut(&T)| {
            outer(root, &mut |node: &Shared<T>| f(&*node.read()))
        });
        let writer = self.writer.as_ref().map(|outer| {
            let outer = Arc::clone(outer);
            let writer: Writer<R, T> = Arc::new(move |root: &mut R, f: &mut dyn FnMut(&mut T)| {
                outer(root, &mut |node: &mut Shared<T>| f(&mut *node.write()))
            });
            writer
        });

        let mut segments = self.segments.clone();
        segments.push(Segment::Shared);
        Lens {
            segments,
            shape: self.shape,
            reader,
            writer,
        }
    }

    /// `self.shared().then(child)`.
    pub fn then_shared<U: 'static>(&self, child: &Lens<T, U>) -> Result<Lens<R, U>, LensError> {
        self.shared().then(child)
    }
}

/// Free-function form of [`Lens::then`].
pub fn concatenate<R: 'static, M: 'static, T: 'static>(
    root: &Lens<R, M>,
    child: &Lens<M, T>,
) -> Result<Lens<R, T>, LensError> {
    root.then(child)
}

impl<R, T> Clone for Lens<R, T> {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments.clone(),
            shape: self.shape,
            reader: Arc::clone(&self.reader),
            writer: self.writer.clone(),
        }
    }
}

/// Lenses are equal when they walk the same path. Accessor functions are not compared.
impl<R, T> PartialEq for Lens<R, T> {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments && self.shape == other.shape
    }
}

impl<R, T> fmt::Display for Lens<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for seg in &self.segments {
            if let Segment::Field { name, .. } = seg {
                write!(f, ".{}", name)?;
            }
        }
        if let Shape::Computed(name) = self.shape {
            write!(f, " => {}", name)?;
        }
        Ok(())
    }
}

impl<R, T> fmt::Debug for Lens<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lens")
            .field("path", &self.to_string())
            .field("segments", &self.segments)
            .finish()
    }
}
