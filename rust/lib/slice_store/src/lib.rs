//! Slice Store: single-writer, multi-reader reactive state store.
//!
//! One root store owns a state tree. Producers on any thread enqueue
//! actions; a single worker applies the reducers bound to each action and
//! then refreshes every selector, notifying observers of changed values.
//!
//! # Building Blocks
//!
//! - [`Lens`]: a typed path into the state tree; chains of member reads can
//!   also be written through in place
//! - [`Action`]: a declared operation with a typed argument
//! - reducers: `(state, arg) -> new value` bound to an action and a lens
//! - [`Selector`]: a derived value with change subscriptions
//! - [`ScopedStore`]: a sub-store that sees only the slice a lens addresses
//!
//! # Isolation
//!
//! [`Cloning`] controls how much the store shares with the caller: values
//! going in (initial state, reducer results) and coming out (selector values)
//! are copied per the chosen level. Aliasing is expressed with [`Shared`]
//! nodes; [`Replicate`] implements the copies.
//!
//! # Example
//!
//! ```
//! use std::sync::mpsc;
//! use std::time::Duration;
//! use slice_store::{Cloning, Lenses, Replicate, RootStore, ScopedStore, Store};
//!
//! #[derive(Clone, Debug, Default, PartialEq, Lenses, Replicate)]
//! struct Counter {
//!     value: i64,
//! }
//!
//! #[derive(Clone, Debug, Default, PartialEq, Lenses, Replicate)]
//! struct App {
//!     counter: Counter,
//!     echo: String,
//! }
//!
//! let store = RootStore::new(App::default(), Cloning::Deep).unwrap();
//! let counter = ScopedStore::new(store.clone(), App::lens_counter()).unwrap();
//!
//! let increment = counter.add_action::<i64>("increment");
//! counter
//!     .add_reducer(&increment, &Counter::lens_value(), |c: &Counter, by: &i64| c.value + by)
//!     .unwrap();
//!
//! let value = counter.select(&Counter::lens_value());
//! let (tx, rx) = mpsc::channel();
//! value.subscribe(move |v| tx.send(*v).unwrap());
//!
//! counter.dispatch(&increment, 5);
//! assert_eq!(rx.recv_timeout(Duration::from_secs(2)).unwrap(), 5);
//! ```

extern crate self as slice_store;

pub mod action;
pub mod cloning;
pub mod config;
pub mod error;
pub mod lens;
mod reducer;
pub mod root;
pub mod scoped;
pub mod selector;
pub mod shared;
pub mod store;

// Re-export primary types at crate root.
pub use action::{Action, ActionId, ActionInfo};
pub use cloning::{Cloning, Replicate};
pub use config::StoreConfig;
pub use error::{LensError, StoreError};
pub use lens::{Lens, Segment, concatenate};
pub use root::RootStore;
pub use scoped::ScopedStore;
pub use selector::{Observer, Selector, SubscriptionId};
pub use shared::Shared;
pub use store::Store;

pub use slice_store_derive::{Lenses, Replicate};

// Support for generated code. Not public API.
#[doc(hidden)]
pub mod __private {
    use crate::lens::Lens;

    /// Field lens emitted by `#[derive(Lenses)]`. `get` and `get_mut` must
    /// project the same field.
    pub fn field<R: 'static, T: 'static>(
        name: &'static str,
        writable: bool,
        get: fn(&R) -> &T,
        get_mut: fn(&mut R) -> &mut T,
    ) -> Lens<R, T> {
        if writable {
            Lens::field(name, get, get_mut)
        } else {
            Lens::readonly_field(name, get, get_mut)
        }
    }
}
