use thiserror::Error;

use crate::action::ActionId;

/// Structural errors raised while building, composing or writing through a lens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LensError {
    #[error("lens is not a field accessor chain: {0}")]
    NotAccessorChain(String),

    #[error("lens does not end in a writable member: {0}")]
    NotWritable(String),

    #[error("cannot concatenate {root} with {child}: root must be an accessor chain and child a writable one")]
    NotConcatenable { root: String, child: String },
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    Lens(#[from] LensError),

    #[error("action {0} is not registered with this store")]
    UnknownAction(ActionId),

    #[error("action {action} expects an argument of type {expected}")]
    ArgumentTypeMismatch {
        action: ActionId,
        expected: &'static str,
    },

    #[error("store has been disposed")]
    Disposed,

    #[error("failed to start store worker: {0}")]
    Worker(#[from] std::io::Error),
}
