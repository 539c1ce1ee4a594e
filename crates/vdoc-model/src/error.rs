//! Typed errors for the model layer.
//!
//! Structural errors are distinct kinds at the graph boundary so bulk
//! operations (merge, amend) can match on them and convert to recorded
//! warnings instead of aborting.

use thiserror::Error;

/// Errors raised by mutations on a [`crate::model::Model`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    /// The id is syntactically invalid (bad leading character, reserved word, …).
    #[error("invalid id `{0}`")]
    InvalidId(String),

    /// The id is already taken by another node in the same model.
    #[error("duplicate id `{0}`")]
    DuplicateId(String),

    /// Reparenting would make a node its own ancestor.
    #[error("reparenting `{child}` under `{parent}` would create a cycle")]
    WouldCreateCycle { child: String, parent: String },

    /// The node handle does not refer to a live node in this model.
    #[error("unknown node")]
    UnknownNode,

    /// A binding expression names an id that does not exist in the model.
    #[error("unresolved reference `{0}`")]
    UnresolvedReference(String),

    /// The property exists but holds a different variant than the operation expects.
    #[error("property `{name}` is not a {expected}")]
    WrongPropertyKind {
        name: String,
        expected: &'static str,
    },

    /// The root node cannot be destroyed, reparented, or detached.
    #[error("operation not allowed on the root node")]
    RootNode,
}
