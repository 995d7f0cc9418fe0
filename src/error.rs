use crate::key::TypeKey;
use thiserror::Error;

/// Boxed error returned by observer callbacks.
pub type BoxError = Box<dyn std::error::Error + 'static>;

/// Errors that can occur when using the component containers
#[derive(Debug, Error)]
pub enum ComponentError {
    /// No component is stored under the requested key
    #[error("no component stored under {0}")]
    MissingKey(TypeKey),

    /// A value was assigned to a key other than its canonical key
    #[error("{value} is being assigned to {key} but it belongs to {expected} instead")]
    KeyMismatch {
        key: TypeKey,
        expected: TypeKey,
        value: String,
    },

    /// A derived type was used directly as a key instead of its abstract ancestor
    #[error("{key} is a child of an abstract component and can only be accessed with {canonical}")]
    InvalidKey { key: TypeKey, canonical: TypeKey },

    /// A component was missing from one of its ancestor sequences
    #[error("{value} is not present under {key}")]
    ValueNotFound { key: TypeKey, value: String },

    /// An observer callback failed; storage was already updated
    #[error("observer failed: {0}")]
    Observer(#[source] BoxError),

    /// The declared parents of a type have no consistent linearization
    #[error("cannot build a consistent ancestor chain for {0}")]
    InconsistentHierarchy(TypeKey),

    /// A persisted name is already taken by another type
    #[error("persisted name {name:?} is already used by {owner}")]
    DuplicateName { name: String, owner: TypeKey },

    /// A registered type was declared again with different ancestors
    #[error("ancestors of {0} cannot change once registered")]
    HierarchyChanged(TypeKey),

    /// A component type has no serde codec registered
    #[error("component type {0} is not registered for persistence")]
    UnregisteredType(String),

    /// A persisted type name is not known to the registry
    #[error("unknown component type name: {0}")]
    UnknownType(String),

    /// An observer without a registered name cannot be persisted
    #[error("observer on {0} has no name and cannot be persisted")]
    UnnamedObserver(TypeKey),

    /// A persisted observer name is not known to the registry
    #[error("unknown observer name: {0}")]
    UnknownObserver(String),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] toml_edit::de::Error),
}

pub type Result<T> = std::result::Result<T, ComponentError>;
