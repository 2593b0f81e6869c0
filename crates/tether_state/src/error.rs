//! Operation result taxonomy.
//!
//! Every store entry point returns one of these as an ordinary value so the
//! caller can decide whether to log, retry, or abort the wider operation.
//! Only [`OpError::InternalInconsistency`] marks a state that should be
//! structurally impossible — a defect, not a recoverable condition.

use thiserror::Error;

/// Errors returned by store mutations and lookups.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OpError {
    /// The operation referenced an ID with no existence record.
    #[error("no entity exists at that id")]
    NonexistentEntity,

    /// A get/remove referenced a kind not present on an otherwise-valid
    /// entity.
    #[error("the entity does not have that component")]
    NonexistentComponent,

    /// An add referenced a kind already present on the entity.
    #[error("the entity already has that component")]
    Redundant,

    /// An add was attempted before the kind's required kinds were present.
    #[error("the entity is missing prerequisite components")]
    PrerequisiteFailure,

    /// A remove was attempted while a dependent kind is still present.
    #[error("other components on the entity depend on that component")]
    DependencyFailure,

    /// The entity identifier space is exhausted.
    #[error("entity id space exhausted")]
    IdSpaceExhausted,

    /// The named kind has no collection in this store — either the schema
    /// never declared it or no Rust type was bound to it.
    #[error("kind {0:?} is not bound in this store")]
    UnboundKind(String),

    /// A kind ID outside the registry's table.
    #[error("unknown kind {0}")]
    UnknownKind(u16),

    /// A per-kind payload failed to encode or decode.
    #[error("component payload codec error: {0}")]
    Codec(String),

    /// A state that should be structurally impossible was reached.
    /// Treat as a programming-error assertion.
    #[error("internal consistency violation")]
    InternalInconsistency,
}
