//! Error types shared across the crate.
//!
//! Every fallible operation returns one of the kinds defined here. Parsers surface
//! [`Error::CorruptStructure`] and [`Error::IOFailure`] verbatim; techniques raise
//! [`Error::InsufficientSpace`] only once every candidate slot has been exhausted, and
//! dispatchers map filesystem mismatches to [`Error::UnsupportedFilesystem`].

use thiserror::Error;

/// `CanFail` is a return type for operations that are allowed to fail, and don't need to
/// return anything.
pub type CanFail<E> = core::result::Result<(), E>;

/// Crate-wide result alias.
pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The stream could not be classified, or it was classified as a filesystem variant
    /// with no backend for the requested technique.
    ///
    /// Dispatchers also raise this kind for the related mismatch of an envelope record
    /// emitted by a different technique than the one asked to replay it.
    #[error("unsupported filesystem: {0}")]
    UnsupportedFilesystem(String),

    /// The payload exceeds the capacity of the technique's slack region.
    #[error("insufficient hiding space: {0}")]
    InsufficientSpace(String),

    /// An on-disk structure carries values that violate the variant's invariants.
    #[error("corrupt filesystem structure: {0}")]
    CorruptStructure(String),

    /// The underlying device read or write failed.
    #[error("device i/o failure")]
    IOFailure(#[from] std::io::Error),

    /// A precondition of the operation does not hold: a slack region the technique
    /// expected to be empty was not in a way that prevents reliable recovery, the
    /// envelope holds no record under the requested key, or a target path named by the
    /// caller is absent from the volume.
    #[error("precondition violated: {0}")]
    PreconditionViolated(String),
}
