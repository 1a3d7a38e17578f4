//! Error types for runtime operations.

use washi_model::ModelError;

use crate::backend::TransportError;

/// Errors from session and view-bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A model operation was rejected; contained to its block or mark.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// An outbound call could not be dispatched.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Two view factories registered for one element type.
    #[error("view factory for element type {0:?} registered twice")]
    DuplicateView(String),

    /// No view factory registered for an element type.
    #[error("no view factory registered for element type {0:?}")]
    UnknownView(String),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;
