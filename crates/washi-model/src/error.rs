//! Error types for document model operations.

use washi_types::BlockId;

use crate::schema::SchemaError;

/// Errors from model operations.
///
/// Every variant is contained to the block or mark that raised it — none of
/// these poison the document or the editing surface.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Block not found in document.
    #[error("block not found: {0:?}")]
    BlockNotFound(BlockId),

    /// Paragraph operation on a non-paragraph block.
    #[error("block {0:?} is not a paragraph")]
    NotAParagraph(BlockId),

    /// Code operation on a non-code block.
    #[error("block {0:?} is not a code block")]
    NotACodeBlock(BlockId),

    /// Run requested with nothing to execute.
    #[error("refusing to run an empty source")]
    EmptySource,

    /// Run requested while the previous one is still in flight.
    #[error("a run is already in progress")]
    RunInProgress,

    /// Mark operation over an empty range.
    #[error("cannot mark an empty range")]
    EmptyRange,

    /// Range outside the paragraph text.
    #[error("range {start}..{end} out of bounds for text of length {len}")]
    RangeOutOfBounds {
        start: usize,
        end: usize,
        len: usize,
    },

    /// Byte position inside a multi-byte character.
    #[error("position {0} is not a character boundary")]
    NotCharBoundary(usize),

    /// Malformed persisted element.
    #[error("malformed persisted element: {0}")]
    Validation(String),

    /// Schema registration failure.
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Result type for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;
