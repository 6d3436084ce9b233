//! Error taxonomy for the revision graph engine.
//!
//! Invalid references surface as errors and are left to the embedding view
//! layer to render (typically as a not-found response). Cycles in the link
//! graph are deliberately *not* errors; the traversal components truncate
//! them and return partial results.

use thiserror::Error;

/// Error types for trunk, document, and content access
#[derive(Debug, Error)]
pub enum LanternError {
    /// Trunk id does not resolve or is malformed
    #[error("Invalid trunk: {0}")]
    InvalidTrunk(String),

    /// Doc id does not resolve, does not belong to the referenced trunk's
    /// revision history, or the trunk has no head
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Content element id does not resolve
    #[error("Invalid element: {0}")]
    InvalidElement(String),

    /// Element is not a widget, or widget state is unusable
    #[error("Invalid widget: {0}")]
    InvalidWidget(String),

    /// Element is not a quiz link, or quiz state is unusable
    #[error("Invalid quiz: {0}")]
    InvalidQuiz(String),
}

/// Convenience alias used throughout the crate
pub type Result<T> = std::result::Result<T, LanternError>;
