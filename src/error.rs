//! Error types surfaced by the replace workflow.
//!
//! Pattern and validation failures are handled where they are detected; storage and
//! suggestion failures travel one level up as a single user-facing message.

use thiserror::Error;

use crate::pattern::PatternError;

#[derive(Error, Debug)]
pub enum ReplaceError {
    /// Find pattern failed to compile.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// A required field is missing.
    #[error("{0}")]
    Validation(String),

    /// Another save or suggestion request is still running.
    #[error("Another operation is in progress")]
    Busy,

    /// The job store rejected or failed the write.
    #[error("Failed to save replacement job: {0}")]
    Storage(String),

    /// The suggestion collaborator failed or answered with an unusable shape.
    #[error("Suggestion request failed: {0}")]
    Suggestion(String),
}
