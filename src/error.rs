use std::path::PathBuf;

use thiserror::Error;

/// Montage's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Montage's crate-wide error type.
///
/// The variants mirror how the pipeline reacts to a failure, not where it
/// happened:
/// - `MissingInput` / `MissingIndex` fail precondition checks before a stage runs.
/// - `FormatMismatch` marks an artifact that exists but cannot be read back;
///   ingestion stages respond by recomputing instead of surfacing it.
/// - `ExternalService` marks a collaborator call that failed after retries;
///   the planner boundary degrades to defaults instead of failing the job.
/// - `StageFailure` is fatal to the containing job.
#[derive(Debug, Error)]
pub enum Error {
    /// A required file or artifact is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// A source has no usable scene/embedding index.
    #[error("source '{alias}' has no usable index: {reason}")]
    MissingIndex { alias: String, reason: String },

    /// An expensive stage failed during execution.
    #[error("{stage} failed: {reason}")]
    StageFailure { stage: String, reason: String },

    /// A remote/AI collaborator failed.
    #[error("external service failure: {0}")]
    ExternalService(String),

    /// An on-disk artifact is present but unreadable or corrupt.
    #[error("unreadable artifact at {}: {reason}", path.display())]
    FormatMismatch { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Wrap an arbitrary stage error with the stage's display name.
    pub(crate) fn stage(stage: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::StageFailure {
            stage: stage.into(),
            reason: err.to_string(),
        }
    }

    pub(crate) fn missing_input(message: impl Into<String>) -> Self {
        Self::MissingInput(message.into())
    }
}
