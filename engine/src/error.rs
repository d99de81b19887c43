use std::path::{Path, PathBuf};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced by the engine.
///
/// `MalformedInput` and `DependencyFailure` are per-record: callers that process a batch log them,
/// count them, and move on. The others are fatal for the operation that raised them.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("resource unavailable: {}: {reason}", .path.display())]
    ResourceUnavailable { path: PathBuf, reason: String },
    #[error("lemmatizer failed on {word:?}: {reason}")]
    DependencyFailure { word: String, reason: String },
    #[error("corrupt index at {}: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },
}

impl Error {
    pub(crate) fn unavailable(path: &Path, reason: impl ToString) -> Self {
        Error::ResourceUnavailable { path: path.to_path_buf(), reason: reason.to_string() }
    }

    pub(crate) fn corrupt(path: &Path, reason: impl ToString) -> Self {
        Error::CorruptIndex { path: path.to_path_buf(), reason: reason.to_string() }
    }

    /// Whether the error only invalidates the current record rather than the whole operation.
    pub fn is_per_record(&self) -> bool {
        matches!(self, Error::MalformedInput(_) | Error::DependencyFailure { .. })
    }
}
