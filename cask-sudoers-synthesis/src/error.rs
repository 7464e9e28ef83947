//! Error types for cask-sudoers synthesis

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors surfaced by the synthesis pipeline and its collaborators.
///
/// None of these abort a whole run: the service turns them into per-package
/// failure markers or warnings.
#[derive(Debug, Error)]
pub enum SynthesisError {
    /// Metadata could not be retrieved for a package
    #[error("Failed to retrieve metadata for '{token}': {message}")]
    Retrieval { token: String, message: String },

    /// Metadata was retrieved but had an unusable shape
    #[error("Malformed metadata: {0}")]
    Metadata(String),

    /// Reading a log source or writing output failed
    #[error("Failed to {operation} '{}': {source}", path.display())]
    Io {
        operation: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An external program could not be spawned or exited unsuccessfully
    #[error("Command '{command}' failed: {message}")]
    Command { command: String, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SynthesisError {
    pub fn retrieval(token: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Retrieval {
            token: token.into(),
            message: message.into(),
        }
    }

    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata(message.into())
    }

    pub fn io(operation: impl Into<String>, path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Command {
            command: command.into(),
            message: message.into(),
        }
    }
}

pub type SynthesisResult<T> = Result<T, SynthesisError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mentions_path() {
        let err = SynthesisError::io(
            "read log",
            "/tmp/missing.log",
            std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        );
        let message = err.to_string();
        assert!(message.contains("read log"));
        assert!(message.contains("/tmp/missing.log"));
    }

    #[test]
    fn test_retrieval_error_mentions_token() {
        let err = SynthesisError::retrieval("firefox", "brew exited with status 1");
        assert_eq!(
            err.to_string(),
            "Failed to retrieve metadata for 'firefox': brew exited with status 1"
        );
    }
}
