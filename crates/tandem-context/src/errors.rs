//! Error types for context gathering.

use thiserror::Error;

/// Errors from the context subsystem.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Reading a source file from disk failed.
    #[error("failed to read {path}: {source}")]
    FileRead {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The search collaborator returned an error.
    #[error("search failed: {0}")]
    Search(String),

    /// The filesystem watcher could not be initialized.
    #[error("watcher initialization failed: {0}")]
    WatcherInit(String),
}

impl ContextError {
    /// Short category string for logging.
    #[must_use]
    pub fn category(&self) -> &'static str {
        match self {
            Self::FileRead { .. } => "file_read",
            Self::Search(_) => "search",
            Self::WatcherInit(_) => "watcher",
        }
    }

    /// Whether the gather pass can continue past this error.
    ///
    /// Every context error is recoverable: a missing file is skipped, a
    /// failed search yields an empty bundle, a dead watcher degrades to
    /// manual invalidation.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories() {
        let err = ContextError::Search("rg not found".into());
        assert_eq!(err.category(), "search");
        assert!(err.is_recoverable());
    }

    #[test]
    fn file_read_display_includes_path() {
        let err = ContextError::FileRead {
            path: "src/main.rs".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        };
        assert!(err.to_string().contains("src/main.rs"));
    }
}
