//! Error types for tabrank-core operations.

use std::path::PathBuf;

/// All errors that can occur in tabrank-core operations.
///
/// None of these are fatal to the session controller; each one is confined
/// to the single event that produced it.
#[derive(Debug, thiserror::Error)]
pub enum TabRankError {
    // ─────────────────────────────────────────────────────────────────────
    // Event Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Activity report has no tab id and no active tab to fall back to")]
    MissingTabId,

    // ─────────────────────────────────────────────────────────────────────
    // Display Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Display boundary failed during {operation}: {details}")]
    DisplayBoundary {
        operation: &'static str,
        details: String,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using TabRankError.
pub type Result<T> = std::result::Result<T, TabRankError>;

impl From<TabRankError> for String {
    fn from(err: TabRankError) -> String {
        err.to_string()
    }
}
