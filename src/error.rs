//! Error taxonomy for the sync core
//!
//! Validation findings are collected into reports and returned, never
//! thrown; everything in this enum aborts the operation that produced it
//! and propagates to the caller. Each variant renders a short one-line
//! reason; compatibility failures carry the catalog's suggested
//! alternative so the CLI can print it alongside.

use thiserror::Error;

use crate::dialect::Dialect;

#[derive(Debug, Error)]
pub enum SyncError {
    /// Missing or invalid options: unknown dialect names, non-lazy
    /// registration with a deferred factory, cursor use without pooling.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Cannot reach the database or authenticate.
    #[error("connection failed: {0}")]
    Connectivity(String),

    /// A system-catalog query failed hard enough to abort introspection.
    /// Per-object failures become diagnostics instead.
    #[error("introspection failed during '{step}': {message}")]
    Introspection { step: String, message: String },

    /// The schema violates dialect rules severely enough to stop a sync.
    #[error("schema failed {dialect} validation with {errors} error(s)")]
    Validation { dialect: Dialect, errors: usize },

    /// A query capability was used that the active dialect lacks.
    #[error("{feature} is not supported on {dialect}")]
    Compatibility {
        dialect: Dialect,
        feature: String,
        suggestion: Option<String>,
    },

    /// Bad arguments to query convenience operations.
    #[error("invalid query arguments: {0}")]
    Query(String),

    /// Invariant violated mid-sync; carries a hint when the user can fix
    /// the situation themselves.
    #[error("{reason}")]
    Fatal {
        reason: String,
        hint: Option<String>,
    },

    /// A cancellation signal was observed at a suspension point.
    #[error("operation cancelled during '{0}'")]
    Cancelled(String),

    #[error("snapshot store error: {0}")]
    Snapshot(#[from] crate::snapshot::SnapshotError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// The `alternative`/hint string to print under the one-line reason,
    /// when the error carries one.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Compatibility { suggestion, .. } => suggestion.as_deref(),
            Self::Fatal { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_line_reasons() {
        let err = SyncError::Compatibility {
            dialect: Dialect::MySql,
            feature: "DISTINCT ON".to_string(),
            suggestion: Some("use GROUP BY".to_string()),
        };
        assert_eq!(err.to_string(), "DISTINCT ON is not supported on mysql");
        assert_eq!(err.suggestion(), Some("use GROUP BY"));

        let err = SyncError::Fatal {
            reason: "schema file contains function definitions".to_string(),
            hint: Some("move them to functions.rs or pass force".to_string()),
        };
        assert!(err.to_string().contains("function definitions"));
        assert!(err.suggestion().is_some());

        let err = SyncError::Configuration("cursor iteration requires pooling".to_string());
        assert!(err.suggestion().is_none());
    }
}
