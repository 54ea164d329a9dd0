//! Error types for listsync.
//!
//! Every failure of a reconcile pass or a move surfaces as a [`ListSyncError`].
//! The import-aborting variants carry enough context (parent code, offending
//! reference code) for an operator to locate the bad source row.

use crate::models::ItemId;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the listsync library.
#[derive(Debug, Error)]
pub enum ListSyncError {
    // Import errors
    #[error("No entity for code \"{code}\" available when importing item with code \"{parent_code}\"")]
    ReferenceResolution { code: String, parent_code: String },

    #[error("No list type \"{code}\" registered for {resource}/{domain}")]
    TypeResolution {
        resource: String,
        domain: String,
        code: String,
    },

    // Ordering errors
    #[error("List items {id} and {before_id} belong to different groups")]
    GroupMismatch { id: ItemId, before_id: ItemId },

    // Store errors
    #[error("List item not found: {id}")]
    NotFound { id: ItemId },

    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for listsync operations.
pub type Result<T> = std::result::Result<T, ListSyncError>;

impl From<std::io::Error> for ListSyncError {
    fn from(err: std::io::Error) -> Self {
        ListSyncError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for ListSyncError {
    fn from(err: serde_json::Error) -> Self {
        ListSyncError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for ListSyncError {
    fn from(err: rusqlite::Error) -> Self {
        ListSyncError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl ListSyncError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        ListSyncError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Create a validation error for a field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        ListSyncError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Check if this error must abort the whole import run.
    ///
    /// Reference and type resolution failures cannot be fixed by retrying the
    /// same row, and a group mismatch is a caller bug.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ListSyncError::ReferenceResolution { .. }
                | ListSyncError::TypeResolution { .. }
                | ListSyncError::GroupMismatch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_names_parent_and_reference() {
        let err = ListSyncError::ReferenceResolution {
            code: "CNC".into(),
            parent_code: "U:TEST".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("\"CNC\""));
        assert!(msg.contains("\"U:TEST\""));
    }

    #[test]
    fn test_type_resolution_display() {
        let err = ListSyncError::TypeResolution {
            resource: "product".into(),
            domain: "media".into(),
            code: "unknown".into(),
        };
        assert_eq!(
            err.to_string(),
            "No list type \"unknown\" registered for product/media"
        );
    }

    #[test]
    fn test_fatal_errors() {
        assert!(ListSyncError::GroupMismatch {
            id: ItemId(1),
            before_id: ItemId(2)
        }
        .is_fatal());
        assert!(!ListSyncError::NotFound { id: ItemId(1) }.is_fatal());
        assert!(!ListSyncError::validation("position", "negative").is_fatal());
    }
}
