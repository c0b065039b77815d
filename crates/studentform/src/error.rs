//! Error types for studentform.
//!
//! This module defines all error types used throughout the studentform crate.
//! Some failure classes (location load, stats update, draft persistence) are
//! never surfaced to callers of the form workflow; they exist here so the
//! components that produce them can report them in one vocabulary before
//! logging them.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::validation::{ConsentItem, ValidationReport};

/// The main error type for studentform operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Form Workflow Errors ===
    /// The location dataset could not be loaded or was malformed.
    #[error("location data unavailable: {message}")]
    LocationLoad {
        /// Description of what went wrong.
        message: String,
    },

    /// One or more fields failed validation.
    #[error("form validation failed: {}", .0.labels().join(", "))]
    Validation(ValidationReport),

    /// Required consent checkboxes were not ticked.
    #[error("data protection consent required: {}", format_consent(.missing))]
    Consent {
        /// The consent items that are still unchecked.
        missing: Vec<ConsentItem>,
    },

    /// The media release form is incomplete.
    #[error("media release form incomplete: {}", .missing.join(", "))]
    MediaReleaseIncomplete {
        /// Labels of the missing media release fields.
        missing: Vec<String>,
    },

    /// The document store rejected or could not receive a submission.
    #[error("submission failed: {0}")]
    Submission(SubmissionFailure),

    /// The daily statistics document could not be updated.
    #[error("statistics update failed: {message}")]
    StatsUpdate {
        /// Description of what went wrong.
        message: String,
    },

    /// The local draft cache could not be read or written.
    #[error("draft persistence failed: {message}")]
    Persistence {
        /// Description of what went wrong.
        message: String,
    },

    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An operation timed out.
    #[error("operation timed out: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
    },

    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for studentform operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

fn format_consent(missing: &[ConsentItem]) -> String {
    missing
        .iter()
        .copied()
        .map(ConsentItem::label)
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Create a new location load error.
    #[must_use]
    pub fn location_load(message: impl Into<String>) -> Self {
        Self::LocationLoad {
            message: message.into(),
        }
    }

    /// Create a new persistence error.
    #[must_use]
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence {
            message: message.into(),
        }
    }

    /// Create a new stats update error.
    #[must_use]
    pub fn stats_update(message: impl Into<String>) -> Self {
        Self::StatsUpdate {
            message: message.into(),
        }
    }

    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Check if this error blocks submission because of form content.
    ///
    /// These are the failures the user fixes by editing the form rather than
    /// by retrying.
    #[must_use]
    pub fn is_form_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::Consent { .. } | Self::MediaReleaseIncomplete { .. }
        )
    }

    /// Check if this error came from the document store.
    #[must_use]
    pub fn is_submission_error(&self) -> bool {
        matches!(self, Self::Submission(_))
    }

    /// The message to show the person filling in the form.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(report) => report.user_message(),
            Self::Consent { missing } => {
                let items = missing
                    .iter()
                    .map(|item| format!("• {}", item.label()))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!(
                    "Data Protection Consent Required\n\n\
                     You must read and accept both data protection statements before submitting:\n\n\
                     {items}\n\n\
                     Please scroll down and check both consent checkboxes."
                )
            }
            Self::MediaReleaseIncomplete { .. } => {
                "Please complete both forms and accept the data protection terms before submitting."
                    .to_string()
            }
            Self::Submission(failure) => failure.user_message().to_string(),
            other => other.to_string(),
        }
    }
}

/// Known categories of document store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The store refused the write.
    PermissionDenied,
    /// The store could not be reached.
    Unavailable,
    /// The client is not authenticated.
    Unauthenticated,
    /// The store is rate limiting or out of quota.
    ResourceExhausted,
    /// The request did not complete in time.
    DeadlineExceeded,
    /// Anything else.
    Unknown,
}

impl FailureKind {
    /// Map a store error code such as `permission-denied` to a kind.
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "permission-denied" => Self::PermissionDenied,
            "unavailable" => Self::Unavailable,
            "unauthenticated" => Self::Unauthenticated,
            "resource-exhausted" => Self::ResourceExhausted,
            "deadline-exceeded" => Self::DeadlineExceeded,
            _ => Self::Unknown,
        }
    }

    /// The canonical code for this kind.
    #[must_use]
    pub fn code(self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::Unavailable => "unavailable",
            Self::Unauthenticated => "unauthenticated",
            Self::ResourceExhausted => "resource-exhausted",
            Self::DeadlineExceeded => "deadline-exceeded",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A rejected or undeliverable submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionFailure {
    /// The failure category.
    pub kind: FailureKind,
    /// The collection the write was aimed at.
    pub collection: String,
    /// The underlying store message.
    pub message: String,
}

impl SubmissionFailure {
    /// Create a new submission failure.
    #[must_use]
    pub fn new(kind: FailureKind, collection: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            collection: collection.into(),
            message: message.into(),
        }
    }

    /// The remapped message shown to the user.
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            FailureKind::PermissionDenied => {
                "Permission denied. Please check your connection and try again."
            }
            FailureKind::Unavailable => {
                "Service temporarily unavailable. Please try again in a few minutes."
            }
            FailureKind::Unauthenticated => {
                "Authentication error. Please refresh the page and try again."
            }
            FailureKind::ResourceExhausted => "Server is busy. Please try again in a few minutes.",
            FailureKind::DeadlineExceeded => {
                "Request timed out. Please check your connection and try again."
            }
            FailureKind::Unknown => "Submission failed. Please try again.",
        }
    }
}

impl fmt::Display for SubmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} writing to {}: {}", self.kind, self.collection, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consent_error_display() {
        let err = Error::Consent {
            missing: ConsentItem::ALL.to_vec(),
        };
        let text = err.to_string();
        assert!(text.contains(ConsentItem::DataProcessing.label()));
        assert!(text.contains(ConsentItem::RightsAcknowledgment.label()));
        assert!(text.contains(", "));
    }

    #[test]
    fn test_error_display() {
        let err = Error::location_load("file not found");
        assert_eq!(err.to_string(), "location data unavailable: file not found");

        let err = Error::internal("test error");
        assert_eq!(err.to_string(), "internal error: test error");
    }

    #[test]
    fn test_consent_error_names_missing_items() {
        let err = Error::Consent {
            missing: vec![ConsentItem::DataProcessing, ConsentItem::RightsAcknowledgment],
        };
        let msg = err.to_string();
        assert!(msg.contains("Data processing consent"));
        assert!(msg.contains("Rights acknowledgment"));

        let user = err.user_message();
        assert!(user.contains("• Data processing consent"));
        assert!(user.contains("• Rights acknowledgment"));
    }

    #[test]
    fn test_consent_error_single_item() {
        let err = Error::Consent {
            missing: vec![ConsentItem::RightsAcknowledgment],
        };
        let user = err.user_message();
        assert!(user.contains("Rights acknowledgment"));
        assert!(!user.contains("Data processing consent"));
    }

    #[test]
    fn test_is_form_error() {
        assert!(Error::Consent { missing: vec![] }.is_form_error());
        assert!(Error::MediaReleaseIncomplete { missing: vec![] }.is_form_error());
        assert!(!Error::internal("x").is_form_error());
    }

    #[test]
    fn test_failure_kind_from_code() {
        assert_eq!(
            FailureKind::from_code("permission-denied"),
            FailureKind::PermissionDenied
        );
        assert_eq!(FailureKind::from_code("unavailable"), FailureKind::Unavailable);
        assert_eq!(
            FailureKind::from_code("UNAUTHENTICATED"),
            FailureKind::Unauthenticated
        );
        assert_eq!(
            FailureKind::from_code("resource_exhausted"),
            FailureKind::ResourceExhausted
        );
        assert_eq!(
            FailureKind::from_code("deadline-exceeded"),
            FailureKind::DeadlineExceeded
        );
        assert_eq!(FailureKind::from_code("aborted"), FailureKind::Unknown);
    }

    #[test]
    fn test_failure_kind_code_round_trip() {
        for kind in [
            FailureKind::PermissionDenied,
            FailureKind::Unavailable,
            FailureKind::Unauthenticated,
            FailureKind::ResourceExhausted,
            FailureKind::DeadlineExceeded,
        ] {
            assert_eq!(FailureKind::from_code(kind.code()), kind);
        }
    }

    #[test]
    fn test_submission_failure_user_messages() {
        let failure = SubmissionFailure::new(FailureKind::Unavailable, "student_submissions", "503");
        assert!(failure.user_message().contains("temporarily unavailable"));

        let failure = SubmissionFailure::new(FailureKind::Unknown, "student_submissions", "boom");
        assert_eq!(failure.user_message(), "Submission failed. Please try again.");

        let err = Error::Submission(failure);
        assert!(err.is_submission_error());
        assert_eq!(err.user_message(), "Submission failed. Please try again.");
    }

    #[test]
    fn test_submission_failure_display() {
        let failure =
            SubmissionFailure::new(FailureKind::PermissionDenied, "media_submissions", "denied");
        let msg = failure.to_string();
        assert!(msg.contains("permission-denied"));
        assert!(msg.contains("media_submissions"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_json_error() {
        let json_result: std::result::Result<i32, serde_json::Error> =
            serde_json::from_str("not valid json");
        if let Err(json_err) = json_result {
            let err: Error = json_err.into();
            assert!(matches!(err, Error::Json(_)));
        }
    }

    #[test]
    fn test_from_rusqlite_error() {
        let result = rusqlite::Connection::open_with_flags(
            "/nonexistent/path/db.sqlite",
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        );
        if let Err(sqlite_err) = result {
            let err: Error = sqlite_err.into();
            assert!(matches!(err, Error::DatabaseQuery(_)));
        }
    }

    #[test]
    fn test_timeout_error_display() {
        let err = Error::Timeout {
            operation: "location data load".to_string(),
        };
        assert!(err.to_string().contains("location data load"));
    }
}
