//! Error types for the Stride engine.
//!
//! Provides structured error handling with:
//! - Machine-readable error codes (`ErrorCode`)
//! - Category-based exit codes (2=db, 3=not_found, 4=validation, etc.)
//! - Retryability flags so callers know what is safe to resend
//! - Context-aware recovery hints
//! - Structured JSON output for piped / non-TTY consumers

use thiserror::Error;

/// Result type alias for Stride operations.
pub type Result<T> = std::result::Result<T, Error>;

// ── Error Code ────────────────────────────────────────────────

/// Machine-readable error codes grouped by category.
///
/// Each code maps to a SCREAMING_SNAKE string and a category-based
/// exit code. API callers match on the string; shell scripts on the
/// exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Database (exit 2)
    DatabaseError,

    // Not Found (exit 3)
    ProgressNotFound,

    // Validation / policy (exit 4)
    NotStarted,
    InvalidItem,
    InvalidArgument,

    // Concurrency (exit 5)
    Conflict,

    // Collaborator (exit 6)
    DependencyUnavailable,

    // Config (exit 7)
    ConfigError,

    // I/O (exit 8)
    IoError,
    JsonError,

    // Internal (exit 1)
    InternalError,
}

impl ErrorCode {
    /// Machine-readable SCREAMING_SNAKE code string.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::ProgressNotFound => "PROGRESS_NOT_FOUND",
            Self::NotStarted => "NOT_STARTED",
            Self::InvalidItem => "INVALID_ITEM",
            Self::InvalidArgument => "INVALID_ARGUMENT",
            Self::Conflict => "CONFLICT",
            Self::DependencyUnavailable => "DEPENDENCY_UNAVAILABLE",
            Self::ConfigError => "CONFIG_ERROR",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Category-based exit code (1-8).
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::InternalError => 1,
            Self::DatabaseError => 2,
            Self::ProgressNotFound => 3,
            Self::NotStarted | Self::InvalidItem | Self::InvalidArgument => 4,
            Self::Conflict => 5,
            Self::DependencyUnavailable => 6,
            Self::ConfigError => 7,
            Self::IoError | Self::JsonError => 8,
        }
    }

    /// Whether the caller should retry the same request.
    ///
    /// True for optimistic-concurrency collisions (retry with a fresh
    /// read) and collaborator outages. False for policy rejections,
    /// not-found, I/O, or internal errors.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict | Self::DependencyUnavailable)
    }
}

// ── Error Enum ────────────────────────────────────────────────

/// Errors that can occur in Stride engine operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("No progress record for {content_type}/{content_id} (user {user_id})")]
    ProgressNotFound {
        user_id: String,
        content_type: String,
        content_id: String,
    },

    #[error("Plan {content_id} has not been started yet")]
    NotStarted { content_id: String },

    #[error("Progress record changed concurrently, retry with a fresh read")]
    Conflict,

    #[error("Item {item_id} is not part of plan {content_id}")]
    InvalidItem {
        item_id: String,
        content_id: String,
    },

    #[error("Content provider unavailable: {0}")]
    DependencyUnavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Map this error to its structured `ErrorCode`.
    #[must_use]
    pub const fn error_code(&self) -> ErrorCode {
        match self {
            Self::ProgressNotFound { .. } => ErrorCode::ProgressNotFound,
            Self::NotStarted { .. } => ErrorCode::NotStarted,
            Self::Conflict => ErrorCode::Conflict,
            Self::InvalidItem { .. } => ErrorCode::InvalidItem,
            Self::DependencyUnavailable(_) => ErrorCode::DependencyUnavailable,
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::Json(_) => ErrorCode::JsonError,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::Config(_) => ErrorCode::ConfigError,
            Self::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Category-based exit code, delegating to the `ErrorCode`.
    #[must_use]
    pub const fn exit_code(&self) -> u8 {
        self.error_code().exit_code()
    }

    /// Context-aware recovery hint for callers and humans.
    ///
    /// Returns `None` if no actionable suggestion exists.
    #[must_use]
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::NotStarted { content_id } => Some(format!(
                "Start the plan before checking items off:\n  \
                 stride progress start <user> <type> {content_id} --items <id,...>"
            )),

            Self::ProgressNotFound {
                content_type,
                content_id,
                ..
            } => Some(format!(
                "No progress exists for {content_type}/{content_id}. \
                 Use `stride progress start` to begin tracking."
            )),

            Self::Conflict => Some(
                "Another request updated this record first. \
                 Re-read and resend; the operation is safe to retry."
                    .to_string(),
            ),

            Self::InvalidItem { content_id, .. } => Some(format!(
                "Item ids are fixed when the plan is started. \
                 Use `stride progress show <user> <type> {content_id}` to list them."
            )),

            Self::DependencyUnavailable(_) => Some(
                "The content service did not answer. This is transient; retry the request."
                    .to_string(),
            ),

            Self::Database(_)
            | Self::Io(_)
            | Self::Json(_)
            | Self::InvalidArgument(_)
            | Self::Config(_)
            | Self::Other(_) => None,
        }
    }

    /// Structured JSON representation for machine consumption.
    ///
    /// Includes error code, message, retryability, exit code, and
    /// optional recovery hint.
    #[must_use]
    pub fn to_structured_json(&self) -> serde_json::Value {
        let code = self.error_code();
        let mut obj = serde_json::json!({
            "error": {
                "code": code.as_str(),
                "message": self.to_string(),
                "retryable": code.is_retryable(),
                "exit_code": code.exit_code(),
            }
        });

        if let Some(hint) = self.hint() {
            obj["error"]["hint"] = serde_json::Value::String(hint);
        }

        obj
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_by_category() {
        let e = Error::NotStarted {
            content_id: "plan-1".to_string(),
        };
        assert_eq!(e.exit_code(), 4);

        assert_eq!(Error::Conflict.exit_code(), 5);
        assert_eq!(
            Error::DependencyUnavailable("timeout".to_string()).exit_code(),
            6
        );
    }

    #[test]
    fn test_retryable_flags() {
        assert!(ErrorCode::Conflict.is_retryable());
        assert!(ErrorCode::DependencyUnavailable.is_retryable());
        assert!(!ErrorCode::NotStarted.is_retryable());
        assert!(!ErrorCode::ProgressNotFound.is_retryable());
    }

    #[test]
    fn test_structured_json_includes_hint() {
        let e = Error::NotStarted {
            content_id: "plan-1".to_string(),
        };
        let json = e.to_structured_json();
        assert_eq!(json["error"]["code"], "NOT_STARTED");
        assert!(
            json["error"]["hint"]
                .as_str()
                .unwrap()
                .contains("progress start")
        );
    }
}
