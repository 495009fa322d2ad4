//! Error handling for shardsel.
//!
//! This module provides:
//! - [`ShardselError`]: The main error enum for all operations
//! - [`ErrorCode`]: Standardized error codes for machine parsing
//! - [`StructuredError`]: Rich error type with suggestions and context

mod codes;
mod suggestions;

use std::io;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub use codes::ErrorCode;
pub use suggestions::suggest_for_error;

/// Main error type for shardsel operations.
#[derive(Error, Debug)]
pub enum ShardselError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Search index error: {0}")]
    SearchIndex(#[from] tantivy::TantivyError),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Unknown selection method: {0}")]
    UnknownMethod(String),

    #[error("Unknown shard: {0}")]
    UnknownShard(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Sample index unavailable: {0}")]
    SampleIndexUnavailable(String),

    #[error("Term statistics unavailable: {0}")]
    StatsUnavailable(String),

    #[error("Statistics build failed: {0}")]
    BuildFailed(String),

    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    #[error("Lock failed: {0}")]
    LockFailed(String),
}

impl ShardselError {
    /// Get the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Database(_) => ErrorCode::DatabaseError,
            Self::Io(_) => ErrorCode::IoError,
            Self::SearchIndex(_) => ErrorCode::IndexCorrupted,
            Self::Json(_) => ErrorCode::SerializationError,
            Self::Config(_) => ErrorCode::ConfigInvalid,
            Self::UnknownMethod(_) => ErrorCode::UnknownMethod,
            Self::UnknownShard(_) => ErrorCode::UnknownShard,
            Self::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Self::SampleIndexUnavailable(_) => ErrorCode::SampleIndexUnavailable,
            Self::StatsUnavailable(_) => ErrorCode::StatsUnavailable,
            Self::BuildFailed(_) => ErrorCode::BuildFailed,
            Self::LockTimeout(_) => ErrorCode::LockTimeout,
            Self::LockFailed(_) => ErrorCode::LockFailed,
        }
    }

    /// Get context information for this error as JSON.
    #[must_use]
    pub fn context(&self) -> Option<Value> {
        match self {
            Self::UnknownShard(shard) => Some(serde_json::json!({ "shard": shard })),
            Self::UnknownMethod(method) => Some(serde_json::json!({ "method": method })),
            _ => None,
        }
    }

    /// Convert this error to a structured error.
    #[must_use]
    pub fn to_structured(&self) -> StructuredError {
        StructuredError::from_error(self)
    }
}

/// A structured error with machine-readable code, suggestion, and context.
///
/// Printed in machine output mode so scripts can branch on `code`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// The error code (e.g., "UNKNOWN_SHARD")
    pub code: ErrorCode,

    /// The numeric error code (e.g., 302)
    pub numeric_code: u16,

    /// Human-readable error message
    pub message: String,

    /// Actionable suggestion for recovery
    pub suggestion: String,

    /// Additional context for debugging
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,

    /// Whether this error is potentially recoverable by the user
    pub recoverable: bool,

    /// Error category (e.g., "selection", "storage")
    pub category: String,
}

impl StructuredError {
    /// Create a new structured error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            numeric_code: code.numeric(),
            suggestion: code.suggestion().to_string(),
            context: None,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
            code,
            message: message.into(),
        }
    }

    /// Create a structured error from a [`ShardselError`].
    #[must_use]
    pub fn from_error(err: &ShardselError) -> Self {
        let code = err.code();
        let context = err.context();
        let suggestion = suggest_for_error(code, context.as_ref());

        Self {
            code,
            numeric_code: code.numeric(),
            message: err.to_string(),
            suggestion,
            context,
            recoverable: code.is_recoverable(),
            category: code.category().to_string(),
        }
    }

    /// Add context to this error.
    #[must_use]
    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self.suggestion = suggest_for_error(self.code, self.context.as_ref());
        self
    }
}

impl std::fmt::Display for StructuredError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl From<&ShardselError> for StructuredError {
    fn from(err: &ShardselError) -> Self {
        Self::from_error(err)
    }
}

/// Result type alias using [`ShardselError`].
pub type Result<T> = std::result::Result<T, ShardselError>;
