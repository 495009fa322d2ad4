//! Standardized error codes for machine-parseable output.
//!
//! Error codes follow a numeric taxonomy:
//! - 1xx: Config errors
//! - 2xx: Index errors
//! - 3xx: Selection errors
//! - 6xx: Storage errors
//! - 85x: Lock errors
//! - 9xx: Internal errors

use serde::{Deserialize, Serialize};

/// Standardized error codes for machine output.
///
/// Each variant maps to a numeric code (e.g., `UnknownShard` -> E302).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================
    // Config errors (1xx)
    // ========================================
    /// E101: Config file has invalid syntax or values
    ConfigInvalid,

    // ========================================
    // Index errors (2xx)
    // ========================================
    /// E201: Corpus or sample index files are corrupted or unreadable
    IndexCorrupted,
    /// E202: The centralized sample index has not been created
    SampleIndexUnavailable,

    // ========================================
    // Selection errors (3xx)
    // ========================================
    /// E301: Strategy name did not match any selection method
    UnknownMethod,
    /// E302: Shard or topic id is not part of the built layout
    UnknownShard,
    /// E303: Caller passed an argument outside the contract
    InvalidArgument,

    // ========================================
    // Storage errors (6xx)
    // ========================================
    /// E601: Term statistics have not been built
    StatsUnavailable,
    /// E602: Statistics build failed
    BuildFailed,
    /// E603: Database operation failed
    DatabaseError,
    /// E604: Serialization/deserialization failed
    SerializationError,

    // ========================================
    // Lock errors (85x)
    // ========================================
    /// E851: Failed to acquire lock within timeout
    LockTimeout,
    /// E852: Failed to acquire lock
    LockFailed,

    // ========================================
    // Internal errors (9xx)
    // ========================================
    /// E901: IO operation failed
    IoError,
}

impl ErrorCode {
    /// Get the numeric error code (e.g., `UnknownShard` -> 302).
    #[must_use]
    pub const fn numeric(&self) -> u16 {
        match self {
            Self::ConfigInvalid => 101,

            Self::IndexCorrupted => 201,
            Self::SampleIndexUnavailable => 202,

            Self::UnknownMethod => 301,
            Self::UnknownShard => 302,
            Self::InvalidArgument => 303,

            Self::StatsUnavailable => 601,
            Self::BuildFailed => 602,
            Self::DatabaseError => 603,
            Self::SerializationError => 604,

            Self::LockTimeout => 851,
            Self::LockFailed => 852,

            Self::IoError => 901,
        }
    }

    /// Get the error code as a formatted string (e.g., "E302").
    #[must_use]
    pub fn code_string(&self) -> String {
        format!("E{}", self.numeric())
    }

    /// Get the default suggestion for this error code.
    #[must_use]
    pub const fn suggestion(&self) -> &'static str {
        match self {
            Self::ConfigInvalid => "Check TOML syntax in the config file and SHARDSEL_* environment values",

            Self::IndexCorrupted => "Re-import the corpus with `shardsel import` and run `shardsel rebuild`",
            Self::SampleIndexUnavailable => "Load sample documents with `shardsel import --sample <file>` or use --method taily",

            Self::UnknownMethod => "Use one of: taily, crcs-exp, crcs-lin, ranks, votes, sizes",
            Self::UnknownShard => "Run `shardsel shards` (or `shardsel shards --topics`) to list known ids",
            Self::InvalidArgument => "Budgets and limits must be finite and non-negative",

            Self::StatsUnavailable => "Run `shardsel rebuild` to build term statistics",
            Self::BuildFailed => "The previous statistics are still being served. Check the corpus index and retry",
            Self::DatabaseError => "A statistics store is unreadable. Run `shardsel rebuild` to recreate it",
            Self::SerializationError => "The data format may be corrupted. Check input data for validity",

            Self::LockTimeout => "Another rebuild may be holding the lock. Wait and retry, or check for stale locks",
            Self::LockFailed => "Failed to acquire lock. Check for other shardsel processes or stale lock files",

            Self::IoError => "File operation failed. Check path exists and permissions are correct",
        }
    }

    /// Check if this error is potentially recoverable by the user.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::ConfigInvalid
            | Self::SampleIndexUnavailable
            | Self::UnknownMethod
            | Self::UnknownShard
            | Self::InvalidArgument
            | Self::StatsUnavailable
            | Self::BuildFailed
            | Self::LockTimeout
            | Self::LockFailed
            | Self::IoError => true,

            Self::IndexCorrupted
            | Self::DatabaseError
            | Self::SerializationError => false,
        }
    }

    /// Get the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self.numeric() / 100 {
            1 => "config",
            2 => "index",
            3 => "selection",
            6 => "storage",
            8 => "lock",
            9 => "internal",
            _ => "unknown",
        }
    }

    /// Iterate over all error codes.
    pub fn all() -> impl Iterator<Item = Self> {
        [
            Self::ConfigInvalid,
            Self::IndexCorrupted,
            Self::SampleIndexUnavailable,
            Self::UnknownMethod,
            Self::UnknownShard,
            Self::InvalidArgument,
            Self::StatsUnavailable,
            Self::BuildFailed,
            Self::DatabaseError,
            Self::SerializationError,
            Self::LockTimeout,
            Self::LockFailed,
            Self::IoError,
        ]
        .into_iter()
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code_string())
    }
}
