//! Error types for edition-courier
//!
//! This module provides the error handling for the library:
//! - A crate-wide [`Error`] with contextual variants
//! - Domain-specific errors for the store ([`DatabaseError`]) and the
//!   discovery collaborator ([`DiscoveryError`])
//! - A fatal/non-fatal classification used by the run loop to decide whether
//!   an operator has to step in

use crate::types::Channel;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for edition-courier operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for edition-courier
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "tracking.key_scheme")
        key: Option<String>,
    },

    /// Database operation failed
    #[error("database error: {0}")]
    Database(#[from] DatabaseError),

    /// Discovery collaborator failed
    #[error("discovery error: {0}")]
    Discovery(#[from] DiscoveryError),

    /// Fetching the edition artifact failed
    #[error("download failed: {0}")]
    Download(String),

    /// A delivery or archival transport failed
    #[error("{channel} channel error: {message}")]
    Channel {
        /// Channel that failed
        channel: Channel,
        /// Transport-provided error detail
        message: String,
        /// Whether another attempt may succeed
        transient: bool,
    },

    /// A collaborator call exceeded its time budget
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// Name of the operation that timed out (e.g., "download")
        operation: String,
        /// Configured time budget
        after: Duration,
    },

    /// A stored or supplied document failed validation
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    /// I/O error from a collaborator implementation
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error from a collaborator implementation
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Payload (de)serialization error from a collaborator implementation
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Database-related errors
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to connect to database
    #[error("failed to connect to database: {0}")]
    ConnectionFailed(String),

    /// Failed to run migrations
    #[error("failed to run migrations: {0}")]
    MigrationFailed(String),

    /// Query failed
    #[error("query failed: {0}")]
    QueryFailed(String),

    /// Record not found
    #[error("record not found: {0}")]
    NotFound(String),
}

/// Errors raised by the edition discovery collaborator
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The source rejected our credentials; an operator has to fix the login
    #[error("authentication failed for {publication_id}: {reason}")]
    Authentication {
        /// Publication whose source rejected the login
        publication_id: String,
        /// Source-provided reason
        reason: String,
    },

    /// The source could not be reached or answered with a transient failure
    #[error("source unavailable for {publication_id}: {reason}")]
    Unavailable {
        /// Publication whose source was unavailable
        publication_id: String,
        /// Source-provided reason
        reason: String,
    },
}

impl Error {
    /// Build a configuration error pointing at a specific key
    pub fn config(message: impl Into<String>, key: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
            key: Some(key.into()),
        }
    }

    /// Whether this error needs operator action and must abort the whole run
    ///
    /// Authentication failures at the discovery source and invalid configuration
    /// cannot be fixed by retrying on the next cycle.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Config { .. } | Error::Discovery(DiscoveryError::Authentication { .. })
        )
    }

    /// Whether this error came from the durable store
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Error::Database(_))
            || matches!(self, Error::Timeout { operation, .. } if operation.starts_with("store"))
    }
}
