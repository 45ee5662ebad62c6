//! Custom error types for the application.
//!
//! This module defines the primary error type, `TelemetryError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different kinds of errors that can occur, from
//! configuration and I/O issues to storage-backend problems.
//!
//! ## Error Hierarchy
//!
//! `TelemetryError` consolidates the error sources of the server:
//!
//! - **`Config`**: Wraps errors from `figment`, typically file-parsing or
//!   format issues in the configuration sources.
//! - **`Configuration`**: Semantic errors in the configuration, values that
//!   parse but are logically invalid (port 0, empty data directory). These are
//!   caught by the post-load validation step.
//! - **`Io`**: Wraps `std::io::Error`, covering socket and file I/O.
//! - **`Storage`**: Errors from the durable sink (CSV append failures). These
//!   never roll back in-memory state; callers log them and carry on.
//! - **`Protocol`**: Wire-level problems that are fatal to one connection.
//! - **`FeatureNotEnabled`**: Raised when a storage backend was compiled out
//!   via feature flags, with a message telling the user how to enable it.
//!
//! By using `#[from]`, `TelemetryError` can be seamlessly created from the
//! underlying error types with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, TelemetryError>;

/// The application-wide error type.
#[derive(Error, Debug)]
pub enum TelemetryError {
    /// Configuration could not be loaded or parsed.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but failed semantic validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Socket or file I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Durable sink failure. The in-memory store is not rolled back.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Wire-protocol failure, fatal to the affected connection only.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A compiled-out feature was requested at runtime.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}
