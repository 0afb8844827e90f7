//! Error types for the loader.
//!
//! Only `Connection`, `Input` and `Staging` errors end a run. Statement and
//! verification failures are recorded as values in the load report instead.

use thiserror::Error;

/// Main error type for loader operations.
#[derive(Error, Debug)]
pub enum LoaderError {
    /// The database session could not be established (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// A statement or verification query failed on the server.
    #[error("Query error: {0}")]
    Query(String),

    /// Configuration errors (invalid config file, bad identifiers, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required input file is missing or unreadable.
    #[error("Input error: {0}")]
    Input(String),

    /// The data file could not be copied into the data directory.
    #[error("Staging error: {0}")]
    Staging(String),

    /// Internal errors (unexpected protocol responses, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl LoaderError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates a query error with the given message.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates an input error with the given message.
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }

    /// Creates a staging error with the given message.
    pub fn staging(msg: impl Into<String>) -> Self {
        Self::Staging(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::Query(_) => "Query Error",
            Self::Config(_) => "Configuration Error",
            Self::Input(_) => "Input Error",
            Self::Staging(_) => "Staging Error",
            Self::Internal(_) => "Internal Error",
        }
    }
}

/// Result type alias using LoaderError.
pub type Result<T> = std::result::Result<T, LoaderError>;
