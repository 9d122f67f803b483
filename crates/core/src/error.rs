//! Error types for the digichar reconciliation layer.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the reconciliation layer.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data error (invalid or inconsistent data).
    #[error("Data error: {0}")]
    Data(String),

    /// The ledger could not be reached or answered with a transport failure.
    #[error("Ledger error: {0}")]
    Ledger(String),

    /// A bid, withdraw or claim submission failed.
    #[error("Write error: {0}")]
    Write(String),

    /// Event log retrieval error.
    #[error("Event error: {0}")]
    Event(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message.
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Create a ledger transport error.
    pub fn ledger(msg: impl Into<String>) -> Self {
        Error::Ledger(msg.into())
    }

    /// Create a write failure.
    pub fn write(msg: impl Into<String>) -> Self {
        Error::Write(msg.into())
    }

    /// Create an event log error.
    pub fn event(msg: impl Into<String>) -> Self {
        Error::Event(msg.into())
    }
}
