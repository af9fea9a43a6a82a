//! Error types for the tally_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for tally_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A durable read or write underneath the ledger failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Habit failed validation (e.g. empty name)
    #[error("Invalid habit: {0}")]
    InvalidHabit(String),
}

impl Error {
    /// Wrap any displayable failure from the durable store
    pub fn persistence(context: &str, err: impl std::fmt::Display) -> Self {
        Error::Persistence(format!("{}: {}", context, err))
    }
}
