//! Logger errors

/// Result alias for logger operations
pub type LogResult<T> = Result<T, LogError>;

/// Logger setup failure
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    /// Filter directive did not parse
    #[error("Invalid log filter: {0}")]
    Filter(String),

    /// Runtime reconfiguration failed
    #[error("Log configuration error: {0}")]
    Config(String),

    /// A global subscriber is already installed
    #[error("Failed to install logger: {0}")]
    Init(String),
}
