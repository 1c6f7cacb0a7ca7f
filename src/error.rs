use thiserror::Error;

/// Main error type for the orchestrator
#[derive(Error, Debug)]
pub enum VigilError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {}", .0.join("; "))]
    InvalidConfig(Vec<String>),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Registry errors
    #[error("Dependency not found: {0}")]
    DependencyNotFound(String),

    #[error("Dependency already registered: {0}")]
    DependencyExists(String),

    // Remediation errors
    #[error("Remediation already in progress for {0}")]
    RemediationInProgress(String),

    #[error("Invalid remediation action: {0}")]
    InvalidAction(String),

    #[error("Executor error: {0}")]
    Executor(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for VigilError
pub type Result<T> = std::result::Result<T, VigilError>;
