use thiserror::Error;

/// Library-wide error type. Agents and subsystems return this; the binary
/// edge (`main.rs`) collapses it into `anyhow::Error` at the top level.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("dependency error: {0}")]
    Dependency(String),

    #[error("integrity error: {0}")]
    Integrity(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("data error: {0}")]
    Data(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type TradingResult<T> = Result<T, TradingError>;
