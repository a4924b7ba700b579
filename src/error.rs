//! Error types for chim.

/// Result type alias for chim operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for chim.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("Model '{model}' is not supported by this provider")]
    UnsupportedModel { model: String },

    #[error(transparent)]
    Upstream(#[from] reqwest::Error),

    #[error("Provider returned {status}: {body}")]
    Provider {
        status: reqwest::StatusCode,
        body: String,
    },
}
