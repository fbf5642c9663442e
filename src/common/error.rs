use thiserror::Error;

/// Operational failures. Per-listing data problems never surface here; they
/// are reported as [`crate::pipeline::validate::RejectionReason`] values.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid pattern in vocabulary: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Malformed listing sequence: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, DigestError>;
