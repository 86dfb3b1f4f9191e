use thiserror::Error;

pub type Result<T> = std::result::Result<T, KumapError>;

#[derive(Debug, Error)]
pub enum KumapError {
    #[error("KUMAP_API_KEY is not set")]
    MissingApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for KumapError {
    fn from(err: reqwest::Error) -> Self {
        KumapError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for KumapError {
    fn from(err: serde_json::Error) -> Self {
        KumapError::Parse(err.to_string())
    }
}
