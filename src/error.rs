//! Error taxonomy for the viewer
//!
//! Every fallible operation in the library returns [`ViewerError`]. The
//! binary wraps these in `anyhow` at the top level.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ViewerError {
    /// Non-success HTTP status or transport failure
    #[error("network failure: {0}")]
    Network(String),

    /// Input rejected before it was sent or applied
    #[error("validation failure: {0}")]
    Validation(String),

    /// An expected dataset field is missing or empty
    #[error("missing data: {0}")]
    DataAbsence(String),

    /// Response body did not match the expected shape
    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for ViewerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ViewerError::Decode(err.to_string())
        } else {
            ViewerError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ViewerError {
    fn from(err: serde_json::Error) -> Self {
        ViewerError::Decode(err.to_string())
    }
}

impl From<serde_yaml::Error> for ViewerError {
    fn from(err: serde_yaml::Error) -> Self {
        ViewerError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ViewerError>;
