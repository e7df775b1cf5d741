//! Structured error types for datastet-view.
//!
//! Layout itself never fails: ordering problems are reported as diagnostics.
//! Errors come from the edges: parsing the service's JSON, talking to the
//! service, reading local files.

use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, DatastetError>;

/// The unified error type returned by all public datastet-view functions.
#[derive(Debug, Error)]
pub enum DatastetError {
    /// JSON input failed to parse as an annotation response or concept.
    #[error("Failed to parse response: {source}")]
    ParseError {
        #[source]
        source: serde_json::Error,
        hint: String,
    },

    /// The service answered, but with nothing to display.
    #[error("Error encountered while receiving the server's answer: response is empty.")]
    EmptyResponse,

    /// The service answered with a non-success status.
    #[error("Response {status}: {body}")]
    Status { status: u16, body: String },

    /// The request never completed.
    #[cfg(feature = "client")]
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A configured or derived URL is not valid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// A local input could not be read or output written.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A response arrived for a request that has since been superseded.
    #[error("Discarded response from superseded request (generation {generation})")]
    Stale { generation: u64 },

    /// Input the client cannot send (wrong file type, missing text, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl DatastetError {
    /// A short hint for parse errors, empty for every other kind.
    pub fn hint(&self) -> &str {
        match self {
            DatastetError::ParseError { hint, .. } => hint,
            _ => "",
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        DatastetError::InvalidInput(msg.into())
    }
}

impl From<serde_json::Error> for DatastetError {
    fn from(e: serde_json::Error) -> Self {
        let hint = match e.classify() {
            serde_json::error::Category::Syntax => {
                "The service answer is not JSON. Was an XML endpoint selected?".to_string()
            }
            serde_json::error::Category::Data => {
                "The JSON is valid but doesn't match the annotation schema. Check field names and types.".to_string()
            }
            serde_json::error::Category::Eof => {
                "Unexpected end of input. Is the response truncated?".to_string()
            }
            serde_json::error::Category::Io => String::new(),
        };
        DatastetError::ParseError { source: e, hint }
    }
}
