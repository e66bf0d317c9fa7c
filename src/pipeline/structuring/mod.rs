pub mod ollama;
pub mod parser;
pub mod prompt;
pub mod sanitize;
pub mod types;

pub use ollama::*;
pub use parser::*;
pub use prompt::*;
pub use sanitize::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StructuringError {
    #[error("Ollama is not running at {0}")]
    OllamaConnection(String),

    #[error("Ollama returned error (status {status}): {body}")]
    OllamaError { status: u16, body: String },

    #[error("No compatible model available")]
    NoModelAvailable,

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonParsing(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),
}

impl StructuringError {
    /// Transport-level failure worth another call.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::OllamaConnection(_) | Self::HttpClient(_) | Self::OllamaError { .. }
        )
    }

    /// The call succeeded but the output was unusable; a fresh call may fix it.
    pub fn is_parse_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedResponse(_) | Self::JsonParsing(_) | Self::ResponseParsing(_)
        )
    }
}
