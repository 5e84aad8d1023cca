//! Client error types

use locallab_core::{CoreError, InferenceError};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OllamaError {
    /// Could not reach the server at all
    #[error("Connection to Ollama failed: {0}")]
    Connection(String),

    #[error("Request to Ollama timed out after {0} seconds")]
    Timeout(u64),

    /// Ollama answered with a 4xx, e.g. an unknown model
    #[error("Ollama rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Ollama server error ({status}): {message}")]
    Server { status: u16, message: String },

    #[error("Invalid response from Ollama: {0}")]
    InvalidResponse(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type OllamaResult<T> = Result<T, OllamaError>;

/// Error body returned by Ollama on failure
#[derive(Debug, serde::Deserialize)]
pub struct OllamaErrorBody {
    pub error: String,
}

impl OllamaError {
    /// Build an error from a non-success HTTP response.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<OllamaErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().to_string());

        if (400..500).contains(&status) {
            OllamaError::Rejected { status, message }
        } else {
            OllamaError::Server { status, message }
        }
    }

    /// Only connection failures are worth retrying; a timed out generation
    /// may still be running on the server.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OllamaError::Connection(_))
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            OllamaError::Rejected { status, .. } | OllamaError::Server { status, .. } => {
                Some(*status)
            }
            _ => None,
        }
    }
}

impl From<OllamaError> for InferenceError {
    fn from(err: OllamaError) -> Self {
        match err {
            OllamaError::Rejected { message, .. } => InferenceError::BadRequest(message),
            OllamaError::InvalidResponse(message) => InferenceError::InvalidResponse(message),
            other => InferenceError::ServiceUnavailable(other.to_string()),
        }
    }
}

impl From<OllamaError> for CoreError {
    fn from(err: OllamaError) -> Self {
        CoreError::Inference(err.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_from_json_response() {
        let body = r#"{"error": "model 'nope' not found, try pulling it first"}"#;
        let error = OllamaError::from_response(404, body);

        match error {
            OllamaError::Rejected { status, ref message } => {
                assert_eq!(status, 404);
                assert!(message.contains("not found"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_error_from_plain_body() {
        let error = OllamaError::from_response(502, "bad gateway\n");
        assert!(matches!(error, OllamaError::Server { status: 502, ref message } if message == "bad gateway"));
    }

    #[test]
    fn test_error_is_retryable() {
        assert!(OllamaError::Connection("refused".to_string()).is_retryable());
        assert!(!OllamaError::Timeout(300).is_retryable());
        assert!(!OllamaError::from_response(500, "{}").is_retryable());
    }

    #[test]
    fn test_inference_error_mapping() {
        let rejected: InferenceError = OllamaError::from_response(400, r#"{"error":"bad"}"#).into();
        assert_eq!(rejected, InferenceError::BadRequest("bad".to_string()));

        let server: InferenceError = OllamaError::from_response(503, "down").into();
        assert!(matches!(server, InferenceError::ServiceUnavailable(_)));

        let timeout: InferenceError = OllamaError::Timeout(5).into();
        assert!(matches!(timeout, InferenceError::ServiceUnavailable(_)));

        let invalid: InferenceError = OllamaError::InvalidResponse("eof".to_string()).into();
        assert!(matches!(invalid, InferenceError::InvalidResponse(_)));
    }
}
