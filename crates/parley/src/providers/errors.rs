use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/// Failures surfaced by a provider adapter. Transport errors never leave the
/// adapter in any other shape.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out after {}", describe_timeout(.0))]
    Timeout(Duration),

    #[error("Authentication failed ({status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Server error: {status}")]
    Server { status: u16 },

    #[error("Request failed: {status} - {body}")]
    Request { status: u16, body: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Context length exceeded. Message: {0}")]
    ContextLengthExceeded(String),

    #[error("Provider API error: {0}")]
    Api(String),

    #[error("No API key configured; set {0}")]
    MissingApiKey(String),

    #[error("Invalid provider configuration: {0}")]
    InvalidConfig(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;

/// Whole seconds read as "N seconds", anything finer as milliseconds
pub fn describe_timeout(timeout: &Duration) -> String {
    if timeout.subsec_nanos() == 0 {
        format!("{} seconds", timeout.as_secs())
    } else {
        format!("{} ms", timeout.as_millis())
    }
}

impl ProviderError {
    /// Classify a non-success HTTP status and its body
    pub fn from_status(status: StatusCode, body: String) -> Self {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ProviderError::Auth {
                status: status.as_u16(),
                message: body,
            },
            status if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() => {
                ProviderError::Server {
                    status: status.as_u16(),
                }
            }
            _ => ProviderError::Request {
                status: status.as_u16(),
                body,
            },
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not report the configured duration
            ProviderError::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            ProviderError::MalformedResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::MalformedResponse(err.to_string())
    }
}
