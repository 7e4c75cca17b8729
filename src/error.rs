// Error handling module
// Defines the error taxonomy surfaced to callers of the pipeline and API

use thiserror::Error;

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Errors that can occur while talking to the Travel Blog backend
#[derive(Error, Debug)]
pub enum ApiError {
    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// 401 that could not be recovered with a token refresh
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// Token refresh failed and the stored credentials were evicted
    #[error("Session expired: {0}")]
    TerminalAuthError(String),

    /// Non-success response from the backend
    #[error("Backend error: {status} - {message}")]
    BackendError { status: u16, message: String },

    /// Response body could not be decoded
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Storage or request construction failure
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Build an error from a non-success status and its response body
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = truncate_body(body);
        match status.as_u16() {
            401 => ApiError::AuthError(message),
            code => ApiError::BackendError {
                status: code,
                message,
            },
        }
    }

    /// Whether the caller should send the user back through login
    pub fn requires_login(&self) -> bool {
        matches!(self, ApiError::TerminalAuthError(_))
    }

    /// HTTP status associated with this error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::AuthError(_) | ApiError::TerminalAuthError(_) => Some(401),
            ApiError::BackendError { status, .. } => Some(*status),
            ApiError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Truncate a response body to avoid logging excessive data
pub(crate) fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        return body.to_string();
    }

    let mut end = MAX_ERROR_BODY_LENGTH;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
}

/// Result type alias for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
