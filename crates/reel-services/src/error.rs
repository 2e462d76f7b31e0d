//! Service client error types.

use thiserror::Error;

/// Result type for service calls.
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Errors returned by the external generation and synthesis services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Rate limited by service")]
    RateLimited,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Generation failed: {0}")]
    OperationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServiceError {
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        Self::InvalidResponse(msg.into())
    }

    /// Transient failures worth retrying: timeouts, connection errors,
    /// 5xx responses and rate limiting.
    pub fn is_retryable(&self) -> bool {
        match self {
            ServiceError::RateLimited => true,
            ServiceError::Http { status, .. } => *status >= 500,
            ServiceError::Network(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ServiceError::RateLimited.is_retryable());
        assert!(ServiceError::Http {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!ServiceError::Http {
            status: 400,
            body: "bad prompt".into()
        }
        .is_retryable());
        assert!(!ServiceError::OperationFailed("safety filter".into()).is_retryable());
        assert!(!ServiceError::invalid_response("no video").is_retryable());
    }
}
