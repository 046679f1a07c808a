use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// Errors raised by the interceptor itself. None of these ever reach the
/// client: the wrap points log them and hand the response through untouched.
#[derive(Error, Debug)]
pub enum InterceptorError {
    #[error("Unhandled http adapter type {0}")]
    UnsupportedFramework(String),

    #[error("Invalid StatsD address {0}")]
    InvalidAddress(String),

    #[error("StatsD socket error: {0}")]
    Socket(#[from] std::io::Error),
}

impl InterceptorError {
    /// Short label used for the `kind` dimension of the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            InterceptorError::UnsupportedFramework(_) => "unsupported_framework",
            InterceptorError::InvalidAddress(_) => "invalid_address",
            InterceptorError::Socket(_) => "socket",
        }
    }
}

/// Errors returned by the demo handlers.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("User {0} not found")]
    NotFound(u64),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "message": "error",
            "status": status.as_u16(),
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unsupported_framework_message() {
        let err = InterceptorError::UnsupportedFramework("koa".to_string());
        assert_eq!(err.to_string(), "Unhandled http adapter type koa");
        assert_eq!(err.kind(), "unsupported_framework");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound(7).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::BadRequest("name".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Internal(anyhow::anyhow!("boom"))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
