//! API error types and status classification.

use axum::http::header::{CONTENT_RANGE, CONTENT_TYPE, WWW_AUTHENTICATE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use spool_player::{BlobError, ErrorKind, PlayerError};

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Player(#[from] PlayerError),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("requested range not satisfiable")]
    RangeNotSatisfiable { size: u64 },

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<BlobError> for ApiError {
    fn from(err: BlobError) -> Self {
        Self::Player(PlayerError::Blob(err))
    }
}

/// Classify error text that reached us without its type, e.g. wrapped in a
/// transport or resolver message.
pub fn classify_message(message: &str) -> Option<ErrorKind> {
    let message = message.to_ascii_lowercase();
    if message.contains("blob not found") {
        Some(ErrorKind::BlobUnavailable)
    } else if message.contains("hash mismatch") || message.contains("hash in response") {
        Some(ErrorKind::IntegrityMismatch)
    } else if message.contains("token is expired") {
        Some(ErrorKind::Expired)
    } else if message.contains("invalid number of segments") || message.contains("signature") {
        Some(ErrorKind::Unauthorized)
    } else {
        None
    }
}

impl ApiError {
    /// Coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Player(err) => match err.kind() {
                ErrorKind::Internal => classify_message(&err.to_string()).unwrap_or(ErrorKind::Internal),
                kind => kind,
            },
            Self::BadRequest(_) => ErrorKind::Internal,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::RangeNotSatisfiable { .. } => ErrorKind::RangeNotSatisfiable,
            Self::Internal(message) => classify_message(message).unwrap_or(ErrorKind::Internal),
        }
    }

    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            _ => self.kind().as_str(),
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        if let Self::BadRequest(_) = self {
            return StatusCode::BAD_REQUEST;
        }
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::PaymentRequired => StatusCode::PAYMENT_REQUIRED,
            ErrorKind::BlobUnavailable | ErrorKind::IntegrityMismatch => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Expired => StatusCode::GONE,
            ErrorKind::RangeNotSatisfiable => StatusCode::RANGE_NOT_SATISFIABLE,
            ErrorKind::DecryptFailure | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut response = (
            status,
            [(CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response();

        let headers = response.headers_mut();
        match &self {
            Self::RangeNotSatisfiable { size } => {
                if let Ok(value) = HeaderValue::from_str(&format!("bytes */{size}")) {
                    headers.insert(CONTENT_RANGE, value);
                }
            }
            Self::Unauthorized(_) => {
                headers.insert(
                    WWW_AUTHENTICATE,
                    HeaderValue::from_static("Basic realm=\"spool\""),
                );
            }
            _ => {}
        }
        response
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use spool_signer::SignerError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (PlayerError::StreamNotFound.into(), StatusCode::NOT_FOUND),
            (PlayerError::PaymentRequired.into(), StatusCode::PAYMENT_REQUIRED),
            (
                PlayerError::from(SignerError::Expired).into(),
                StatusCode::GONE,
            ),
            (
                PlayerError::from(SignerError::InvalidSegments).into(),
                StatusCode::UNAUTHORIZED,
            ),
            (
                BlobError::NotFound("ab".to_string()).into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                BlobError::IntegrityMismatch {
                    hash: "ab".to_string(),
                    detail: "x".to_string(),
                }
                .into(),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                BlobError::DecryptFailure {
                    hash: "ab".to_string(),
                    reason: "tag".to_string(),
                }
                .into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                PlayerError::PaidUnavailable.into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                ApiError::RangeNotSatisfiable { size: 10 },
                StatusCode::RANGE_NOT_SATISFIABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status, "{err}");
        }
    }

    #[test]
    fn test_wrapped_messages_are_classified() {
        let err: ApiError =
            PlayerError::Resolver("upstream said: blob not found: abcd".to_string()).into();
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = ApiError::Internal("token is expired".to_string());
        assert_eq!(err.status_code(), StatusCode::GONE);

        let err = ApiError::Internal("crypto: signature verification error".to_string());
        assert_eq!(err.status_code(), StatusCode::UNAUTHORIZED);

        let err = ApiError::Internal("disk on fire".to_string());
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "internal");
    }

    #[test]
    fn test_range_error_carries_content_range() {
        let response = ApiError::RangeNotSatisfiable { size: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(response.headers()[CONTENT_RANGE], "bytes */42");
    }
}
