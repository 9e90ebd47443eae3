use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chatfs_core::DriveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error(transparent)]
    Drive(#[from] DriveError),

    #[error("Invalid or missing link signature")]
    InvalidSignature,

    #[error("Invalid request: {0}")]
    BadRequest(String),
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            HttpError::Drive(DriveError::MalformedKey(_)) => (StatusCode::BAD_REQUEST, self.to_string()),
            HttpError::Drive(DriveError::PeerNotFound { .. } | DriveError::ObjectNotFound) => {
                (StatusCode::NOT_FOUND, self.to_string())
            }
            HttpError::Drive(DriveError::NotImplemented) => (StatusCode::NOT_IMPLEMENTED, self.to_string()),
            HttpError::Drive(e @ DriveError::ShortRead { .. }) => {
                tracing::warn!(error = %e, "Upstream failure");
                (StatusCode::BAD_GATEWAY, "Upstream error".to_string())
            }
            HttpError::Drive(DriveError::Upstream(e)) => {
                tracing::warn!(error = %e, "Upstream failure");
                (StatusCode::BAD_GATEWAY, "Upstream error".to_string())
            }
            HttpError::Drive(e) => {
                tracing::error!(error = %e, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            HttpError::InvalidSignature => (StatusCode::FORBIDDEN, self.to_string()),
            HttpError::BadRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatfs_core::UpstreamError;

    fn status(e: impl Into<HttpError>) -> StatusCode {
        e.into().into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(status(DriveError::MalformedKey("x".into())), StatusCode::BAD_REQUEST);
        assert_eq!(status(DriveError::ObjectNotFound), StatusCode::NOT_FOUND);
        assert_eq!(
            status(DriveError::PeerNotFound {
                id: 1,
                last_error: UpstreamError::Network("down".into()),
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status(DriveError::NotImplemented), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(status(DriveError::from(UpstreamError::Unauthorized)), StatusCode::BAD_GATEWAY);
        assert_eq!(
            status(DriveError::ShortRead { expected: 10, received: 2 }),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(status(DriveError::Cancelled), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status(HttpError::InvalidSignature), StatusCode::FORBIDDEN);
    }
}
