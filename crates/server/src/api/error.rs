//! HTTP error mapping. Every failure leaves as `{"error": ..., "code": ...}`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use pressroom_core::ReleaseError;
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("missing or invalid credentials")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Error body returned by every endpoint
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
}

impl ApiError {
    pub fn bad_request(e: impl std::fmt::Display) -> Self {
        Self::BadRequest(e.to_string())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::BadRequest(_) => (StatusCode::BAD_REQUEST, "bad_request"),
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            Self::Release(e) => match e {
                ReleaseError::InvalidTransition { .. } => (StatusCode::CONFLICT, "invalid_transition"),
                ReleaseError::Forbidden { .. } => (StatusCode::FORBIDDEN, "forbidden"),
                ReleaseError::VersionConflict { .. } => (StatusCode::CONFLICT, "version_conflict"),
                ReleaseError::InsufficientCredits { .. } => {
                    (StatusCode::PAYMENT_REQUIRED, "insufficient_credits")
                }
                ReleaseError::NotFound { .. } => (StatusCode::NOT_FOUND, "not_found"),
                ReleaseError::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                ReleaseError::Llm(_) => (StatusCode::BAD_GATEWAY, "llm_failed"),
                ReleaseError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let error = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = ?self, "Request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };
        (status, Json(ErrorBody { error, code })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pressroom_core::pipeline::{ReleaseAction, ReleaseStatus};

    #[test]
    fn test_release_errors_map_to_status_codes() {
        let cases = [
            (
                ReleaseError::InvalidTransition {
                    from: ReleaseStatus::Published,
                    action: ReleaseAction::Cancel,
                },
                StatusCode::CONFLICT,
            ),
            (
                ReleaseError::InsufficientCredits {
                    customer_id: "c1".into(),
                },
                StatusCode::PAYMENT_REQUIRED,
            ),
            (ReleaseError::not_found("release", "r1"), StatusCode::NOT_FOUND),
            (ReleaseError::Validation("bad".into()), StatusCode::UNPROCESSABLE_ENTITY),
        ];
        for (err, expected) in cases {
            assert_eq!(ApiError::from(err).into_response().status(), expected);
        }
    }

    #[test]
    fn test_internal_errors_are_not_leaked() {
        let (status, _) = ApiError::from(anyhow::anyhow!("disk on fire")).status_and_code();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    }
}
