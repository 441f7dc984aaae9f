use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Application-level error taxonomy. Every handler returns
/// `Result<_, AppError>`; the `IntoResponse` impl maps each variant to a
/// status code and a `{"error": ...}` body.
#[derive(Debug, Error)]
pub enum AppError {
    /// Malformed input, rejected before touching the store.
    #[error("{0}")]
    Validation(String),
    /// Missing or failed identity/role check.
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// User-correctable conflict: already booked, already registered, full.
    #[error("{0}")]
    Conflict(String),
    /// Cooldown not yet elapsed; carries the remaining seconds.
    #[error("{message}")]
    Throttled { message: String, retry_in_seconds: i64 },
    /// Unexpected store or crypto failure; never swallowed.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, json!({ "error": msg })),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, json!({ "error": msg })),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, json!({ "error": msg })),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, json!({ "error": msg })),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, json!({ "error": msg })),
            AppError::Throttled {
                message,
                retry_in_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                json!({ "error": message, "retry_in_seconds": retry_in_seconds }),
            ),
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    json!({ "error": "Internal server error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

/// Race-safety backstop: an insert rejected by a unique constraint is a
/// conflict outcome, not an internal fault.
pub fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_map_to_expected_status() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (
                AppError::Validation("bad".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::Unauthorized("no".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (AppError::Forbidden("no".into()), StatusCode::FORBIDDEN),
            (AppError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (AppError::Conflict("taken".into()), StatusCode::CONFLICT),
            (
                AppError::Throttled {
                    message: "wait".into(),
                    retry_in_seconds: 42,
                },
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::Internal(anyhow::anyhow!("boom")),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn row_not_found_is_not_unique_violation() {
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }
}
