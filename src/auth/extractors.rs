use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use crate::auth::dto::Role;
use crate::auth::jwt::JwtKeys;
use crate::error::AppError;
use crate::state::AppState;

/// The caller's claimed identity, parsed from the Bearer token. This is
/// untrusted input: `guard::require_student` / `guard::require_admin`
/// cross-validate it against the users table.
pub struct SessionUser {
    pub email: String,
    pub role: Role,
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Not logged in.".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Not logged in.".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|_| {
            warn!("invalid or expired session token");
            AppError::Unauthorized("Not logged in.".into())
        })?;

        Ok(SessionUser {
            email: claims.sub.trim().to_lowercase(),
            role: claims.role,
        })
    }
}
