use sqlx::PgPool;

use crate::auth::dto::Role;
use crate::auth::extractors::SessionUser;
use crate::auth::repo::User;
use crate::auth::service::is_allowed_email;
use crate::error::AppError;

/// Authorize a student action. The claimed role from the session token and
/// the stored role must both be `student`; a forged or stale claim never
/// outranks the users table.
pub async fn require_student(
    db: &PgPool,
    allowed_domain: &str,
    session: &SessionUser,
) -> Result<(), AppError> {
    if session.email.is_empty() {
        return Err(AppError::Unauthorized("Not logged in.".into()));
    }
    if !is_allowed_email(&session.email, allowed_domain) {
        return Err(AppError::Unauthorized(format!(
            "Only {} emails are allowed.",
            allowed_domain
        )));
    }
    let Some(user) = User::find_by_email(db, &session.email).await? else {
        return Err(AppError::Unauthorized("User not found.".into()));
    };
    if session.role != Role::Student || user.role != Role::Student.as_str() {
        return Err(AppError::Unauthorized(
            "Only students can perform this action.".into(),
        ));
    }
    Ok(())
}

/// Authorize an admin action; same double-check as [`require_student`].
pub async fn require_admin(db: &PgPool, session: &SessionUser) -> Result<(), AppError> {
    if session.email.is_empty() {
        return Err(AppError::Unauthorized("Not logged in.".into()));
    }
    let Some(user) = User::find_by_email(db, &session.email).await? else {
        return Err(AppError::Unauthorized("User not found.".into()));
    };
    if session.role != Role::Admin || user.role != Role::Admin.as_str() {
        return Err(AppError::Unauthorized("Admin only.".into()));
    }
    Ok(())
}
