//! Demo inbox: a diagnostic channel that exposes pending verification codes
//! instead of delivering mail. Compiled only with the `demo-inbox` feature;
//! production builds carry neither these routes nor the plaintext mirror.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::auth::Role;
use crate::auth::repo::{PendingVerification, User};
use crate::auth::service::is_allowed_email;
use crate::error::{is_unique_violation, AppError};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/demo/last-code", get(last_code))
        .route("/demo/verification-status", get(verification_status))
        .route("/demo/verify", post(demo_verify))
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DemoVerifyRequest {
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Serialize)]
pub struct LastCodeResponse {
    pub email: String,
    pub code: Option<String>,
    pub created_at: OffsetDateTime,
    pub last_sent_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct VerificationStatusResponse {
    pub email: String,
    pub created_at: OffsetDateTime,
    pub last_sent_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

fn required_email(q: EmailQuery) -> Result<String, AppError> {
    let email = q.email.unwrap_or_default().trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    Ok(email)
}

#[instrument(skip(state))]
pub async fn last_code(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<LastCodeResponse>, AppError> {
    let email = required_email(query)?;

    let Some(pending) = PendingVerification::find_by_email(&state.db, &email).await? else {
        return Err(AppError::NotFound(
            "No pending verification for this email".into(),
        ));
    };

    Ok(Json(LastCodeResponse {
        email,
        code: pending.code_plain,
        created_at: pending.created_at,
        last_sent_at: pending.last_sent_at,
    }))
}

#[instrument(skip(state))]
pub async fn verification_status(
    State(state): State<AppState>,
    Query(query): Query<EmailQuery>,
) -> Result<Json<VerificationStatusResponse>, AppError> {
    let email = required_email(query)?;

    let Some(pending) = PendingVerification::find_by_email(&state.db, &email).await? else {
        return Err(AppError::NotFound(
            "No pending verification for this email".into(),
        ));
    };

    Ok(Json(VerificationStatusResponse {
        email,
        created_at: pending.created_at,
        last_sent_at: pending.last_sent_at,
    }))
}

/// Complete a pending registration without the code. Never part of the
/// authoritative verification path, and seed-admin addresses are refused.
#[instrument(skip(state, payload))]
pub async fn demo_verify(
    State(state): State<AppState>,
    Json(payload): Json<DemoVerifyRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = payload.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(AppError::Validation("email is required".into()));
    }
    if !is_allowed_email(&email, &state.config.allowed_email_domain) {
        return Err(AppError::Validation(format!(
            "Only {} emails allowed",
            state.config.allowed_email_domain
        )));
    }
    if email == state.config.seed_admin_email {
        return Err(AppError::Forbidden(
            "Admin accounts cannot be verified via demo flow.".into(),
        ));
    }

    let Some(pending) = PendingVerification::find_by_email(&state.db, &email).await? else {
        return Err(AppError::NotFound(
            "No pending verification for this email".into(),
        ));
    };

    // If the user already exists, just consume the pending row. The
    // existence check runs on the transaction's connection so it cannot
    // disagree with the insert below.
    let mut tx = state.db.begin().await?;
    let existing: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE email = $1")
        .bind(&email)
        .fetch_optional(&mut *tx)
        .await?;
    if existing.is_some() {
        PendingVerification::delete(&mut tx, &email)
            .await
            .map_err(AppError::from)?;
        tx.commit().await?;
        return Ok(Json(MessageResponse {
            message: "Already verified".into(),
        }));
    }

    match User::create(&mut tx, &email, &pending.password_hash, Role::Student.as_str()).await {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Ok(Json(MessageResponse {
                message: "Already verified".into(),
            }))
        }
        Err(e) => return Err(e.into()),
    }
    PendingVerification::delete(&mut tx, &email)
        .await
        .map_err(AppError::from)?;
    tx.commit().await?;

    info!(email = %email, "user created via demo verification");
    Ok(Json(MessageResponse {
        message: "Verified (demo). Student user created.".into(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::PgPool;

    const STUDENT: &str = "alice@uni-bayreuth.de";

    async fn insert_pending(pool: &PgPool) {
        let now = OffsetDateTime::now_utc();
        PendingVerification::upsert(pool, STUDENT, "digest", Some("123456"), "hash", now)
            .await
            .unwrap();
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn demo_verify_creates_the_student(pool: PgPool) {
        insert_pending(&pool).await;
        let state = AppState::fake_with_db(pool.clone());

        let res = demo_verify(
            State(state),
            Json(DemoVerifyRequest {
                email: STUDENT.into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(res.0.message, "Verified (demo). Student user created.");
        assert!(User::find_by_email(&pool, STUDENT).await.unwrap().is_some());
        assert!(PendingVerification::find_by_email(&pool, STUDENT)
            .await
            .unwrap()
            .is_none());
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn demo_verify_consumes_pending_for_existing_user(pool: PgPool) {
        sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ($1, 'x', 'student')")
            .bind(STUDENT)
            .execute(&pool)
            .await
            .unwrap();
        insert_pending(&pool).await;
        let state = AppState::fake_with_db(pool.clone());

        let res = demo_verify(
            State(state),
            Json(DemoVerifyRequest {
                email: STUDENT.into(),
            }),
        )
        .await
        .unwrap();

        assert_eq!(res.0.message, "Already verified");
        assert!(PendingVerification::find_by_email(&pool, STUDENT)
            .await
            .unwrap()
            .is_none());
    }
}
