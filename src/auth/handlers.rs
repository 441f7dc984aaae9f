use axum::{
    extract::{FromRef, State},
    routing::post,
    Json, Router,
};
use tracing::{info, instrument, warn};

use crate::auth::dto::{
    CodeIssuedResponse, LoginRequest, LoginResponse, MessageResponse, RegisterRequest,
    ResendRequest, VerifyRequest,
};
use crate::auth::jwt::JwtKeys;
use crate::auth::service::{self, CodeIssue};
use crate::error::AppError;
use crate::state::AppState;

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/resend", post(resend))
        .route("/auth/verify", post(verify))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Issue the code out-of-band. The code is already persisted; a delivery
/// failure is logged, never propagated.
async fn deliver_code(state: &AppState, email: &str, code: &str) {
    if let Err(e) = state.mailer.deliver(email, code).await {
        warn!(error = %e, email = %email, "code delivery failed");
    }
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<CodeIssuedResponse>, AppError> {
    let email = normalize_email(&payload.email);

    if !service::is_allowed_email(&email, &state.config.allowed_email_domain) {
        return Err(AppError::Validation(format!(
            "Only {} emails allowed",
            state.config.allowed_email_domain
        )));
    }
    if payload.password.len() < 6 {
        return Err(AppError::Validation(
            "Password must be at least 6 characters".into(),
        ));
    }

    match service::start_registration(&state.db, &state.config, &email, &payload.password).await? {
        CodeIssue::Issued {
            code,
            cooldown_seconds,
        } => {
            deliver_code(&state, &email, &code).await;
            info!(email = %email, "registration started");
            Ok(Json(CodeIssuedResponse {
                message: "Verification created. Check your inbox for the code.".into(),
                cooldown_seconds,
            }))
        }
        CodeIssue::CoolingDown { retry_in_seconds } => Err(AppError::Throttled {
            message: "Please wait before requesting a new code.".into(),
            retry_in_seconds,
        }),
    }
}

#[instrument(skip(state, payload))]
pub async fn resend(
    State(state): State<AppState>,
    Json(payload): Json<ResendRequest>,
) -> Result<Json<CodeIssuedResponse>, AppError> {
    let email = normalize_email(&payload.email);

    if !service::is_allowed_email(&email, &state.config.allowed_email_domain) {
        return Err(AppError::Validation(format!(
            "Only {} emails allowed",
            state.config.allowed_email_domain
        )));
    }

    match service::resend_code(&state.db, &state.config, &email).await? {
        CodeIssue::Issued {
            code,
            cooldown_seconds,
        } => {
            deliver_code(&state, &email, &code).await;
            info!(email = %email, "verification code re-generated");
            Ok(Json(CodeIssuedResponse {
                message: "Verification re-generated. Check your inbox for the code.".into(),
                cooldown_seconds,
            }))
        }
        CodeIssue::CoolingDown { retry_in_seconds } => Err(AppError::Throttled {
            message: "Please wait before resending.".into(),
            retry_in_seconds,
        }),
    }
}

#[instrument(skip(state, payload))]
pub async fn verify(
    State(state): State<AppState>,
    Json(payload): Json<VerifyRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let email = normalize_email(&payload.email);
    let code = payload.code.trim().to_string();

    if !service::is_allowed_email(&email, &state.config.allowed_email_domain) {
        return Err(AppError::Validation("Invalid email domain".into()));
    }
    if code.is_empty() {
        return Err(AppError::Validation("Code is required".into()));
    }

    let ok = service::verify_code_and_create_user(&state.db, &email, &code).await?;
    if !ok {
        return Err(AppError::Validation("Wrong code. Try again.".into()));
    }

    info!(email = %email, "user verified and created");
    Ok(Json(MessageResponse {
        message: "Verified. You can now login.".into(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AppError> {
    let email = normalize_email(&payload.email);

    if !service::is_allowed_email(&email, &state.config.allowed_email_domain) {
        return Err(AppError::Validation("Invalid email domain".into()));
    }

    let Some(role) = service::login(&state.db, &email, &payload.password).await? else {
        warn!(email = %email, "login rejected");
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    };

    let keys = JwtKeys::from_ref(&state);
    let token = keys.sign(&email, role)?;

    info!(email = %email, role = ?role, "user logged in");
    Ok(Json(LoginResponse {
        message: "Login successful".into(),
        email,
        role,
        token,
    }))
}

/// Sessions are bearer tokens; logout is client-side discard.
#[instrument]
pub async fn logout() -> Json<MessageResponse> {
    Json(MessageResponse {
        message: "Logged out".into(),
    })
}
