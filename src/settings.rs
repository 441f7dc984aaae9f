use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::{info, instrument};

use crate::auth::extractors::SessionUser;
use crate::auth::guard;
use crate::error::AppError;
use crate::state::AppState;

pub const ROOMS_OPEN_KEY: &str = "rooms_open";

pub async fn get_setting(db: &PgPool, key: &str, default: &str) -> anyhow::Result<String> {
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM admin_settings WHERE key = $1")
        .bind(key)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(v,)| v).unwrap_or_else(|| default.to_string()))
}

pub async fn set_setting(db: &PgPool, key: &str, value: &str) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO admin_settings (key, value)
        VALUES ($1, $2)
        ON CONFLICT (key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(db)
    .await?;
    Ok(())
}

/// Whether room join/leave is currently permitted. Read fresh from the
/// store on every check; never cached in process memory.
pub async fn rooms_open(db: &PgPool) -> Result<bool, AppError> {
    Ok(get_setting(db, ROOMS_OPEN_KEY, "1").await? == "1")
}

#[derive(Debug, Serialize)]
pub struct OpenResponse {
    pub open: bool,
}

#[derive(Debug, Serialize)]
pub struct UpdatedResponse {
    pub message: String,
    pub open: bool,
}

/// The original accepts either a JSON boolean or the strings "0"/"1".
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum OpenFlag {
    Bool(bool),
    Text(String),
}

#[derive(Debug, Deserialize)]
pub struct SetRoomsOpenRequest {
    pub open: Option<OpenFlag>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings/rooms_open", get(public_rooms_open))
        .route(
            "/admin/settings/rooms_open",
            get(admin_get_rooms_open).post(admin_set_rooms_open),
        )
}

#[instrument(skip(state))]
pub async fn public_rooms_open(
    State(state): State<AppState>,
) -> Result<Json<OpenResponse>, AppError> {
    let open = rooms_open(&state.db).await?;
    Ok(Json(OpenResponse { open }))
}

#[instrument(skip(state, session))]
pub async fn admin_get_rooms_open(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<OpenResponse>, AppError> {
    guard::require_admin(&state.db, &session).await?;
    let open = rooms_open(&state.db).await?;
    Ok(Json(OpenResponse { open }))
}

#[instrument(skip(state, session, payload))]
pub async fn admin_set_rooms_open(
    State(state): State<AppState>,
    session: SessionUser,
    Json(payload): Json<SetRoomsOpenRequest>,
) -> Result<Json<UpdatedResponse>, AppError> {
    guard::require_admin(&state.db, &session).await?;

    let value = match payload.open {
        Some(OpenFlag::Bool(b)) => {
            if b {
                "1"
            } else {
                "0"
            }
        }
        Some(OpenFlag::Text(ref s)) if s == "0" || s == "1" => s.as_str(),
        _ => {
            return Err(AppError::Validation(
                "open must be boolean (true/false) or '0'/'1'".into(),
            ))
        }
    };

    set_setting(&state.db, ROOMS_OPEN_KEY, value).await?;
    info!(admin = %session.email, open = %value, "rooms_open updated");
    Ok(Json(UpdatedResponse {
        message: "Updated".into(),
        open: value == "1",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_flag_accepts_bool_and_strings() {
        let req: SetRoomsOpenRequest = serde_json::from_str(r#"{"open": true}"#).unwrap();
        assert!(matches!(req.open, Some(OpenFlag::Bool(true))));

        let req: SetRoomsOpenRequest = serde_json::from_str(r#"{"open": "0"}"#).unwrap();
        assert!(matches!(req.open, Some(OpenFlag::Text(ref s)) if s == "0"));

        let req: SetRoomsOpenRequest = serde_json::from_str(r#"{}"#).unwrap();
        assert!(req.open.is_none());
    }
}
