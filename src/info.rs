use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use sqlx::FromRow;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Serialize, FromRow)]
pub struct InfoPage {
    pub id: i64,
    pub slug: String,
    pub title: String,
    pub content: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct InfoPageSummary {
    pub slug: String,
    pub title: String,
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/info", get(list_pages))
        .route("/info/:slug", get(get_page))
}

#[instrument(skip(state))]
pub async fn list_pages(
    State(state): State<AppState>,
) -> Result<Json<Vec<InfoPageSummary>>, AppError> {
    let rows = sqlx::query_as::<_, InfoPageSummary>(
        "SELECT slug, title, content FROM info_pages ORDER BY slug",
    )
    .fetch_all(&state.db)
    .await?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_page(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<InfoPage>, AppError> {
    let row = sqlx::query_as::<_, InfoPage>(
        "SELECT id, slug, title, content FROM info_pages WHERE slug = $1",
    )
    .bind(&slug)
    .fetch_optional(&state.db)
    .await?;
    row.map(Json)
        .ok_or_else(|| AppError::NotFound("Page not found".into()))
}
