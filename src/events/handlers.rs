use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::auth::extractors::SessionUser;
use crate::auth::guard;
use crate::error::AppError;
use crate::events::dto::{EventDto, EventPage, PageQuery};
use crate::events::repo;
use crate::state::AppState;

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events))
        .route("/events/:event_id/register", post(register_event))
        .route("/events/:event_id/leave", post(leave_event))
        .route("/me/events", get(my_events))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/events", get(admin_events))
        .route("/admin/events/:event_id/students", get(admin_event_students))
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct EventStudent {
    pub email: String,
    pub registered_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct EventRosterResponse {
    pub event_id: i64,
    pub event_title: String,
    pub students: Vec<EventStudent>,
}

#[instrument(skip(state))]
pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<EventPage>, AppError> {
    let (page, page_size, offset) = query.clamped();

    let total = repo::count_all(&state.db).await?;
    let rows = repo::list_page(&state.db, page_size, offset).await?;
    let items: Vec<EventDto> = rows.into_iter().map(EventDto::from).collect();

    Ok(Json(EventPage {
        items,
        page,
        page_size,
        has_prev: page > 1,
        has_next: offset.saturating_add(page_size) < total,
        total,
    }))
}

#[instrument(skip(state, session))]
pub async fn register_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    session: SessionUser,
) -> Result<Json<MessageResponse>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    repo::register(&state.db, &session.email, event_id).await?;
    info!(email = %session.email, event_id, "event registration created");
    Ok(Json(MessageResponse {
        message: "Registered".into(),
    }))
}

#[instrument(skip(state, session))]
pub async fn leave_event(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    session: SessionUser,
) -> Result<Json<MessageResponse>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    repo::leave(&state.db, &session.email, event_id).await?;
    info!(email = %session.email, event_id, "event registration removed");
    Ok(Json(MessageResponse {
        message: "Left event".into(),
    }))
}

#[instrument(skip(state, session))]
pub async fn my_events(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<Vec<EventDto>>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    let rows = repo::list_for_user(&state.db, &session.email).await?;
    Ok(Json(rows.into_iter().map(EventDto::from).collect()))
}

#[instrument(skip(state, session))]
pub async fn admin_events(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<Vec<EventDto>>, AppError> {
    guard::require_admin(&state.db, &session).await?;

    let rows = repo::list_all(&state.db).await?;
    Ok(Json(rows.into_iter().map(EventDto::from).collect()))
}

#[instrument(skip(state, session))]
pub async fn admin_event_students(
    State(state): State<AppState>,
    Path(event_id): Path<i64>,
    session: SessionUser,
) -> Result<Json<EventRosterResponse>, AppError> {
    guard::require_admin(&state.db, &session).await?;

    let Some(event_title) = repo::find_title(&state.db, event_id).await? else {
        return Err(AppError::NotFound("Event not found".into()));
    };

    let students = repo::students(&state.db, event_id)
        .await?
        .into_iter()
        .map(|r| EventStudent {
            email: r.user_email,
            registered_at: r.created_at,
        })
        .collect();

    Ok(Json(EventRosterResponse {
        event_id,
        event_title,
        students,
    }))
}
