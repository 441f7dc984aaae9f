use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{info, instrument};

use crate::auth::extractors::SessionUser;
use crate::auth::guard;
use crate::error::AppError;
use crate::rooms::dto::RoomDto;
use crate::rooms::repo;
use crate::settings;
use crate::state::AppState;

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/rooms", get(list_rooms))
        .route("/rooms/:room_id/join", post(join_room))
        .route("/rooms/leave", post(leave_room))
        .route("/me/room", get(my_room))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/rooms", get(admin_rooms))
        .route("/admin/rooms/:room_id/students", get(admin_room_students))
}

#[derive(Debug, Serialize)]
pub struct MyRoomResponse {
    pub room: Option<RoomDto>,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct RoomStudent {
    pub email: String,
    pub joined_at: OffsetDateTime,
}

#[derive(Debug, Serialize)]
pub struct RoomRosterResponse {
    pub room_id: i64,
    pub room_title: String,
    pub students: Vec<RoomStudent>,
}

#[instrument(skip(state))]
pub async fn list_rooms(State(state): State<AppState>) -> Result<Json<Vec<RoomDto>>, AppError> {
    let rooms = repo::list_with_counts(&state.db).await?;
    Ok(Json(rooms.into_iter().map(RoomDto::from).collect()))
}

#[instrument(skip(state, session))]
pub async fn my_room(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<MyRoomResponse>, AppError> {
    let room = repo::find_for_user(&state.db, &session.email).await?;
    Ok(Json(MyRoomResponse {
        room: room.map(RoomDto::from),
    }))
}

#[instrument(skip(state, session))]
pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    session: SessionUser,
) -> Result<Json<MessageResponse>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    if !settings::rooms_open(&state.db).await? {
        return Err(AppError::Forbidden("Room selection is closed by admin.".into()));
    }

    repo::join(&state.db, &session.email, room_id).await?;
    info!(email = %session.email, room_id, "room joined");
    Ok(Json(MessageResponse {
        message: "Joined room".into(),
    }))
}

#[instrument(skip(state, session))]
pub async fn leave_room(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<MessageResponse>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    if !settings::rooms_open(&state.db).await? {
        return Err(AppError::Forbidden(
            "Room selection is closed by admin. You cannot leave your room now.".into(),
        ));
    }

    repo::leave(&state.db, &session.email).await?;
    info!(email = %session.email, "room left");
    Ok(Json(MessageResponse {
        message: "Left room".into(),
    }))
}

#[instrument(skip(state, session))]
pub async fn admin_rooms(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<Vec<RoomDto>>, AppError> {
    guard::require_admin(&state.db, &session).await?;
    let rooms = repo::list_with_counts(&state.db).await?;
    Ok(Json(rooms.into_iter().map(RoomDto::from).collect()))
}

#[instrument(skip(state, session))]
pub async fn admin_room_students(
    State(state): State<AppState>,
    Path(room_id): Path<i64>,
    session: SessionUser,
) -> Result<Json<RoomRosterResponse>, AppError> {
    guard::require_admin(&state.db, &session).await?;

    let Some(room_title) = repo::find_title(&state.db, room_id).await? else {
        return Err(AppError::NotFound("Room not found".into()));
    };

    let students = repo::students(&state.db, room_id)
        .await?
        .into_iter()
        .map(|b| RoomStudent {
            email: b.user_email,
            joined_at: b.created_at,
        })
        .collect();

    Ok(Json(RoomRosterResponse {
        room_id,
        room_title,
        students,
    }))
}
