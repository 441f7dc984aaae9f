use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use crate::auth::extractors::SessionUser;
use crate::auth::guard;
use crate::error::AppError;
use crate::requests::dto::{
    AdminEventRequestDto, DecisionRequest, EventRequestDto, RequestStatus, StatusQuery,
    SubmitRequest,
};
use crate::requests::repo::{self, AcceptOutcome, HideOutcome};
use crate::state::AppState;

pub fn student_routes() -> Router<AppState> {
    Router::new()
        .route("/event-requests", get(list_my_requests).post(submit_request))
        .route("/event-requests/:request_id/hide", post(hide_request))
}

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/event-requests", get(admin_list_requests))
        .route(
            "/admin/event-requests/:request_id/decision",
            post(admin_decide_request),
        )
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SubmittedResponse {
    pub message: String,
    pub status: RequestStatus,
}

#[instrument(skip(state, session))]
pub async fn list_my_requests(
    State(state): State<AppState>,
    session: SessionUser,
) -> Result<Json<Vec<EventRequestDto>>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    let rows = repo::list_visible_for_student(&state.db, &session.email).await?;
    Ok(Json(rows.into_iter().map(EventRequestDto::from).collect()))
}

#[instrument(skip(state, session, payload))]
pub async fn submit_request(
    State(state): State<AppState>,
    session: SessionUser,
    Json(payload): Json<SubmitRequest>,
) -> Result<Json<SubmittedResponse>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    let fields = payload.validated()?;
    repo::create(&state.db, &session.email, &fields).await?;

    info!(email = %session.email, title = %fields.title, "event request submitted");
    Ok(Json(SubmittedResponse {
        message: "Event request created".into(),
        status: RequestStatus::Pending,
    }))
}

#[instrument(skip(state, session))]
pub async fn hide_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    session: SessionUser,
) -> Result<Json<MessageResponse>, AppError> {
    guard::require_student(&state.db, &state.config.allowed_email_domain, &session).await?;

    let Some(req) = repo::find_by_id(&state.db, request_id).await? else {
        return Err(AppError::NotFound("Request not found".into()));
    };
    if req.requested_by_email != session.email {
        return Err(AppError::Forbidden("Not your request".into()));
    }
    if req.status == RequestStatus::Pending.as_str() {
        return Err(AppError::Conflict("Pending requests cannot be hidden".into()));
    }

    let message = match repo::hide(&state.db, request_id, &session.email).await? {
        HideOutcome::Hidden => "Hidden",
        HideOutcome::AlreadyHidden => "Already hidden",
    };
    Ok(Json(MessageResponse {
        message: message.into(),
    }))
}

#[instrument(skip(state, session))]
pub async fn admin_list_requests(
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
    session: SessionUser,
) -> Result<Json<Vec<AdminEventRequestDto>>, AppError> {
    guard::require_admin(&state.db, &session).await?;

    // Unknown or missing status filters fall back to pending.
    let status = query
        .status
        .as_deref()
        .map(|s| s.trim().to_lowercase())
        .and_then(|s| RequestStatus::parse(&s))
        .unwrap_or(RequestStatus::Pending);

    let rows = repo::list_by_status(&state.db, status).await?;
    Ok(Json(
        rows.into_iter().map(AdminEventRequestDto::from).collect(),
    ))
}

#[instrument(skip(state, session, payload))]
pub async fn admin_decide_request(
    State(state): State<AppState>,
    Path(request_id): Path<i64>,
    session: SessionUser,
    Json(payload): Json<DecisionRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    guard::require_admin(&state.db, &session).await?;

    if repo::find_by_id(&state.db, request_id).await?.is_none() {
        return Err(AppError::NotFound("Request not found".into()));
    }

    let action = payload.action.trim().to_lowercase();
    let comment = payload.comment.trim();

    match action.as_str() {
        "reject" => {
            if comment.is_empty() {
                return Err(AppError::Validation("Rejection comment is required".into()));
            }
            repo::reject(&state.db, request_id, comment).await?;
            info!(admin = %session.email, request_id, "event request rejected");
            Ok(Json(MessageResponse {
                message: "Rejected".into(),
            }))
        }
        "accept" => match repo::accept(&state.db, request_id).await? {
            AcceptOutcome::Accepted => {
                info!(admin = %session.email, request_id, "event request accepted");
                Ok(Json(MessageResponse {
                    message: "Accepted and published".into(),
                }))
            }
            AcceptOutcome::AlreadyAccepted => Ok(Json(MessageResponse {
                message: "Already accepted".into(),
            })),
        },
        _ => Err(AppError::Validation("Action must be accept or reject".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use sqlx::PgPool;

    const STUDENT: &str = "alice@uni-bayreuth.de";

    async fn setup(pool: &PgPool) -> i64 {
        sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ($1, 'x', 'student')")
            .bind(STUDENT)
            .execute(pool)
            .await
            .unwrap();
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO event_requests
              (title, category, date_time, location, description, quota, requested_by_email)
            VALUES ('Movie Night', 'social', '2026-03-01T20:00', 'Common Room', 'Popcorn.', 30, $1)
            RETURNING id
            "#,
        )
        .bind(STUDENT)
        .fetch_one(pool)
        .await
        .unwrap();
        id
    }

    fn student_session() -> SessionUser {
        SessionUser {
            email: STUDENT.into(),
            role: Role::Student,
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn pending_request_cannot_be_hidden(pool: PgPool) {
        let request_id = setup(&pool).await;
        let state = AppState::fake_with_db(pool);

        let err = hide_request(State(state), Path(request_id), student_session())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejected_request_can_be_hidden_and_disappears(pool: PgPool) {
        let request_id = setup(&pool).await;
        repo::reject(&pool, request_id, "No venue available")
            .await
            .unwrap();
        let state = AppState::fake_with_db(pool.clone());

        hide_request(State(state), Path(request_id), student_session())
            .await
            .unwrap();

        let visible = repo::list_visible_for_student(&pool, STUDENT).await.unwrap();
        assert!(visible.is_empty());
    }
}
