use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::{is_unique_violation, AppError};
use crate::requests::dto::{RequestStatus, SubmitRequest};

#[derive(Debug, Clone, FromRow)]
pub struct EventRequestRow {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub date_time: String,
    pub location: String,
    pub description: String,
    pub quota: Option<i64>,
    pub requested_by_email: String,
    pub status: String,
    pub admin_comment: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const COLUMNS: &str = "id, title, category, date_time, location, description, quota, \
                       requested_by_email, status, admin_comment, created_at, updated_at";

pub async fn create(db: &PgPool, email: &str, fields: &SubmitRequest) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO event_requests
          (title, category, date_time, location, description, quota, requested_by_email)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&fields.title)
    .bind(&fields.category)
    .bind(&fields.date_time)
    .bind(&fields.location)
    .bind(&fields.description)
    .bind(fields.quota)
    .bind(email)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn find_by_id(db: &PgPool, id: i64) -> anyhow::Result<Option<EventRequestRow>> {
    let sql = format!("SELECT {COLUMNS} FROM event_requests WHERE id = $1");
    let row = sqlx::query_as::<_, EventRequestRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row)
}

/// The student's own requests, newest first, minus the ones they hid.
pub async fn list_visible_for_student(
    db: &PgPool,
    email: &str,
) -> anyhow::Result<Vec<EventRequestRow>> {
    let rows = sqlx::query_as::<_, EventRequestRow>(
        r#"
        SELECT er.id, er.title, er.category, er.date_time, er.location, er.description,
               er.quota, er.requested_by_email, er.status, er.admin_comment,
               er.created_at, er.updated_at
        FROM event_requests er
        LEFT JOIN student_hidden_event_requests h
          ON h.request_id = er.id AND h.student_email = er.requested_by_email
        WHERE er.requested_by_email = $1
          AND h.id IS NULL
        ORDER BY er.created_at DESC
        "#,
    )
    .bind(email)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Admin view: all requests with the given status, hidden markers ignored.
pub async fn list_by_status(
    db: &PgPool,
    status: RequestStatus,
) -> anyhow::Result<Vec<EventRequestRow>> {
    let sql = format!(
        "SELECT {COLUMNS} FROM event_requests WHERE status = $1 ORDER BY updated_at DESC"
    );
    let rows = sqlx::query_as::<_, EventRequestRow>(&sql)
        .bind(status.as_str())
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Hide a resolved request from the student's own listing. Idempotent: a
/// duplicate marker insert reports "already hidden".
pub enum HideOutcome {
    Hidden,
    AlreadyHidden,
}

pub async fn hide(db: &PgPool, request_id: i64, email: &str) -> Result<HideOutcome, AppError> {
    let res = sqlx::query(
        "INSERT INTO student_hidden_event_requests (request_id, student_email) VALUES ($1, $2)",
    )
    .bind(request_id)
    .bind(email)
    .execute(db)
    .await;
    match res {
        Ok(_) => Ok(HideOutcome::Hidden),
        Err(e) if is_unique_violation(&e) => Ok(HideOutcome::AlreadyHidden),
        Err(e) => Err(e.into()),
    }
}

pub enum AcceptOutcome {
    Accepted,
    AlreadyAccepted,
}

/// Accept a request and materialize the live Event. The status flip and the
/// event insert commit together; an accepted request without its Event can
/// never be observed. Re-accepting is a no-op.
pub async fn accept(db: &PgPool, request_id: i64) -> Result<AcceptOutcome, AppError> {
    let mut tx = db.begin().await?;

    let sql = format!("SELECT {COLUMNS} FROM event_requests WHERE id = $1 FOR UPDATE");
    let req = sqlx::query_as::<_, EventRequestRow>(&sql)
        .bind(request_id)
        .fetch_optional(&mut *tx)
        .await?;
    let Some(req) = req else {
        return Err(AppError::NotFound("Request not found".into()));
    };

    if req.status == RequestStatus::Accepted.as_str() {
        return Ok(AcceptOutcome::AlreadyAccepted);
    }

    sqlx::query(
        r#"
        UPDATE event_requests
        SET status = 'accepted', admin_comment = NULL, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(request_id)
    .execute(&mut *tx)
    .await?;

    sqlx::query(
        r#"
        INSERT INTO events (title, category, date_time, location, description, quota, created_by_email)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(&req.title)
    .bind(&req.category)
    .bind(&req.date_time)
    .bind(&req.location)
    .bind(&req.description)
    .bind(req.quota)
    .bind(&req.requested_by_email)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(AcceptOutcome::Accepted)
}

/// Reject with a comment. Allowed from any current status, including
/// accepted; the materialized Event (if any) is left in place.
pub async fn reject(db: &PgPool, request_id: i64, comment: &str) -> Result<(), AppError> {
    let res = sqlx::query(
        r#"
        UPDATE event_requests
        SET status = 'rejected', admin_comment = $2, updated_at = now()
        WHERE id = $1
        "#,
    )
    .bind(request_id)
    .bind(comment)
    .execute(db)
    .await?;
    if res.rows_affected() == 0 {
        return Err(AppError::NotFound("Request not found".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUDENT: &str = "alice@uni-bayreuth.de";

    async fn insert_student(pool: &PgPool, email: &str) {
        sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ($1, 'x', 'student')")
            .bind(email)
            .execute(pool)
            .await
            .unwrap();
    }

    fn sample_request() -> SubmitRequest {
        SubmitRequest {
            title: "Board Games Night".into(),
            category: "social".into(),
            date_time: "2026-09-10T19:00".into(),
            location: "Common Room".into(),
            description: "Bring your own games.".into(),
            quota: Some(12),
        }
    }

    async fn submit_sample(pool: &PgPool) -> i64 {
        create(pool, STUDENT, &sample_request()).await.unwrap();
        let (id,): (i64,) =
            sqlx::query_as("SELECT id FROM event_requests WHERE requested_by_email = $1")
                .bind(STUDENT)
                .fetch_one(pool)
                .await
                .unwrap();
        id
    }

    async fn event_count(pool: &PgPool, title: &str) -> i64 {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events WHERE title = $1")
            .bind(title)
            .fetch_one(pool)
            .await
            .unwrap();
        count
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn accepting_twice_materializes_one_event(pool: PgPool) {
        insert_student(&pool, STUDENT).await;
        let id = submit_sample(&pool).await;

        let first = accept(&pool, id).await.unwrap();
        assert!(matches!(first, AcceptOutcome::Accepted));
        assert_eq!(event_count(&pool, "Board Games Night").await, 1);

        let second = accept(&pool, id).await.unwrap();
        assert!(matches!(second, AcceptOutcome::AlreadyAccepted));
        assert_eq!(event_count(&pool, "Board Games Night").await, 1);

        let row = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status, "accepted");
        assert_eq!(row.admin_comment, None);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn rejecting_keeps_the_materialized_event(pool: PgPool) {
        insert_student(&pool, STUDENT).await;
        let id = submit_sample(&pool).await;

        accept(&pool, id).await.unwrap();
        reject(&pool, id, "Double-booked venue").await.unwrap();

        let row = find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(row.status, "rejected");
        assert_eq!(row.admin_comment.as_deref(), Some("Double-booked venue"));
        assert_eq!(event_count(&pool, "Board Games Night").await, 1);
    }
}
