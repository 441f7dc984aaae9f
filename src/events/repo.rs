use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::{is_unique_violation, AppError};

#[derive(Debug, Clone, FromRow)]
pub struct EventWithCount {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub date_time: String,
    pub location: String,
    pub description: String,
    pub quota: Option<i64>,
    pub registered_count: i64,
}

#[derive(Debug, FromRow)]
pub struct RegistrationRow {
    pub user_email: String,
    pub created_at: OffsetDateTime,
}

const EVENT_WITH_COUNT: &str = r#"
    SELECT e.id, e.title, e.category, e.date_time, e.location, e.description, e.quota,
           (SELECT COUNT(*) FROM event_registrations er WHERE er.event_id = e.id) AS registered_count
    FROM events e
"#;

pub async fn count_all(db: &PgPool) -> anyhow::Result<i64> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
        .fetch_one(db)
        .await?;
    Ok(total)
}

pub async fn list_page(
    db: &PgPool,
    limit: i64,
    offset: i64,
) -> anyhow::Result<Vec<EventWithCount>> {
    let sql = format!("{EVENT_WITH_COUNT} ORDER BY e.date_time ASC LIMIT $1 OFFSET $2");
    let rows = sqlx::query_as::<_, EventWithCount>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

pub async fn list_all(db: &PgPool) -> anyhow::Result<Vec<EventWithCount>> {
    let sql = format!("{EVENT_WITH_COUNT} ORDER BY e.date_time ASC");
    let rows = sqlx::query_as::<_, EventWithCount>(&sql)
        .fetch_all(db)
        .await?;
    Ok(rows)
}

/// Events the student is registered for.
pub async fn list_for_user(db: &PgPool, email: &str) -> anyhow::Result<Vec<EventWithCount>> {
    let rows = sqlx::query_as::<_, EventWithCount>(
        r#"
        SELECT e.id, e.title, e.category, e.date_time, e.location, e.description, e.quota,
               (SELECT COUNT(*) FROM event_registrations er WHERE er.event_id = e.id) AS registered_count
        FROM event_registrations my
        JOIN events e ON e.id = my.event_id
        WHERE my.user_email = $1
        ORDER BY e.date_time ASC
        "#,
    )
    .bind(email)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_title(db: &PgPool, event_id: i64) -> anyhow::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT title FROM events WHERE id = $1")
        .bind(event_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(t,)| t))
}

/// Register a student for an event. Same transactional shape as room joins:
/// FOR UPDATE on the event row serializes the quota re-check per event, and
/// the (event_id, user_email) unique constraint is the race backstop. A
/// null quota admits unbounded registrations.
pub async fn register(db: &PgPool, email: &str, event_id: i64) -> Result<(), AppError> {
    let mut tx = db.begin().await?;

    let event: Option<(i64, Option<i64>)> =
        sqlx::query_as("SELECT id, quota FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((_, quota)) = event else {
        return Err(AppError::NotFound("Event not found".into()));
    };

    if let Some(quota) = quota {
        let (registered,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM event_registrations WHERE event_id = $1")
                .bind(event_id)
                .fetch_one(&mut *tx)
                .await?;
        if registered >= quota {
            return Err(AppError::Conflict("Event is full".into()));
        }
    }

    let res = sqlx::query("INSERT INTO event_registrations (event_id, user_email) VALUES ($1, $2)")
        .bind(event_id)
        .bind(email)
        .execute(&mut *tx)
        .await;
    match res {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "You are already registered for this event".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;
    Ok(())
}

/// Idempotent: no registration present is not an error.
pub async fn leave(db: &PgPool, email: &str, event_id: i64) -> Result<(), AppError> {
    sqlx::query("DELETE FROM event_registrations WHERE event_id = $1 AND user_email = $2")
        .bind(event_id)
        .bind(email)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn students(db: &PgPool, event_id: i64) -> anyhow::Result<Vec<RegistrationRow>> {
    let rows = sqlx::query_as::<_, RegistrationRow>(
        r#"
        SELECT user_email, created_at
        FROM event_registrations
        WHERE event_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(event_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}
