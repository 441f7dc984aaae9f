use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;

use crate::error::{is_unique_violation, AppError};

#[derive(Debug, Clone, FromRow)]
pub struct RoomWithCount {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub room_type: String,
    pub title: String,
    pub description: String,
    pub price_eur: i64,
    pub capacity: i64,
    pub available: bool,
    pub booked_count: i64,
}

#[derive(Debug, FromRow)]
pub struct BookingRow {
    pub user_email: String,
    pub created_at: OffsetDateTime,
}

pub async fn list_with_counts(db: &PgPool) -> anyhow::Result<Vec<RoomWithCount>> {
    let rows = sqlx::query_as::<_, RoomWithCount>(
        r#"
        SELECT r.*,
               (SELECT COUNT(*) FROM room_bookings rb WHERE rb.room_id = r.id) AS booked_count
        FROM rooms r
        ORDER BY r.id
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// The room a student currently holds, if any.
pub async fn find_for_user(db: &PgPool, email: &str) -> anyhow::Result<Option<RoomWithCount>> {
    let row = sqlx::query_as::<_, RoomWithCount>(
        r#"
        SELECT r.*,
               (SELECT COUNT(*) FROM room_bookings rb2 WHERE rb2.room_id = r.id) AS booked_count
        FROM room_bookings rb
        JOIN rooms r ON r.id = rb.room_id
        WHERE rb.user_email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn find_title(db: &PgPool, room_id: i64) -> anyhow::Result<Option<String>> {
    let row: Option<(String,)> = sqlx::query_as("SELECT title FROM rooms WHERE id = $1")
        .bind(room_id)
        .fetch_optional(db)
        .await?;
    Ok(row.map(|(t,)| t))
}

/// Book a room for a student. Runs in a single transaction: the room row is
/// locked with FOR UPDATE so the capacity re-check and the insert are
/// serialized per room; the unique constraint on user_email is the final
/// backstop for the one-room-per-student invariant.
pub async fn join(db: &PgPool, email: &str, room_id: i64) -> Result<(), AppError> {
    let mut tx = db.begin().await?;

    let existing: Option<(i64,)> =
        sqlx::query_as("SELECT room_id FROM room_bookings WHERE user_email = $1")
            .bind(email)
            .fetch_optional(&mut *tx)
            .await?;
    if existing.is_some() {
        return Err(AppError::Conflict(
            "You are already in a room. Leave it first to switch.".into(),
        ));
    }

    let room: Option<(i64, i64)> =
        sqlx::query_as("SELECT id, capacity FROM rooms WHERE id = $1 FOR UPDATE")
            .bind(room_id)
            .fetch_optional(&mut *tx)
            .await?;
    let Some((_, capacity)) = room else {
        return Err(AppError::NotFound("Room not found".into()));
    };

    let (booked,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM room_bookings WHERE room_id = $1")
            .bind(room_id)
            .fetch_one(&mut *tx)
            .await?;
    if booked >= capacity {
        return Err(AppError::Conflict("Room is full".into()));
    }

    let res = sqlx::query("INSERT INTO room_bookings (room_id, user_email) VALUES ($1, $2)")
        .bind(room_id)
        .bind(email)
        .execute(&mut *tx)
        .await;
    match res {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => {
            return Err(AppError::Conflict(
                "You are already in a room. Leave it first to switch.".into(),
            ))
        }
        Err(e) => return Err(e.into()),
    }

    tx.commit().await?;
    Ok(())
}

/// Idempotent: deleting zero rows is still a successful leave.
pub async fn leave(db: &PgPool, email: &str) -> Result<(), AppError> {
    sqlx::query("DELETE FROM room_bookings WHERE user_email = $1")
        .bind(email)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn students(db: &PgPool, room_id: i64) -> anyhow::Result<Vec<BookingRow>> {
    let rows = sqlx::query_as::<_, BookingRow>(
        r#"
        SELECT user_email, created_at
        FROM room_bookings
        WHERE room_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(room_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn insert_student(pool: &PgPool, email: &str) {
        sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ($1, 'x', 'student')")
            .bind(email)
            .execute(pool)
            .await
            .unwrap();
    }

    async fn insert_room(pool: &PgPool, capacity: i64) -> i64 {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO rooms (type, title, description, price_eur, capacity, available)
            VALUES ('single', 'Test Room', 'For booking', 300, $1, TRUE)
            RETURNING id
            "#,
        )
        .bind(capacity)
        .fetch_one(pool)
        .await
        .unwrap();
        id
    }

    async fn booking_count(pool: &PgPool, room_id: i64) -> i64 {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM room_bookings WHERE room_id = $1")
                .bind(room_id)
                .fetch_one(pool)
                .await
                .unwrap();
        count
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn concurrent_joins_never_exceed_capacity(pool: PgPool) {
        let room_id = insert_room(&pool, 1).await;
        let emails = [
            "a@uni-bayreuth.de",
            "b@uni-bayreuth.de",
            "c@uni-bayreuth.de",
        ];
        for email in emails {
            insert_student(&pool, email).await;
        }

        let (r1, r2, r3) = tokio::join!(
            join(&pool, emails[0], room_id),
            join(&pool, emails[1], room_id),
            join(&pool, emails[2], room_id),
        );
        let successes = [&r1, &r2, &r3].iter().filter(|r| r.is_ok()).count();

        assert_eq!(successes, 1);
        assert_eq!(booking_count(&pool, room_id).await, 1);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn student_cannot_hold_two_rooms(pool: PgPool) {
        let first = insert_room(&pool, 2).await;
        let second = insert_room(&pool, 2).await;
        insert_student(&pool, "a@uni-bayreuth.de").await;

        join(&pool, "a@uni-bayreuth.de", first).await.unwrap();
        let err = join(&pool, "a@uni-bayreuth.de", second)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(booking_count(&pool, first).await, 1);
        assert_eq!(booking_count(&pool, second).await, 0);
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn leave_then_rejoin_succeeds(pool: PgPool) {
        let room_id = insert_room(&pool, 1).await;
        insert_student(&pool, "a@uni-bayreuth.de").await;

        join(&pool, "a@uni-bayreuth.de", room_id).await.unwrap();
        leave(&pool, "a@uni-bayreuth.de").await.unwrap();
        join(&pool, "a@uni-bayreuth.de", room_id).await.unwrap();

        assert_eq!(booking_count(&pool, room_id).await, 1);
    }
}
