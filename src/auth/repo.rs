use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub role: String,
    pub created_at: OffsetDateTime,
}

impl User {
    pub async fn find_by_email(db: &PgPool, email: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT email, password_hash, role, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(user)
    }

    pub async fn create(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
        password_hash: &str,
        role: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, role)
            VALUES ($1, $2, $3)
            RETURNING email, password_hash, role, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(role)
        .fetch_one(&mut **tx)
        .await
    }
}

/// A registration attempt awaiting code verification. One row per email;
/// repeated attempts replace it outright.
#[derive(Debug, Clone, FromRow)]
pub struct PendingVerification {
    pub email: String,
    pub code_hash: String,
    /// Demo-only plaintext mirror; NULL when the demo inbox is compiled out.
    pub code_plain: Option<String>,
    pub password_hash: String,
    pub created_at: OffsetDateTime,
    pub last_sent_at: OffsetDateTime,
}

impl PendingVerification {
    pub async fn find_by_email(
        db: &PgPool,
        email: &str,
    ) -> anyhow::Result<Option<PendingVerification>> {
        let row = sqlx::query_as::<_, PendingVerification>(
            r#"
            SELECT email, code_hash, code_plain, password_hash, created_at, last_sent_at
            FROM email_verifications
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(db)
        .await?;
        Ok(row)
    }

    /// Insert or replace the pending registration for `email`.
    pub async fn upsert(
        db: &PgPool,
        email: &str,
        code_hash: &str,
        code_plain: Option<&str>,
        password_hash: &str,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO email_verifications
              (email, code_hash, code_plain, password_hash, created_at, last_sent_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            ON CONFLICT (email) DO UPDATE SET
              code_hash = excluded.code_hash,
              code_plain = excluded.code_plain,
              password_hash = excluded.password_hash,
              created_at = excluded.created_at,
              last_sent_at = excluded.last_sent_at
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .bind(code_plain)
        .bind(password_hash)
        .bind(now)
        .execute(db)
        .await?;
        Ok(())
    }

    /// Rotate the code on an existing pending row; the stored candidate
    /// password is left untouched.
    pub async fn rotate_code(
        db: &PgPool,
        email: &str,
        code_hash: &str,
        code_plain: Option<&str>,
        now: OffsetDateTime,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE email_verifications
            SET code_hash = $2, code_plain = $3, last_sent_at = $4
            WHERE email = $1
            "#,
        )
        .bind(email)
        .bind(code_hash)
        .bind(code_plain)
        .bind(now)
        .execute(db)
        .await?;
        Ok(())
    }

    pub async fn delete(
        tx: &mut Transaction<'_, Postgres>,
        email: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM email_verifications WHERE email = $1")
            .bind(email)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}
