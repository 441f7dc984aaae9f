use argon2::{
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use lazy_static::lazy_static;
use rand::rngs::OsRng;
use rand::RngCore;
use regex::Regex;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use time::OffsetDateTime;
use tracing::error;

use crate::auth::dto::Role;
use crate::auth::repo::{PendingVerification, User};
use crate::config::AppConfig;
use crate::error::{is_unique_violation, AppError};

/// Outcome of a code-issuance operation (register or resend). Cooling down
/// is a throttling signal, not an error: no new code is generated.
#[derive(Debug)]
pub enum CodeIssue {
    Issued { code: String, cooldown_seconds: i64 },
    CoolingDown { retry_in_seconds: i64 },
}

pub fn is_allowed_email(email: &str, allowed_domain: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email) && email.ends_with(allowed_domain)
}

pub fn hash_password(plain: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    let hash = argon2
        .hash_password(plain.as_bytes(), &salt)
        .map_err(|e| {
            error!(error = %e, "argon2 hash_password error");
            anyhow::anyhow!(e.to_string())
        })?
        .to_string();
    Ok(hash)
}

pub fn verify_password(plain: &str, hash: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| {
        error!(error = %e, "argon2 parse hash error");
        anyhow::anyhow!(e.to_string())
    })?;
    Ok(Argon2::default()
        .verify_password(plain.as_bytes(), &parsed)
        .is_ok())
}

/// Fresh 6-digit zero-padded code from the OS RNG.
pub fn generate_code() -> String {
    format!("{:06}", OsRng.next_u32() % 1_000_000)
}

/// Codes are short-lived and single-use, so the digest is unsalted.
pub fn hash_code(code: &str) -> String {
    let digest = Sha256::digest(code.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub fn code_matches(code: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_code(code).as_bytes(), stored_hash.as_bytes())
}

/// Seconds left before a new code may be issued; 0 when the window has
/// elapsed.
pub fn cooldown_remaining(
    last_sent_at: OffsetDateTime,
    cooldown_seconds: i64,
    now: OffsetDateTime,
) -> i64 {
    let elapsed = (now - last_sent_at).whole_seconds();
    (cooldown_seconds - elapsed).max(0)
}

#[cfg(feature = "demo-inbox")]
fn plaintext_mirror(code: &str) -> Option<&str> {
    Some(code)
}

#[cfg(not(feature = "demo-inbox"))]
fn plaintext_mirror(_code: &str) -> Option<&str> {
    None
}

/// Start a registration: refuse if the user exists, throttle inside the
/// cooldown window, otherwise upsert the pending row with a fresh code and
/// the candidate password hash.
pub async fn start_registration(
    db: &PgPool,
    config: &AppConfig,
    email: &str,
    password: &str,
) -> Result<CodeIssue, AppError> {
    if User::find_by_email(db, email).await?.is_some() {
        return Err(AppError::Validation("User already exists. Please login.".into()));
    }

    let now = OffsetDateTime::now_utc();
    if let Some(pending) = PendingVerification::find_by_email(db, email).await? {
        let retry_in = cooldown_remaining(pending.last_sent_at, config.code_cooldown_seconds, now);
        if retry_in > 0 {
            return Ok(CodeIssue::CoolingDown {
                retry_in_seconds: retry_in,
            });
        }
    }

    let code = generate_code();
    let code_hash = hash_code(&code);
    let password_hash = hash_password(password)?;
    PendingVerification::upsert(
        db,
        email,
        &code_hash,
        plaintext_mirror(&code),
        &password_hash,
        now,
    )
    .await?;

    Ok(CodeIssue::Issued {
        code,
        cooldown_seconds: config.code_cooldown_seconds,
    })
}

/// Rotate the code on an existing pending registration. The candidate
/// password stored at registration time is left untouched.
pub async fn resend_code(
    db: &PgPool,
    config: &AppConfig,
    email: &str,
) -> Result<CodeIssue, AppError> {
    if User::find_by_email(db, email).await?.is_some() {
        return Err(AppError::Validation("User already exists. Please login.".into()));
    }

    let pending = PendingVerification::find_by_email(db, email)
        .await?
        .ok_or_else(|| {
            AppError::Validation("No pending registration. Please register first.".into())
        })?;

    let now = OffsetDateTime::now_utc();
    let retry_in = cooldown_remaining(pending.last_sent_at, config.code_cooldown_seconds, now);
    if retry_in > 0 {
        return Ok(CodeIssue::CoolingDown {
            retry_in_seconds: retry_in,
        });
    }

    let code = generate_code();
    let code_hash = hash_code(&code);
    PendingVerification::rotate_code(db, email, &code_hash, plaintext_mirror(&code), now).await?;

    Ok(CodeIssue::Issued {
        code,
        cooldown_seconds: config.code_cooldown_seconds,
    })
}

/// Check the supplied code against the pending registration; on match,
/// create the student user and consume the pending row in one transaction.
/// Mismatch or absence returns false with no side effects.
pub async fn verify_code_and_create_user(
    db: &PgPool,
    email: &str,
    code: &str,
) -> Result<bool, AppError> {
    let Some(pending) = PendingVerification::find_by_email(db, email).await? else {
        return Ok(false);
    };

    if !code_matches(code, &pending.code_hash) {
        return Ok(false);
    }

    let mut tx = db.begin().await?;
    match User::create(&mut tx, email, &pending.password_hash, Role::Student.as_str()).await {
        Ok(_) => {}
        // Lost a race with a concurrent verification; the code is spent.
        Err(e) if is_unique_violation(&e) => return Ok(false),
        Err(e) => return Err(e.into()),
    }
    PendingVerification::delete(&mut tx, email)
        .await
        .map_err(AppError::from)?;
    tx.commit().await?;
    Ok(true)
}

/// Verify credentials; returns the stored role on success.
pub async fn login(db: &PgPool, email: &str, password: &str) -> Result<Option<Role>, AppError> {
    let Some(user) = User::find_by_email(db, email).await? else {
        return Ok(None);
    };
    if !verify_password(password, &user.password_hash)? {
        return Ok(None);
    }
    let role = Role::parse(&user.role)
        .ok_or_else(|| anyhow::anyhow!("unknown role in users table: {}", user.role))?;
    Ok(Some(role))
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..50 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn code_digest_round_trip() {
        let code = generate_code();
        let digest = hash_code(&code);
        assert!(code_matches(&code, &digest));
        assert!(!code_matches("000001", &hash_code("999999")));
    }

    #[test]
    fn code_digest_is_deterministic() {
        assert_eq!(hash_code("123456"), hash_code("123456"));
        assert_ne!(hash_code("123456"), hash_code("123457"));
    }

    #[test]
    fn cooldown_counts_down_and_clamps_at_zero() {
        let now = OffsetDateTime::now_utc();
        assert_eq!(cooldown_remaining(now, 60, now), 60);
        assert_eq!(cooldown_remaining(now - Duration::seconds(25), 60, now), 35);
        assert_eq!(cooldown_remaining(now - Duration::seconds(60), 60, now), 0);
        assert_eq!(cooldown_remaining(now - Duration::seconds(300), 60, now), 0);
    }

    #[test]
    fn password_hash_and_verify_roundtrip() {
        let hash = hash_password("secret1").expect("hashing should succeed");
        assert!(verify_password("secret1", &hash).expect("verify should succeed"));
        assert!(!verify_password("secret2", &hash).expect("verify should not error"));
    }

    #[test]
    fn domain_check_requires_suffix_and_shape() {
        let domain = "@uni-bayreuth.de";
        assert!(is_allowed_email("alice@uni-bayreuth.de", domain));
        assert!(!is_allowed_email("alice@gmail.com", domain));
        assert!(!is_allowed_email("not-an-email", domain));
        assert!(!is_allowed_email("@uni-bayreuth.de", domain));
    }

    #[test]
    fn constant_time_eq_basics() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
    }

    fn test_config() -> AppConfig {
        AppConfig {
            database_url: String::new(),
            jwt: crate::config::JwtConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            allowed_email_domain: "@uni-bayreuth.de".into(),
            code_cooldown_seconds: 60,
            seed_admin_email: "admin@uni-bayreuth.de".into(),
            seed_admin_password: "admin123".into(),
        }
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn verification_code_is_single_use(pool: PgPool) {
        let config = test_config();
        let email = "alice@uni-bayreuth.de";

        let issue = start_registration(&pool, &config, email, "secret1")
            .await
            .unwrap();
        let CodeIssue::Issued { code, .. } = issue else {
            panic!("expected a fresh code, got {issue:?}");
        };

        assert!(verify_code_and_create_user(&pool, email, &code)
            .await
            .unwrap());
        // Pending row is consumed with the first success.
        assert!(!verify_code_and_create_user(&pool, email, &code)
            .await
            .unwrap());

        let role = login(&pool, email, "secret1").await.unwrap();
        assert_eq!(role, Some(Role::Student));
    }

    #[sqlx::test(migrations = "./migrations")]
    async fn second_registration_inside_cooldown_is_throttled(pool: PgPool) {
        let config = test_config();
        let email = "bob@uni-bayreuth.de";

        let first = start_registration(&pool, &config, email, "secret1")
            .await
            .unwrap();
        assert!(matches!(first, CodeIssue::Issued { .. }));

        let second = start_registration(&pool, &config, email, "secret1")
            .await
            .unwrap();
        let CodeIssue::CoolingDown { retry_in_seconds } = second else {
            panic!("expected throttling, got {second:?}");
        };
        assert!(retry_in_seconds > 0 && retry_in_seconds <= 60);
    }
}
