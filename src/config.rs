use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    /// Required host suffix for all registration/login emails,
    /// including the leading '@'.
    pub allowed_email_domain: String,
    /// Minimum interval between code issuances for the same email.
    pub code_cooldown_seconds: i64,
    pub seed_admin_email: String,
    pub seed_admin_password: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "unihousing".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "unihousing-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(12 * 60),
        };
        let allowed_email_domain =
            std::env::var("ALLOWED_EMAIL_DOMAIN").unwrap_or_else(|_| "@uni-bayreuth.de".into());
        let code_cooldown_seconds = std::env::var("CODE_COOLDOWN_SECONDS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(60);
        let seed_admin_email =
            std::env::var("SEED_ADMIN_EMAIL").unwrap_or_else(|_| "admin@uni-bayreuth.de".into());
        let seed_admin_password =
            std::env::var("SEED_ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into());
        Ok(Self {
            database_url,
            jwt,
            allowed_email_domain,
            code_cooldown_seconds,
            seed_admin_email,
            seed_admin_password,
        })
    }
}
