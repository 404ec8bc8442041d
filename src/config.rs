use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub access_ttl_seconds: u64,
    pub refresh_ttl_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    pub url: String,
    pub database: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mongo: MongoConfig,
    pub jwt: JwtConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let mongo = MongoConfig {
            url: std::env::var("MONGO_URL").context("MONGO_URL is not set")?,
            database: std::env::var("MONGO_DB").unwrap_or_else(|_| "accounts".into()),
        };
        let jwt = JwtConfig {
            access_secret: std::env::var("JWT_SECRET_ACCESS_TOKEN")
                .context("JWT_SECRET_ACCESS_TOKEN is not set")?,
            refresh_secret: std::env::var("JWT_SECRET_REFRESH_TOKEN")
                .context("JWT_SECRET_REFRESH_TOKEN is not set")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "accounts".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "accounts-users".into()),
            access_ttl_seconds: env_u64("JWT_ACCESS_TTL_SECONDS").unwrap_or(15 * 60),
            refresh_ttl_seconds: env_u64("JWT_REFRESH_TTL_SECONDS").unwrap_or(60 * 60 * 24 * 7),
        };
        Ok(Self { mongo, jwt })
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|v| v.parse::<u64>().ok())
}
