use std::{env, path::PathBuf, str::FromStr};

use anyhow::Context;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub database_max_connections: u32,
    pub host: String,
    pub port: u16,
    pub jwt_secret: String,
    pub jwt_ttl_hours: i64,
    pub reset_token_ttl_minutes: i64,
    pub frontend_url: String,
    pub upload_dir: PathBuf,
    pub max_upload_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL is not set")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET is not set")?;
        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let frontend_url =
            env::var("FRONTEND_URL").unwrap_or_else(|_| "http://localhost:5173".to_string());
        let upload_dir = env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".to_string());

        Ok(Self {
            database_url,
            database_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 10),
            host,
            port: parse_or("APP_PORT", 3000),
            jwt_secret,
            jwt_ttl_hours: parse_or("JWT_TTL_HOURS", 24),
            reset_token_ttl_minutes: parse_or("RESET_TOKEN_TTL_MINUTES", 60),
            frontend_url: frontend_url.trim_end_matches('/').to_string(),
            upload_dir: PathBuf::from(upload_dir),
            max_upload_bytes: parse_or("MAX_UPLOAD_BYTES", 5 * 1024 * 1024),
        })
    }

    /// Link the frontend uses to complete a password reset.
    pub fn reset_link(&self, token: &str) -> String {
        format!("{}/reset-password?token={}", self.frontend_url, token)
    }
}

fn parse_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_link_points_at_frontend() {
        let config = AppConfig {
            database_url: "postgres://localhost/test".into(),
            database_max_connections: 1,
            host: "127.0.0.1".into(),
            port: 3000,
            jwt_secret: "secret".into(),
            jwt_ttl_hours: 24,
            reset_token_ttl_minutes: 60,
            frontend_url: "http://localhost:5173".into(),
            upload_dir: PathBuf::from("uploads"),
            max_upload_bytes: 1024,
        };
        assert_eq!(
            config.reset_link("abc"),
            "http://localhost:5173/reset-password?token=abc"
        );
    }

    #[test]
    fn parse_or_falls_back_on_missing_key() {
        let value: u16 = parse_or("PICKLEBALL_TEST_SURELY_UNSET_KEY", 42);
        assert_eq!(value, 42);
    }
}
