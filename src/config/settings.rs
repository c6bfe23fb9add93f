//! Process settings from the environment (after `.env` is loaded by the binary).

use crate::error::ConfigError;
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "pg" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Invalid {
                key: "STORE",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Clone, Debug)]
pub struct Settings {
    pub store: StoreBackend,
    pub database_url: String,
    pub db_max_connections: u32,
    pub bind_addr: String,
    /// Externally visible base URL, used for checkout redirects and reset links.
    pub public_url: String,
    pub body_limit_bytes: usize,
    /// Requests per client IP per hour under /api; zero turns the limiter off.
    pub rate_limit_per_hour: u32,
    pub cors_origins: Vec<String>,
    pub session_ttl_hours: i64,
    pub stripe_secret_key: Option<String>,
    pub catalog_path: Option<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            store: StoreBackend::Postgres,
            database_url: "postgres://localhost/tour_booking".into(),
            db_max_connections: 5,
            bind_addr: "0.0.0.0:3000".into(),
            public_url: "http://127.0.0.1:3000".into(),
            body_limit_bytes: 10 * 1024,
            rate_limit_per_hour: 100,
            cors_origins: vec!["http://localhost:3000".into(), "http://127.0.0.1:3000".into()],
            session_ttl_hours: 90 * 24,
            stripe_secret_key: None,
            catalog_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut s = Settings::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = get("STORE") {
            s.store = v.parse()?;
        }
        if let Some(v) = get("DATABASE_URL") {
            s.database_url = v;
        }
        if let Some(v) = get("DB_MAX_CONNECTIONS") {
            s.db_max_connections = parse_number("DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = get("BIND_ADDR") {
            s.bind_addr = v;
        } else if let Some(port) = get("PORT") {
            let port: u16 = parse_number("PORT", &port)?;
            s.bind_addr = format!("0.0.0.0:{}", port);
        }
        if let Some(v) = get("PUBLIC_URL") {
            s.public_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("BODY_LIMIT_BYTES") {
            s.body_limit_bytes = parse_number("BODY_LIMIT_BYTES", &v)?;
        }
        if let Some(v) = get("RATE_LIMIT_PER_HOUR") {
            s.rate_limit_per_hour = parse_number("RATE_LIMIT_PER_HOUR", &v)?;
        }
        if let Some(v) = get("CORS_ORIGINS") {
            s.cors_origins = v
                .split(',')
                .map(|o| o.trim().to_string())
                .filter(|o| !o.is_empty())
                .collect();
        }
        if let Some(v) = get("SESSION_TTL_HOURS") {
            s.session_ttl_hours = parse_number("SESSION_TTL_HOURS", &v)?;
        }
        s.stripe_secret_key = get("STRIPE_SECRET_KEY");
        s.catalog_path = get("CATALOG_PATH").map(PathBuf::from);
        Ok(s)
    }
}

fn parse_number<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::Invalid {
        key,
        value: value.to_string(),
    })
}
