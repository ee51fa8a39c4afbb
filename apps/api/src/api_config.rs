use std::env;

use pixelwall_core::AppError;

/// Environment-driven runtime configuration for the API process.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub migrate_only: bool,
    pub database_url: String,
    pub api_host: String,
    pub api_port: u16,
    pub window_seconds: i64,
    pub ip_ceiling: usize,
    pub tenant_ceiling: usize,
    pub rule_cache_ttl_seconds: i64,
    pub store_timeout_ms: u64,
    pub public_base_url: String,
}

impl ApiConfig {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self, AppError> {
        let migrate_only = env::args().nth(1).as_deref() == Some("migrate");

        let database_url = required_env("DATABASE_URL")?;
        let api_host = env::var("API_HOST").unwrap_or_else(|_| "127.0.0.1".to_owned());
        let api_port = env_or("API_PORT", 3001_u16)?;

        let window_seconds = env_or("RATE_WINDOW_SECONDS", 60_i64)?;
        let ip_ceiling = env_or("IP_RATE_LIMIT", 60_usize)?;
        let tenant_ceiling = env_or("TENANT_RATE_LIMIT", 100_000_usize)?;
        let rule_cache_ttl_seconds = env_or("RULE_CACHE_TTL_SECONDS", 60_i64)?;
        let store_timeout_ms = env_or("STORE_TIMEOUT_MS", 2_000_u64)?;

        let public_base_url =
            env::var("PUBLIC_BASE_URL").unwrap_or_else(|_| "http://localhost:3001".to_owned());

        Ok(Self {
            migrate_only,
            database_url,
            api_host,
            api_port,
            window_seconds,
            ip_ceiling,
            tenant_ceiling,
            rule_cache_ttl_seconds,
            store_timeout_ms,
            public_base_url,
        })
    }
}

fn required_env(name: &str) -> Result<String, AppError> {
    env::var(name).map_err(|_| AppError::Validation(format!("{name} is required")))
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> Result<T, AppError> {
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .map_err(|_| AppError::Validation(format!("invalid {name} '{value}'"))),
        Err(_) => Ok(default),
    }
}
