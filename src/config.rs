use std::env;
use std::str::FromStr;

use anyhow::{Result, anyhow};

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub access_token_ttl: usize,
    pub refresh_token_ttl: usize,

    // Rate limiting
    pub rate_login_per_min: u32,
    pub rate_register_per_min: u32,
    pub rate_refresh_per_min: u32,
    pub rate_protected_per_min: u32,

    pub api_prefix: String,

    // Logging
    pub log_dir: String,
    pub log_level: tracing::Level,

    pub run_migrations: bool,
    pub holiday_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup; `from_env` passes the process
    /// environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| lookup(key).ok_or_else(|| anyhow!("{key} must be set"));

        Ok(Self {
            server_addr: required("SERVER_ADDR")?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            access_token_ttl: setting(&lookup, "ACCESS_TOKEN_TTL", "900")?, // 15 min
            refresh_token_ttl: setting(&lookup, "REFRESH_TOKEN_TTL", "604800")?, // 7 days

            rate_login_per_min: setting(&lookup, "RATE_LOGIN_PER_MIN", "60")?,
            rate_register_per_min: setting(&lookup, "RATE_REGISTER_PER_MIN", "30")?,
            rate_refresh_per_min: setting(&lookup, "RATE_REFRESH_PER_MIN", "30")?,
            rate_protected_per_min: setting(&lookup, "RATE_PROTECTED_PER_MIN", "1000")?,

            api_prefix: setting(&lookup, "API_PREFIX", "/api")?,

            log_dir: setting(&lookup, "LOG_DIR", "logs")?,
            log_level: setting(&lookup, "LOG_LEVEL", "debug")?,

            run_migrations: setting(&lookup, "RUN_MIGRATIONS", "true")?,
            holiday_cache_ttl_secs: setting(&lookup, "HOLIDAY_CACHE_TTL_SECS", "3600")?,
        })
    }
}

fn setting<T, F>(lookup: &F, key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| anyhow!("{key} has an invalid value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: &[(&str, &str)] = &[
        ("SERVER_ADDR", "0.0.0.0:8080"),
        ("DATABASE_URL", "mysql://hr:hr@localhost/hr"),
        ("JWT_SECRET", "s3cret"),
    ];

    #[test]
    fn applies_defaults() {
        let config = Config::from_lookup(lookup(REQUIRED)).unwrap();
        assert_eq!(config.access_token_ttl, 900);
        assert_eq!(config.refresh_token_ttl, 604_800);
        assert_eq!(config.rate_protected_per_min, 1000);
        assert_eq!(config.api_prefix, "/api");
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert!(config.run_migrations);
        assert_eq!(config.holiday_cache_ttl_secs, 3600);
    }

    #[test]
    fn missing_required_value_names_the_key() {
        let err = Config::from_lookup(lookup(&REQUIRED[..2])).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn invalid_number_names_the_key() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("ACCESS_TOKEN_TTL", "fifteen"));
        let err = Config::from_lookup(lookup(&pairs)).unwrap_err();
        assert!(err.to_string().contains("ACCESS_TOKEN_TTL"));

        let mut pairs = REQUIRED.to_vec();
        pairs.push(("LOG_LEVEL", "info"));
        pairs.push(("RUN_MIGRATIONS", "false"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert!(!config.run_migrations);
    }
}
