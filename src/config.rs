use std::env;
use std::str::FromStr;

use anyhow::{Context, Result};

use crate::service::policy::{DayCountPolicy, LeavePolicy};

#[derive(Clone)]
pub struct Config {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,

    // Rate limiting
    pub rate_protected_per_min: u32,
    pub rate_write_per_min: u32,

    pub api_prefix: String,

    pub leave_policy: LeavePolicy,

    pub log_level: String,
    pub log_dir: String,
}

fn required(key: &str) -> Result<String> {
    env::var(key).with_context(|| format!("{key} must be set"))
}

fn or_default<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Reads the process environment; `.env` is loaded by the caller.
    pub fn from_env() -> Result<Self> {
        let leave_policy = LeavePolicy {
            day_count: or_default("LEAVE_DAY_COUNT", DayCountPolicy::Calendar)?,
            require_future_dates: or_default("LEAVE_REQUIRE_FUTURE_DATES", true)?,
        };

        Ok(Self {
            server_addr: or_default("SERVER_ADDR", "127.0.0.1:8080".to_string())?,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            db_max_connections: or_default("DB_MAX_CONNECTIONS", 10)?,

            rate_protected_per_min: or_default("RATE_PROTECTED_PER_MIN", 1000)?,
            rate_write_per_min: or_default("RATE_WRITE_PER_MIN", 120)?,

            api_prefix: or_default("API_PREFIX", "/api".to_string())?,

            leave_policy,

            log_level: or_default("LOG_LEVEL", "debug".to_string())?,
            log_dir: or_default("LOG_DIR", "logs".to_string())?,
        })
    }
}
