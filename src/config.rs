//! Runtime configuration from the environment (and `.env`)

use crate::ingest::DEFAULT_EXPECTED_TEAMS;
use crate::scrapers::DEFAULT_SOURCE_URL;
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

const DEFAULT_DB_FILE: &str = "playoff_odds.db";

#[derive(Debug, Clone)]
pub struct Config {
    pub database_path: String,
    pub bind_addr: String,
    pub port: u16,
    pub source_url: String,
    pub scrape_interval: Duration,
    pub scrape_on_startup: bool,
    pub http_timeout: Duration,
    pub expected_teams: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: default_data_path(DEFAULT_DB_FILE),
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            scrape_interval: Duration::from_secs(2 * 60 * 60),
            scrape_on_startup: true,
            http_timeout: Duration::from_secs(30),
            expected_teams: DEFAULT_EXPECTED_TEAMS,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        load_env();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key lookup; unset or invalid values keep defaults
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_path = resolve_data_path(
            get("DATABASE_PATH").or_else(|| get("DB_PATH")),
            DEFAULT_DB_FILE,
        );

        let interval_secs: u64 = parse_or(
            "SCRAPE_INTERVAL_SECS",
            get("SCRAPE_INTERVAL_SECS"),
            defaults.scrape_interval.as_secs(),
        );
        let timeout_secs: u64 = parse_or(
            "HTTP_TIMEOUT_SECS",
            get("HTTP_TIMEOUT_SECS"),
            defaults.http_timeout.as_secs(),
        );

        Self {
            database_path,
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_or("PORT", get("PORT"), defaults.port),
            source_url: get("SOURCE_URL").unwrap_or(defaults.source_url),
            scrape_interval: Duration::from_secs(interval_secs.max(1)),
            scrape_on_startup: get("SCRAPE_ON_STARTUP")
                .map(|v| matches!(v.as_str(), "1" | "true" | "TRUE" | "on" | "ON"))
                .unwrap_or(defaults.scrape_on_startup),
            http_timeout: Duration::from_secs(timeout_secs.max(1)),
            expected_teams: parse_or(
                "EXPECTED_TEAM_COUNT",
                get("EXPECTED_TEAM_COUNT"),
                defaults.expected_teams,
            ),
        }
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(v) => v.trim().parse().unwrap_or_else(|_| {
            warn!("Invalid {}={:?}, using default", key, v);
            default
        }),
    }
}

fn default_data_path(filename: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(filename)
        .to_string_lossy()
        .to_string()
}

/// Relative paths are taken relative to the crate directory, not the
/// caller's cwd, so every binary opens the same database.
pub fn resolve_data_path(env_value: Option<String>, default_filename: &str) -> String {
    let Some(raw) = env_value.filter(|v| !v.trim().is_empty()) else {
        return default_data_path(default_filename);
    };

    if raw == ":memory:" {
        return raw;
    }

    let p = PathBuf::from(raw);
    if p.is_absolute() {
        return p.to_string_lossy().to_string();
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join(p)
        .to_string_lossy()
        .to_string()
}

pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_env = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
    if manifest_env.exists() {
        let _ = dotenv::from_path(&manifest_env);
    }
}
