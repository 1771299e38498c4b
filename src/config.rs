use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::PgConnectOptions;

/// Process-wide settings, read once at start-up.
#[derive(Clone)]
pub struct Config {
    pub database: PgConnectOptions,
    pub site_name: String,
    pub site_url: String,
    pub default_lang: String,
    pub bind_address: String,
    pub workers: usize,
    pub cookie_secure: bool,
    pub session_idle: Duration,
    pub run_migrations: bool,
}

#[derive(Debug)]
pub enum ConfigError {
    Invalid { key: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Invalid { key, value } => {
                write!(f, "Invalid value for {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let database = match env::var("DATABASE_URL") {
            Ok(url) if !url.is_empty() => url
                .parse::<PgConnectOptions>()
                .map_err(|_| ConfigError::Invalid { key: "DATABASE_URL", value: "<redacted>".to_string() })?,
            _ => connect_options_from_parts(
                &var_or("DB_HOST", "localhost"),
                parse_or("DB_PORT", 5432u16)?,
                &var_or("DB_NAME", "fittracker"),
                &var_or("DB_USER", "postgres"),
                &var_or("DB_PASS", ""),
            ),
        };

        Ok(Config {
            database,
            site_name: var_or("SITE_NAME", "FitTracker"),
            site_url: var_or("SITE_URL", ""),
            default_lang: var_or("DEFAULT_LANG", "en"),
            bind_address: var_or("BIND_ADDRESS", "127.0.0.1:8080"),
            workers: parse_or("WORKERS", num_cpus::get())?,
            cookie_secure: parse_bool_or("COOKIE_SECURE", true)?,
            session_idle: Duration::from_secs(60 * parse_or("SESSION_IDLE_MINUTES", 120u64)?),
            run_migrations: parse_bool_or("RUN_MIGRATIONS", true)?,
        })
    }

    /// Builds an absolute location for `path` under `SITE_URL`.
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.site_url.trim_end_matches('/'), path)
    }
}

/// Connection settings from the separate `DB_*` variables. The values are
/// passed through as-is, so passwords may contain URL metacharacters.
fn connect_options_from_parts(host: &str, port: u16, name: &str, user: &str, pass: &str) -> PgConnectOptions {
    let options = PgConnectOptions::new()
        .host(host)
        .port(port)
        .database(name)
        .username(user);

    if pass.is_empty() {
        options
    } else {
        options.password(pass)
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_or<T: FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        Err(_) => Ok(default),
    }
}

fn parse_bool_or(key: &'static str, default: bool) -> Result<bool, ConfigError> {
    match env::var(key) {
        Ok(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        database: connect_options_from_parts("localhost", 5432, "fittracker_test", "postgres", ""),
        site_name: "FitTracker".to_string(),
        site_url: String::new(),
        default_lang: "en".to_string(),
        bind_address: "127.0.0.1:0".to_string(),
        workers: 1,
        cookie_secure: false,
        session_idle: Duration::from_secs(600),
        run_migrations: false,
    }
}
