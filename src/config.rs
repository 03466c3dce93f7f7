//! Runtime configuration from environment variables.
//!
//! | Variable | Default |
//! |---|---|
//! | `DATABASE_URL` | `sqlite://patients.db` |
//! | `TELEGRAM_TOKEN` | unset (bot disabled) |
//! | `NUTRICARE_LISTEN_ADDR` | `0.0.0.0:8000` |
//! | `NUTRICARE_BODY_LIMIT_KB` | `64` |
//! | `NUTRICARE_REQUEST_TIMEOUT_SECS` | `10` |
//! | `NUTRICARE_POLL_TIMEOUT_SECS` | `30` |
//! | `NUTRICARE_LOG_MODE` | `stdout` (or `file`) |
//! | `NUTRICARE_LOG_FILE` | `nutricare.log` |

use std::path::PathBuf;
use std::time::Duration;

use crate::adapters::telegram::BotToken;

const DEFAULT_DATABASE_URL: &str = "sqlite://patients.db";
const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";
const DEFAULT_BODY_LIMIT_KB: usize = 64;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
const DEFAULT_POLL_TIMEOUT_SECS: u64 = 30;
const DEFAULT_LOG_FILE: &str = "nutricare.log";

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Unsupported database URL {0:?}: only sqlite:// URLs are supported")]
    UnsupportedDatabase(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

/// Where the SQLite database lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    File(PathBuf),
    InMemory,
}

/// Parse a SQLAlchemy-style SQLite URL.
///
/// `sqlite://patients.db` and `sqlite:///patients.db` are relative,
/// `sqlite:////var/lib/patients.db` is absolute, and `sqlite://`,
/// `sqlite://:memory:` are in-memory.
///
/// # Errors
/// Returns [`ConfigError::UnsupportedDatabase`] for non-SQLite URLs.
pub fn parse_database_url(url: &str) -> Result<DatabaseLocation, ConfigError> {
    let rest = url
        .trim()
        .strip_prefix("sqlite://")
        .ok_or_else(|| ConfigError::UnsupportedDatabase(redact_url(url)))?;

    // One leading slash is the URL separator; a second one makes the path absolute.
    let path = rest.strip_prefix('/').unwrap_or(rest);
    if path.is_empty() || path == ":memory:" {
        return Ok(DatabaseLocation::InMemory);
    }
    Ok(DatabaseLocation::File(PathBuf::from(path)))
}

/// Drop userinfo so error messages never carry credentials.
fn redact_url(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}://[REDACTED]{}", &url[..scheme_end], &url[at..])
        }
        _ => url.to_string(),
    }
}

/// Where log output goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogMode {
    Stdout,
    File(PathBuf),
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseLocation,
    pub telegram_token: Option<BotToken>,
    pub listen_addr: String,
    pub body_limit_kb: usize,
    pub request_timeout: Duration,
    pub poll_timeout: Duration,
    pub log_mode: LogMode,
}

impl AppConfig {
    /// Read configuration from the process environment.
    ///
    /// # Errors
    /// Returns error if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary lookup (tests pass a map).
    ///
    /// # Errors
    /// Returns error if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = parse_database_url(
            &get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        )?;

        let telegram_token = get("TELEGRAM_TOKEN").map(|t| BotToken::new(t.trim()));

        let listen_addr = get("NUTRICARE_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        if listen_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                key: "NUTRICARE_LISTEN_ADDR",
                value: listen_addr,
            });
        }

        let body_limit_kb = parse_number(&get, "NUTRICARE_BODY_LIMIT_KB", DEFAULT_BODY_LIMIT_KB)?;
        let request_timeout = Duration::from_secs(parse_number(
            &get,
            "NUTRICARE_REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        )?);
        let poll_timeout = Duration::from_secs(parse_number(
            &get,
            "NUTRICARE_POLL_TIMEOUT_SECS",
            DEFAULT_POLL_TIMEOUT_SECS,
        )?);

        let log_mode = match get("NUTRICARE_LOG_MODE").as_deref() {
            None | Some("stdout") => LogMode::Stdout,
            Some("file") => LogMode::File(PathBuf::from(
                get("NUTRICARE_LOG_FILE").unwrap_or_else(|| DEFAULT_LOG_FILE.to_string()),
            )),
            Some(other) => {
                return Err(ConfigError::InvalidValue {
                    key: "NUTRICARE_LOG_MODE",
                    value: other.to_string(),
                })
            }
        };

        Ok(Self {
            database,
            telegram_token,
            listen_addr,
            body_limit_kb,
            request_timeout,
            poll_timeout,
            log_mode,
        })
    }
}

fn parse_number<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + Default,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) if v > T::default() => Ok(v),
            _ => Err(ConfigError::InvalidValue { key, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).expect("Should load");
        assert_eq!(config.database, DatabaseLocation::File(PathBuf::from("patients.db")));
        assert!(config.telegram_token.is_none());
        assert_eq!(config.listen_addr, "0.0.0.0:8000");
        assert_eq!(config.body_limit_kb, 64);
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.log_mode, LogMode::Stdout);
    }

    #[test]
    fn test_database_urls() {
        assert_eq!(
            parse_database_url("sqlite:///patients.db").expect("Should parse"),
            DatabaseLocation::File(PathBuf::from("patients.db"))
        );
        assert_eq!(
            parse_database_url("sqlite:////var/lib/nutricare/patients.db").expect("Should parse"),
            DatabaseLocation::File(PathBuf::from("/var/lib/nutricare/patients.db"))
        );
        assert_eq!(
            parse_database_url("sqlite://:memory:").expect("Should parse"),
            DatabaseLocation::InMemory
        );
        assert_eq!(parse_database_url("sqlite://").expect("Should parse"), DatabaseLocation::InMemory);
    }

    #[test]
    fn test_unsupported_database_is_redacted() {
        let err = parse_database_url("postgresql://nutri:hunter2@db/patients").expect_err("Should fail");
        let msg = err.to_string();
        assert!(!msg.contains("hunter2"));
        assert!(msg.contains("postgresql://[REDACTED]@db/patients"));
    }

    #[test]
    fn test_invalid_values() {
        assert!(config_from(&[("NUTRICARE_BODY_LIMIT_KB", "0")]).is_err());
        assert!(config_from(&[("NUTRICARE_REQUEST_TIMEOUT_SECS", "soon")]).is_err());
        assert!(config_from(&[("NUTRICARE_LISTEN_ADDR", "localhost")]).is_err());
        assert!(config_from(&[("NUTRICARE_LOG_MODE", "syslog")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DATABASE_URL", "sqlite://:memory:"),
            ("TELEGRAM_TOKEN", " 123:abc "),
            ("NUTRICARE_LOG_MODE", "file"),
            ("NUTRICARE_LOG_FILE", "/tmp/n.log"),
        ])
        .expect("Should load");
        assert_eq!(config.database, DatabaseLocation::InMemory);
        assert!(config.telegram_token.is_some());
        assert_eq!(config.log_mode, LogMode::File(PathBuf::from("/tmp/n.log")));
    }
}
