//! Configuration module for the staff vote backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, FixedOffset};

const DEFAULT_WINDOW_START: &str = "2026-01-26T10:00:00+07:00";
const DEFAULT_WINDOW_END: &str = "2026-01-30T12:00:00+07:00";

/// Invalid configuration value.
#[derive(Debug)]
pub struct ConfigError {
    pub key: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {}: {}", self.key, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// The period during which votes are accepted: `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VotingWindow {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl VotingWindow {
    pub fn new(
        start: DateTime<FixedOffset>,
        end: DateTime<FixedOffset>,
    ) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError {
                key: "VOTE_WINDOW_END",
                message: format!("window end {} must be after start {}", end, start),
            });
        }
        Ok(Self { start, end })
    }

    pub fn contains(&self, now: DateTime<FixedOffset>) -> bool {
        self.start <= now && now < self.end
    }

    /// Timezone used for vote timestamps (the offset of the window start).
    pub fn timezone(&self) -> FixedOffset {
        *self.start.offset()
    }
}

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Remote spreadsheet settings. Present only when `VOTE_SHEET_ID` is set.
#[derive(Debug, Clone)]
pub struct SheetConfig {
    pub sheet_id: String,
    pub worksheet: String,
    pub credentials_path: PathBuf,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path to the employee roster (CSV with header row)
    pub data_file: PathBuf,
    /// Path to the JSON vote ledger
    pub ledger_file: PathBuf,
    /// Directory holding the named lock files
    pub lock_dir: PathBuf,
    /// How long to wait for a file lock before failing
    pub lock_timeout: Duration,
    pub voting_window: VotingWindow,
    pub sheet: Option<SheetConfig>,
    /// Directory served for any non-API path
    pub static_dir: PathBuf,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let data_file = var_or("VOTE_DATA_FILE", "./data/data.csv").into();
        let ledger_file = var_or("VOTE_LEDGER_FILE", "./data/vote_history.json").into();
        let lock_dir = var_or("VOTE_LOCK_DIR", "./locks").into();

        let lock_timeout_secs: u64 = var_or("VOTE_LOCK_TIMEOUT_SECS", "10")
            .parse()
            .map_err(|e| ConfigError {
                key: "VOTE_LOCK_TIMEOUT_SECS",
                message: format!("{}", e),
            })?;

        let start = parse_timestamp(
            "VOTE_WINDOW_START",
            &var_or("VOTE_WINDOW_START", DEFAULT_WINDOW_START),
        )?;
        let end = parse_timestamp(
            "VOTE_WINDOW_END",
            &var_or("VOTE_WINDOW_END", DEFAULT_WINDOW_END),
        )?;
        let voting_window = VotingWindow::new(start, end)?;

        let sheet = env::var("VOTE_SHEET_ID")
            .ok()
            .filter(|id| !id.trim().is_empty())
            .map(|sheet_id| SheetConfig {
                sheet_id,
                worksheet: var_or("VOTE_SHEET_WORKSHEET", "Employees"),
                credentials_path: var_or("VOTE_CREDENTIALS_FILE", "./credentials.json").into(),
            });

        let static_dir = var_or("VOTE_STATIC_DIR", "./static").into();

        let bind_addr = var_or("VOTE_BIND_ADDR", "0.0.0.0:8000")
            .parse()
            .map_err(|e| ConfigError {
                key: "VOTE_BIND_ADDR",
                message: format!("{}", e),
            })?;

        let log_level = var_or("VOTE_LOG_LEVEL", "info");
        let log_format = match var_or("VOTE_LOG_FORMAT", "text").to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "text" => LogFormat::Text,
            other => {
                return Err(ConfigError {
                    key: "VOTE_LOG_FORMAT",
                    message: format!("expected 'text' or 'json', got '{}'", other),
                })
            }
        };

        Ok(Self {
            data_file,
            ledger_file,
            lock_dir,
            lock_timeout: Duration::from_secs(lock_timeout_secs),
            voting_window,
            sheet,
            static_dir,
            bind_addr,
            log_level,
            log_format,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_timestamp(key: &'static str, value: &str) -> Result<DateTime<FixedOffset>, ConfigError> {
    DateTime::parse_from_rfc3339(value).map_err(|e| ConfigError {
        key,
        message: format!("'{}' is not an RFC 3339 timestamp: {}", value, e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // Clear any existing env vars
        for key in [
            "VOTE_DATA_FILE",
            "VOTE_LEDGER_FILE",
            "VOTE_LOCK_DIR",
            "VOTE_LOCK_TIMEOUT_SECS",
            "VOTE_WINDOW_START",
            "VOTE_WINDOW_END",
            "VOTE_SHEET_ID",
            "VOTE_BIND_ADDR",
            "VOTE_LOG_LEVEL",
            "VOTE_LOG_FORMAT",
        ] {
            env::remove_var(key);
        }

        let config = Config::from_env().unwrap();

        assert_eq!(config.data_file, PathBuf::from("./data/data.csv"));
        assert_eq!(config.ledger_file, PathBuf::from("./data/vote_history.json"));
        assert_eq!(config.lock_timeout, Duration::from_secs(10));
        assert!(config.sheet.is_none());
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(
            config.voting_window.timezone(),
            FixedOffset::east_opt(7 * 3600).unwrap()
        );
    }

    #[test]
    fn test_window_is_half_open() {
        let start = DateTime::parse_from_rfc3339("2026-01-26T10:00:00+07:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2026-01-30T12:00:00+07:00").unwrap();
        let window = VotingWindow::new(start, end).unwrap();

        assert!(window.contains(start));
        assert!(!window.contains(end));
        assert!(!window.contains(start - chrono::Duration::seconds(1)));
        // Same instant expressed in UTC
        let utc_start = DateTime::parse_from_rfc3339("2026-01-26T03:00:00+00:00").unwrap();
        assert!(window.contains(utc_start));
    }

    #[test]
    fn test_window_rejects_inverted_range() {
        let start = DateTime::parse_from_rfc3339("2026-01-30T12:00:00+07:00").unwrap();
        let end = DateTime::parse_from_rfc3339("2026-01-26T10:00:00+07:00").unwrap();
        assert!(VotingWindow::new(start, end).is_err());
    }
}
