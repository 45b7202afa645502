//! Client configuration read from the environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use oneword_connection::domain::state::ReconnectPolicy;

use crate::error::AppError;
use crate::telemetry::LogFormat;

const RECONNECT_INTERVAL_MS: &str = "ONEWORD_RECONNECT_INTERVAL_MS";
const RECONNECT_MAX_ATTEMPTS: &str = "ONEWORD_RECONNECT_MAX_ATTEMPTS";
const OUTCOME_BANNER_SECS: &str = "ONEWORD_OUTCOME_BANNER_SECS";
const DEDUP_WINDOW: &str = "ONEWORD_DEDUP_WINDOW";
const IDENTITY_PATH: &str = "ONEWORD_IDENTITY_PATH";
const LOG_FORMAT: &str = "ONEWORD_LOG_FORMAT";

/// Runtime settings for a [`crate::engine::SessionClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Push channel reconnection bounds.
    pub reconnect: ReconnectPolicy,
    /// How long a shared vote outcome stays up before the view refreshes.
    pub outcome_banner_duration: Duration,
    /// How many recent push event ids are remembered for de-duplication.
    pub dedup_window: usize,
    /// Where the participant identity is stored.
    pub identity_path: PathBuf,
    /// Log output format.
    pub log_format: LogFormat,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            reconnect: ReconnectPolicy::default(),
            outcome_banner_duration: Duration::from_secs(5),
            dedup_window: 64,
            identity_path: PathBuf::from("./oneword-identity.json"),
            log_format: LogFormat::default(),
        }
    }
}

impl ClientConfig {
    /// Reads the configuration from process environment variables, falling
    /// back to defaults for anything unset.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first invalid variable.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first invalid variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let defaults = Self::default();

        let polling_interval = parse::<u64>(&lookup, RECONNECT_INTERVAL_MS)?
            .map_or(defaults.reconnect.polling_interval, Duration::from_millis);
        let max_attempts = parse::<u32>(&lookup, RECONNECT_MAX_ATTEMPTS)?
            .unwrap_or(defaults.reconnect.max_attempts);
        if max_attempts == 0 {
            return Err(AppError::Config(format!(
                "{RECONNECT_MAX_ATTEMPTS} must be at least 1"
            )));
        }
        let outcome_banner_duration = parse::<u64>(&lookup, OUTCOME_BANNER_SECS)?
            .map_or(defaults.outcome_banner_duration, Duration::from_secs);
        let dedup_window = parse::<usize>(&lookup, DEDUP_WINDOW)?.unwrap_or(defaults.dedup_window);
        let identity_path = lookup(IDENTITY_PATH).map_or(defaults.identity_path, PathBuf::from);
        let log_format = match lookup(LOG_FORMAT) {
            Some(raw) => raw
                .parse()
                .map_err(|e| AppError::Config(format!("{LOG_FORMAT}: {e}")))?,
            None => defaults.log_format,
        };

        Ok(Self {
            reconnect: ReconnectPolicy {
                polling_interval,
                max_attempts,
            },
            outcome_banner_duration,
            dedup_window,
            identity_path,
            log_format,
        })
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<Option<T>, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}")))
        })
        .transpose()
}
