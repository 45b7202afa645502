//! Tracing subscriber setup.

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Log line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Human-readable multi-line output.
    Pretty,
}

impl FromStr for LogFormat {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            other => Err(AppError::Config(format!(
                "unknown log format {other:?}; expected \"json\" or \"pretty\""
            ))),
        }
    }
}

/// Installs the global tracing subscriber. The filter comes from
/// `RUST_LOG` and defaults to `info`.
///
/// # Errors
///
/// Returns `AppError::Config` if a global subscriber is already installed.
pub fn init_tracing(format: LogFormat) -> Result<(), AppError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
    };
    installed.map_err(|e| AppError::Config(format!("tracing already initialised: {e}")))
}
