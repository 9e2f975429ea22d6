//! Logging setup.
//!
//! Logs go to stderr so stdout stays clean for command output. `RUST_LOG`
//! controls the filter (default `info`); `CONVOBOT_LOG_FORMAT=json` switches
//! to one JSON object per line.

use std::io::Write;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_FORMAT_ENV: &str = "CONVOBOT_LOG_FORMAT";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Pretty,
        }
    }

    fn from_env() -> Self {
        Self::parse(std::env::var(LOG_FORMAT_ENV).ok().as_deref())
    }
}

/// Keeps logging alive for the life of `main`; flushes stderr when dropped.
#[must_use = "logs may be lost if the guard is dropped early"]
pub struct TelemetryGuard {
    installed: bool,
}

impl TelemetryGuard {
    /// False when another subscriber was already installed.
    pub fn installed(&self) -> bool {
        self.installed
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if self.installed {
            tracing::debug!("telemetry shutting down");
        }
        let _ = std::io::stderr().flush();
    }
}

/// Installs the global subscriber and returns its guard. Later calls leave
/// the first subscriber in place.
pub fn init() -> TelemetryGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    let result = match LogFormat::from_env() {
        LogFormat::Json => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    };

    let installed = match result {
        Ok(()) => true,
        Err(e) => {
            eprintln!("warning: logging not initialized: {e}");
            false
        }
    };
    TelemetryGuard { installed }
}
