//! Tracing subscriber setup

use clap::ValueEnum;
use std::str::FromStr;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines for terminals
    #[default]
    Human,
    /// One JSON object per event, for log aggregation
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    /// Unknown values fall back to human output
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "json" => Ok(LogFormat::Json),
            _ => Ok(LogFormat::Human),
        }
    }
}

impl LogFormat {
    /// Explicit choice, else `LOG_FORMAT`, else human
    pub fn resolve(explicit: Option<LogFormat>) -> LogFormat {
        explicit
            .or_else(|| std::env::var("LOG_FORMAT").ok()?.parse().ok())
            .unwrap_or_default()
    }
}

/// Default filter when `RUST_LOG` is unset
fn default_directives(debug: bool) -> String {
    let level = if debug { "debug" } else { "info" };
    let http = if debug { "debug" } else { "warn" };
    format!(
        "hrp={level},hrp_repo={level},hrp_core={level},tower_http={http},axum={http}"
    )
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the default filter, which is `info` for hrp's own
/// crates and `debug` with `--debug`.
pub fn init(format: LogFormat, debug: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(debug)));

    match format {
        LogFormat::Human => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_file(debug)
                        .with_line_number(debug)
                        .with_level(true),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_span_list(true)
                        .with_target(true)
                        .with_level(true),
                )
                .init();
        }
    }

    tracing::debug!(format = ?format, "tracing initialized");
}
