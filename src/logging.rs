//! Structured logging for Booster
//!
//! Logs go to stderr; stdout is reserved for command output (edges, paths,
//! makefile text) so it can be piped.
//!
//! # Log Format Conventions
//!
//! - `service`: the component ("booster.scanner", "booster.gate", ...)
//! - `operation`: what it was doing ("scan", "mark", "heal", ...)
//! - `status`: the result ("success", "fresh", "failed", ...)
//! - `path`: project-relative file the event is about
//!
//! ```rust,ignore
//! info!(
//!     service = services::GATE,
//!     operation = "scan",
//!     status = "success",
//!     path = %source.display(),
//!     "check finished"
//! );
//! ```

use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

/// Compact formatter tagging every line with "(booster)"
struct BoosterFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for BoosterFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(writer, "{} ", chrono::Local::now().format("%H:%M:%S%.3f"))?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m",
                tracing::Level::WARN => "\x1b[33m",
                tracing::Level::INFO => "\x1b[32m",
                tracing::Level::DEBUG => "\x1b[34m",
                tracing::Level::TRACE => "\x1b[35m",
            };
            write!(writer, "{}{:5}(booster)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(booster): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Colored, for terminals
    Pretty,
    /// Plain, for CI and make logs
    Compact,
    /// One JSON object per line
    Json,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }

    /// Parse from environment variable (BOOSTER_LOG_FORMAT)
    pub fn from_env() -> Self {
        std::env::var("BOOSTER_LOG_FORMAT")
            .ok()
            .and_then(|value| Self::parse(&value))
            .unwrap_or_else(|| {
                if std::env::var("CI").is_ok() || !io::IsTerminal::is_terminal(&io::stderr()) {
                    Self::Compact
                } else {
                    Self::Pretty
                }
            })
    }
}

/// Initialize the global tracing subscriber
///
/// `RUST_LOG` wins over `level`; without either the default is `warn`, so
/// make output stays readable. `BOOSTER_LOG_FORMAT` picks the format.
pub fn init(level: Option<&str>) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.unwrap_or("warn")))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = match LogFormat::from_env() {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .event_format(BoosterFormatter { with_ansi: true })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .event_format(BoosterFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
    };

    // A subscriber may already be installed (tests)
    let _ = result;
}

/// Service names for consistent logging
pub mod services {
    pub const SCANNER: &str = "booster.scanner";
    pub const GRAPH: &str = "booster.graph";
    pub const GATE: &str = "booster.gate";
    pub const STORE: &str = "booster.store";
    pub const GROUPED: &str = "booster.grouped";
}
