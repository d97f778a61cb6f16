//! Diagnostic log output.
//!
//! Records go to stderr only. Stdout is the transmission record (banner and
//! echoed lines) and may be piped into another tool.

use std::io;
use tracing::Subscriber;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::prelude::*;

/// `[logging]` section of the settings file
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// error, warn, info, debug, trace or off
    pub level: String,
    /// pretty, compact or json
    pub format: String,
}

impl LogConfig {
    pub fn new() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum LogFormat {
    #[default]
    Pretty,
    Compact,
    Json,
}

impl LogFormat {
    /// Unknown names fall back to pretty output.
    fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        }
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level`, which wins over `info`.
pub fn init_logging(config: Option<&LogConfig>) {
    let format = config
        .map(|c| LogFormat::from_name(&c.format))
        .unwrap_or_default();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.map_or(LevelFilter::INFO, |c| level_filter(&c.level));
        EnvFilter::default().add_directive(level.into())
    });

    // a second call keeps the first subscriber
    let _ = tracing::subscriber::set_global_default(subscriber(filter, format, log_writer));
}

fn log_writer() -> io::Stderr {
    io::stderr()
}

fn level_filter(level: &str) -> LevelFilter {
    level.trim().parse().unwrap_or(LevelFilter::INFO)
}

fn subscriber<W>(
    filter: EnvFilter,
    format: LogFormat,
    writer: W,
) -> impl Subscriber + Send + Sync + 'static
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = tracing_subscriber::fmt::layer().with_writer(writer);
    let layer = match format {
        LogFormat::Pretty => layer.boxed(),
        LogFormat::Compact => layer.compact().boxed(),
        LogFormat::Json => layer.json().boxed(),
    };
    tracing_subscriber::registry().with(filter).with(layer)
}
