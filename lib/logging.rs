use crate::build_info;
use std::backtrace::Backtrace;
use std::error::Error as StdError;
use std::fmt::Write as _;
use std::process;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_log::LogTracer;
use tracing_subscriber::{layer::SubscriberExt, EnvFilter};

/// Output format for runtime logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Text,
}

impl LogFormat {
    /// Reads `LOG_FORMAT` (`json` or `text`). Anything else falls back to JSON.
    fn from_env() -> Self {
        std::env::var("LOG_FORMAT")
            .map(|raw| Self::parse(&raw))
            .unwrap_or(Self::Json)
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "text" => Self::Text,
            _ => Self::Json,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Text => "text",
        }
    }
}

/// Fields attached to the bootstrap event and the per-run span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingContext {
    pub service: String,
    pub command: String,
    pub environment: String,
    pub run_id: String,
    pub format: LogFormat,
}

/// Installs the global subscriber and emits one `logging_initialized` event.
///
/// `log` records from the HTTP client modules are bridged into `tracing`.
/// `RUST_LOG` takes precedence over `default_level`.
pub fn init_logging(service: &str, command: &str, default_level: &str) -> LoggingContext {
    let context = LoggingContext {
        service: service.to_string(),
        command: command.to_string(),
        environment: std::env::var("APP_ENV")
            .or_else(|_| std::env::var("ENVIRONMENT"))
            .unwrap_or_else(|_| "dev".to_string()),
        run_id: build_run_id(service),
        format: LogFormat::from_env(),
    };

    install_subscriber(context.format, default_level);

    tracing::info!(
        event = "logging_initialized",
        service = %context.service,
        environment = %context.environment,
        command = %context.command,
        run_id = %context.run_id,
        build_version = build_info::VERSION,
        build_commit = build_info::short_commit_hash(),
        log_format = context.format.as_str(),
        "initialized logging"
    );

    context
}

fn install_subscriber(format: LogFormat, default_level: &str) {
    let _ = LogTracer::init();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // `LogTracer` is already installed, so set the dispatcher directly instead of
    // `try_init`. A second call (e.g. from tests) keeps the first subscriber.
    let _ = match format {
        LogFormat::Json => tracing::subscriber::set_global_default(
            tracing_subscriber::registry().with(filter).with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_list(false)
                    .flatten_event(true),
            ),
        ),
        LogFormat::Text => tracing::subscriber::set_global_default(
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_target(true)),
        ),
    };
}

fn build_run_id(service: &str) -> String {
    let epoch_millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis())
        .unwrap_or_default();
    format!("{service}-{}-{epoch_millis}", process::id())
}

/// Renders an error, its whole `source()` chain and a backtrace captured here.
///
/// Used at the process boundary, where `%err` alone would hide the transport
/// cause behind a provider or search-service error.
pub fn format_error_report(err: &(dyn StdError + 'static)) -> String {
    let mut report = format!("error: {err}");

    let mut current_source = err.source();
    let mut depth = 1usize;
    while let Some(source) = current_source {
        let _ = write!(report, "\ncaused by ({depth}): {source}");
        current_source = source.source();
        depth += 1;
    }

    let _ = write!(report, "\nbacktrace:\n{}", Backtrace::force_capture());
    report
}
