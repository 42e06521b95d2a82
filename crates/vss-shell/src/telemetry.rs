//! Structured telemetry initialisation for the shell.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use tracing::{Span, Subscriber, info, info_span, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use vss_config::{Config, LogFormat};

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Target for telemetry lifecycle events.
pub(crate) const TELEMETRY_TARGET: &str = "vss_shell::telemetry";

/// Span field updated whenever the server address changes.
pub(crate) const ENDPOINT_FIELD: &str = "endpoint";

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct TelemetryHandle;

impl TelemetryHandle {
    /// Opens the span covering one shell run.
    ///
    /// Every event logged while it is entered carries the server endpoint,
    /// the request identifier mode and whether the shell is interactive.
    pub(crate) fn shell_span(self, config: &Config, interactive: bool) -> Span {
        let mode = if interactive { "interactive" } else { "batch" };
        let span = info_span!(
            target: TELEMETRY_TARGET,
            "vss_shell",
            endpoint = %config.server_endpoint(),
            request_ids = %config.request_ids(),
            mode,
        );
        span.in_scope(|| {
            info!(
                target: TELEMETRY_TARGET,
                log_format = ?config.log_format(),
                "shell started"
            );
        });
        span
    }
}

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub(crate) enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs the global tracing subscriber on first use.
///
/// Later calls return a fresh [`TelemetryHandle`] without touching the
/// global state again, so the runner may be invoked repeatedly in one
/// process.
pub(crate) fn initialise(config: &Config) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(config))
        .map(|()| TelemetryHandle)
}

fn install_subscriber(config: &Config) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_new(config.log_filter())
        .map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |filter: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(filter)
            .with_target(true)
            .with_level(true)
            .with_thread_ids(false)
            .with_thread_names(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match config.log_format() {
        LogFormat::Json => Box::new(builder(filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}
