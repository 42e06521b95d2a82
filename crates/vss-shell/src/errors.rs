//! Error types for the shell runtime.

use std::io;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rustyline::error::ReadlineError;
use thiserror::Error;
use vss_bridge::BridgeError;

use crate::telemetry::TelemetryError;

/// Failures surfaced by the shell. Only configuration, telemetry and editor
/// failures end the process; the rest are printed and the shell carries on.
#[derive(Debug, Error)]
pub(crate) enum ShellError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error("{0}")]
    CommandUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to start the line editor: {0}")]
    Editor(#[from] ReadlineError),
    #[error("failed to watch for interrupts: {0}")]
    Interrupts(io::Error),
    #[error("failed to write output: {0}")]
    Output(#[from] io::Error),
    #[error("could not connect to {endpoint}: {cause}")]
    Connect { endpoint: String, cause: String },
    #[error("failed to read token file {path}: {source}")]
    TokenFile {
        path: Utf8PathBuf,
        source: io::Error,
    },
    #[error("token file {path} is empty")]
    EmptyTokenFile { path: Utf8PathBuf },
    #[error(transparent)]
    Request(#[from] BridgeError),
}
