//! Shared configuration for the VSS client shell.
//!
//! Configuration is layered by `ortho_config`: built-in defaults, then a
//! configuration file (`--config-path` or a discovered `.vss.toml`), then
//! `VSS_*` environment variables, then command-line flags.

use std::time::Duration;

use camino::Utf8PathBuf;
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

mod defaults;
mod endpoint;
mod logging;
mod requests;

pub use defaults::{
    DEFAULT_CONNECT_POLL_ATTEMPTS, DEFAULT_CONNECT_POLL_INTERVAL_MS, DEFAULT_CONNECT_TIMEOUT_MS,
    DEFAULT_HISTORY_FILE, DEFAULT_HISTORY_LENGTH, DEFAULT_LOG_FILTER, DEFAULT_REQUEST_TIMEOUT_MS,
    DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, default_history_file, default_log_filter,
    default_log_filter_string, default_log_format, default_request_ids, default_server_endpoint,
    default_server_host,
};
pub use endpoint::{EndpointParseError, ServerEndpoint};
pub use logging::{LogFormat, LogFormatParseError};
pub use requests::{RequestIdMode, RequestIdModeParseError};

/// Resolved configuration shared by the bridge and the shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, OrthoConfig)]
#[ortho_config(prefix = "VSS")]
pub struct Config {
    /// Host name or IP literal of the VSS server.
    #[ortho_config(default = defaults::default_server_host())]
    pub server_host: String,
    /// WebSocket port of the VSS server.
    #[ortho_config(default = DEFAULT_SERVER_PORT)]
    pub server_port: u16,
    /// Connect over plain `ws://` instead of `wss://` by default.
    #[ortho_config(default = false)]
    pub insecure: bool,
    /// Budget for the TCP connect and WebSocket handshake.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_MS)]
    pub connect_timeout_ms: u64,
    /// Interval between liveness polls while connecting.
    #[ortho_config(default = DEFAULT_CONNECT_POLL_INTERVAL_MS)]
    pub connect_poll_interval_ms: u64,
    /// Number of liveness polls before a connection attempt fails.
    #[ortho_config(default = DEFAULT_CONNECT_POLL_ATTEMPTS)]
    pub connect_poll_attempts: u32,
    /// Upper bound on the wait for a reply; zero waits forever.
    #[ortho_config(default = DEFAULT_REQUEST_TIMEOUT_MS)]
    pub request_timeout_ms: u64,
    /// How request identifiers are assigned.
    #[ortho_config(default = defaults::default_request_ids())]
    pub request_ids: RequestIdMode,
    /// File holding the interactive shell history.
    #[ortho_config(default = defaults::default_history_file())]
    pub history_file: Utf8PathBuf,
    /// Number of history entries kept between sessions.
    #[ortho_config(default = DEFAULT_HISTORY_LENGTH)]
    pub history_length: usize,
    /// `tracing` filter expression.
    #[ortho_config(default = defaults::default_log_filter_string())]
    pub log_filter: String,
    /// Log output format.
    #[ortho_config(default = defaults::default_log_format())]
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_host: default_server_host(),
            server_port: DEFAULT_SERVER_PORT,
            insecure: false,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT_MS,
            connect_poll_interval_ms: DEFAULT_CONNECT_POLL_INTERVAL_MS,
            connect_poll_attempts: DEFAULT_CONNECT_POLL_ATTEMPTS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            request_ids: default_request_ids(),
            history_file: default_history_file(),
            history_length: DEFAULT_HISTORY_LENGTH,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
        }
    }
}

impl Config {
    /// Endpoint contacted by the first `connect`.
    #[must_use]
    pub fn server_endpoint(&self) -> ServerEndpoint {
        ServerEndpoint::new(self.server_host.clone(), self.server_port)
    }

    /// Budget for establishing the transport.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Interval between liveness polls.
    #[must_use]
    pub const fn connect_poll_interval(&self) -> Duration {
        Duration::from_millis(self.connect_poll_interval_ms)
    }

    /// Number of liveness polls.
    #[must_use]
    pub const fn connect_poll_attempts(&self) -> u32 {
        self.connect_poll_attempts
    }

    /// Reply deadline, or `None` when waits are unbounded.
    #[must_use]
    pub const fn request_timeout(&self) -> Option<Duration> {
        if self.request_timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.request_timeout_ms))
        }
    }

    /// Request identifier mode.
    #[must_use]
    pub const fn request_ids(&self) -> RequestIdMode {
        self.request_ids
    }

    /// History file path.
    #[must_use]
    pub fn history_file(&self) -> &camino::Utf8Path {
        self.history_file.as_path()
    }

    /// Maximum number of history entries.
    #[must_use]
    pub const fn history_length(&self) -> usize {
        self.history_length
    }

    /// `tracing` filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        &self.log_filter
    }

    /// Log output format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }
}
