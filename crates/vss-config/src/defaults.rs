use camino::Utf8PathBuf;

use crate::endpoint::ServerEndpoint;
use crate::logging::LogFormat;
use crate::requests::RequestIdMode;

/// Host contacted when no server address has been configured.
pub const DEFAULT_SERVER_HOST: &str = "localhost";

/// WebSocket port of a stock kuksa.val server.
pub const DEFAULT_SERVER_PORT: u16 = 8090;

/// Budget for the TCP connect plus WebSocket handshake, in milliseconds.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 2_000;

/// Interval between liveness polls while connecting, in milliseconds.
pub const DEFAULT_CONNECT_POLL_INTERVAL_MS: u64 = 100;

/// Number of liveness polls before a connection attempt is abandoned.
pub const DEFAULT_CONNECT_POLL_ATTEMPTS: u32 = 10;

/// Upper bound on the wait for a reply, in milliseconds. Zero disables it.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

/// History file used by the interactive shell, relative to the working directory.
pub const DEFAULT_HISTORY_FILE: &str = ".vssclient_history";

/// Number of history entries kept between sessions.
pub const DEFAULT_HISTORY_LENGTH: usize = 100;

/// Default log filter expression used by the binaries.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

/// Default request identifier mode.
pub fn default_request_ids() -> RequestIdMode {
    RequestIdMode::Sequential
}

/// Owned default host name.
pub fn default_server_host() -> String {
    DEFAULT_SERVER_HOST.to_owned()
}

/// Endpoint assembled from the default host and port.
pub fn default_server_endpoint() -> ServerEndpoint {
    ServerEndpoint::new(DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT)
}

/// Default location of the shell history file.
pub fn default_history_file() -> Utf8PathBuf {
    Utf8PathBuf::from(DEFAULT_HISTORY_FILE)
}
