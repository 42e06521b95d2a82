//! Process-level argument definitions for `vss-client`.

use clap::Parser;

/// Interactive client for a VSS server.
///
/// Configuration flags such as `--server-host` and `--config-path` are
/// handled by the configuration loader and removed before this parser runs.
#[derive(Parser, Debug, Default)]
#[command(
    name = "vss-client",
    version,
    after_help = "Configuration flags: --config-path, --server-host, --server-port, \
                  --connect-timeout-ms, --connect-poll-interval-ms, \
                  --connect-poll-attempts, --request-timeout-ms, --request-ids, \
                  --history-file, --history-length, --log-filter, --log-format"
)]
pub(crate) struct Cli {
    /// Connects over plain `ws://` instead of `wss://`.
    #[arg(short, long)]
    pub(crate) insecure: bool,
    /// Starts without connecting to the server.
    #[arg(long)]
    pub(crate) no_connect: bool,
    /// Prints replies without colour, even on a terminal.
    #[arg(long = "no-color")]
    pub(crate) no_color: bool,
    /// Runs a shell command line and exits. May be repeated.
    #[arg(short = 'c', long = "command", value_name = "LINE")]
    pub(crate) commands: Vec<String>,
}

impl Cli {
    /// Whether the shell should read commands from the terminal.
    pub(crate) const fn is_interactive(&self) -> bool {
        self.commands.is_empty()
    }
}
