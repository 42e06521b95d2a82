//! Parsing of the commands typed at the shell prompt.

use clap::{CommandFactory, Parser, Subcommand};

/// Commands whose first argument is a signal path.
pub(crate) const PATH_COMMANDS: &[&str] = &["getValue", "setValue", "getMetaData"];

/// Command whose argument is a token or a token file.
pub(crate) const TOKEN_COMMAND: &str = "authorize";

/// One line typed at the prompt. The first word names the command.
#[derive(Parser, Debug)]
#[command(multicall = true)]
struct ShellLine {
    #[command(subcommand)]
    command: ShellCommand,
}

/// Commands understood by the shell.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub(crate) enum ShellCommand {
    /// Connects to the VSS server, replacing any live connection.
    #[command(name = "connect")]
    Connect {
        /// Connect in insecure mode.
        #[arg(short, long)]
        insecure: bool,
    },
    /// Disconnects from the VSS server.
    #[command(name = "disconnect")]
    Disconnect,
    /// Authorizes the client to interact with the server.
    #[command(name = "authorize")]
    Authorize {
        /// JWT, or the file storing the token.
        #[arg(value_name = "Token")]
        token: String,
    },
    /// Sets the address of the VSS server used by the next connect.
    #[command(name = "setServerAddress")]
    SetServerAddress {
        /// VSS server IP address or host name.
        #[arg(value_name = "IP")]
        host: String,
        /// VSS server WebSocket port.
        #[arg(value_name = "Port")]
        port: u16,
    },
    /// Prints the address of the VSS server.
    #[command(name = "getServerAddress")]
    GetServerAddress,
    /// Gets the value of a parameter.
    #[command(name = "getValue")]
    GetValue {
        /// Parameter whose value is to be read.
        #[arg(value_name = "Parameter")]
        path: String,
    },
    /// Sets the value of a parameter.
    #[command(name = "setValue")]
    SetValue {
        /// Parameter to be set.
        #[arg(value_name = "Parameter")]
        path: String,
        /// Value to be set; remaining words are joined by single spaces.
        #[arg(
            value_name = "Value",
            required = true,
            num_args = 1..,
            trailing_var_arg = true,
            allow_hyphen_values = true
        )]
        value: Vec<String>,
    },
    /// Gets the metadata of a parameter.
    #[command(name = "getMetaData")]
    GetMetaData {
        /// Parameter whose metadata is to be read.
        #[arg(value_name = "Parameter")]
        path: String,
    },
    /// Disconnects and leaves the shell.
    #[command(name = "quit", visible_alias = "exit")]
    Quit,
}

impl ShellCommand {
    /// Parses one prompt line. Blank lines yield `None`.
    pub(crate) fn parse_line(line: &str) -> Result<Option<Self>, clap::Error> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Ok(None);
        }
        ShellLine::try_parse_from(words).map(|parsed| Some(parsed.command))
    }
}

/// Names of every shell command, in declaration order.
pub(crate) fn command_names() -> Vec<String> {
    ShellLine::command()
        .get_subcommands()
        .flat_map(|command| {
            std::iter::once(command.get_name().to_owned())
                .chain(command.get_visible_aliases().map(str::to_owned))
        })
        .collect()
}
