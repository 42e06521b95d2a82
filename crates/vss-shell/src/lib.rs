//! Interactive shell for a VSS server.
//!
//! The runtime splits configuration flags from shell flags, loads the layered
//! configuration, installs telemetry and connects a [`vss_bridge::Session`].
//! It then runs the `--command` lines given on the command line, or reads
//! commands from the terminal with history and signal-path completion.
//! Configuration loading, the session's worker factory and the IO streams can
//! all be substituted in tests.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;

use clap::Parser;
use tracing::debug;
use vss_bridge::{Security, Session, WebSocketFactory, WorkerFactory};
use vss_config::Config;

mod cli;
mod command;
mod completion;
mod config;
mod errors;
mod interrupt;
mod output;
mod repl;
mod shell;
mod telemetry;

#[cfg(test)]
mod tests;

use cli::Cli;
use config::{ConfigLoader, OrthoConfigLoader, split_config_arguments};
use errors::ShellError;
use output::ReplyStyle;
use shell::Shell;

/// CLI flags recognised by the configuration loader.
///
/// MAINTENANCE: keep in sync with the fields of `vss_config::Config`. The
/// `insecure` setting is left out because `-i/--insecure` is a shell flag.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "--config-path",
    "--server-host",
    "--server-port",
    "--connect-timeout-ms",
    "--connect-poll-interval-ms",
    "--connect-poll-attempts",
    "--request-timeout-ms",
    "--request-ids",
    "--history-file",
    "--history-length",
    "--log-filter",
    "--log-format",
];

/// Bundles the IO streams used by the shell runtime.
pub(crate) struct IoStreams<'a, W: Write, E: Write> {
    pub(crate) stdout: &'a mut W,
    pub(crate) stderr: &'a mut E,
    pub(crate) style: ReplyStyle,
}

impl<'a, W: Write, E: Write> IoStreams<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self {
            stdout,
            stderr,
            style: ReplyStyle::Plain,
        }
    }

    pub(crate) const fn with_style(mut self, style: ReplyStyle) -> Self {
        self.style = style;
        self
    }
}

struct ShellRunner<'a, 'io, W: Write, E: Write, L: ConfigLoader> {
    io: &'a mut IoStreams<'io, W, E>,
    loader: &'a L,
}

impl<'a, 'io, W, E, L> ShellRunner<'a, 'io, W, E, L>
where
    W: Write,
    E: Write,
    L: ConfigLoader,
{
    const fn new(io: &'a mut IoStreams<'io, W, E>, loader: &'a L) -> Self {
        Self { io, loader }
    }

    fn run_with_session<I, F, S>(&mut self, args: I, build_session: S) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        F: WorkerFactory,
        S: FnOnce(&Config) -> Session<F>,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let result = Cli::try_parse_from(&split.shell_arguments)
            .map_err(ShellError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| {
                let span =
                    telemetry::initialise(&config)?.shell_span(&config, cli.is_interactive());
                let _entered = span.enter();
                if cli.no_color {
                    self.io.style = ReplyStyle::Plain;
                }
                let security = Security::from_insecure_flag(cli.insecure || config.insecure);
                let shell = Shell::new(build_session(&config), security);
                self.drive(&cli, &config, &shell)
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(ShellError::CliUsage(error)) if !error.use_stderr() => {
                if let Err(write_error) = write!(self.io.stdout, "{error}") {
                    debug!(target: shell::SHELL_TARGET, %write_error, "failed to print help");
                }
                ExitCode::SUCCESS
            }
            Err(error) => {
                if let Err(write_error) = writeln!(self.io.stderr, "{error}") {
                    debug!(target: shell::SHELL_TARGET, %write_error, "failed to report error");
                }
                ExitCode::FAILURE
            }
        }
    }

    fn drive<F: WorkerFactory>(
        &mut self,
        cli: &Cli,
        config: &Config,
        shell: &Shell<F>,
    ) -> Result<ExitCode, ShellError> {
        let _interrupts =
            interrupt::forward_interrupts(shell.canceller()).map_err(ShellError::Interrupts)?;

        if !cli.no_connect
            && let Err(error) = shell.connect_default(self.io)
        {
            writeln!(self.io.stderr, "{error}")?;
        }

        if cli.is_interactive() {
            repl::run(shell, config, self.io)?;
            return Ok(ExitCode::SUCCESS);
        }
        shell.run_batch(&cli.commands, self.io)
    }
}

/// Runs the shell using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    let mut io = IoStreams::new(stdout, stderr).with_style(ReplyStyle::detect());
    run_with_loader(
        args,
        &mut io,
        &OrthoConfigLoader,
        Session::<WebSocketFactory>::from_config,
    )
}

/// Runs the shell with a custom configuration loader and session builder.
#[must_use]
pub(crate) fn run_with_loader<I, W, E, L, F, S>(
    args: I,
    io: &mut IoStreams<'_, W, E>,
    loader: &L,
    build_session: S,
) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
    L: ConfigLoader,
    F: WorkerFactory,
    S: FnOnce(&Config) -> Session<F>,
{
    ShellRunner::new(io, loader).run_with_session(args, build_session)
}
