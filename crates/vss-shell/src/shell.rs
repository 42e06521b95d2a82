//! Command execution against the session.

use std::cell::RefCell;
use std::fs;
use std::io::Write;
use std::process::ExitCode;
use std::rc::Rc;

use camino::Utf8Path;
use tracing::{Span, debug, field};
use vss_bridge::{Canceller, Response, Security, Session, WebSocketFactory, WorkerFactory};

use crate::IoStreams;
use crate::command::ShellCommand;
use crate::errors::ShellError;
use crate::output::{self, CONNECTED, DISCONNECTED, NOT_CONNECTED};
use crate::telemetry::ENDPOINT_FIELD;

/// Target for shell command events.
pub(crate) const SHELL_TARGET: &str = "vss_shell::command";

/// Whether the shell keeps reading after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

/// Executes shell commands against one session.
///
/// The session sits behind `Rc<RefCell<_>>` so the line editor's completer
/// can fetch the metadata tree while no command is running.
#[derive(Debug)]
pub(crate) struct Shell<F: WorkerFactory = WebSocketFactory> {
    session: Rc<RefCell<Session<F>>>,
    default_security: Security,
}

impl<F: WorkerFactory> Shell<F> {
    pub(crate) fn new(session: Session<F>, default_security: Security) -> Self {
        Self {
            session: Rc::new(RefCell::new(session)),
            default_security,
        }
    }

    /// Shared handle to the session for the completer.
    pub(crate) fn session(&self) -> Rc<RefCell<Session<F>>> {
        Rc::clone(&self.session)
    }

    pub(crate) fn canceller(&self) -> Canceller {
        self.session.borrow().canceller()
    }

    /// Connects with the configured security mode, as done on startup.
    pub(crate) fn connect_default<W: Write, E: Write>(
        &self,
        io: &mut IoStreams<'_, W, E>,
    ) -> Result<Flow, ShellError> {
        self.connect(self.default_security, io)
    }

    fn connect<W: Write, E: Write>(
        &self,
        security: Security,
        io: &mut IoStreams<'_, W, E>,
    ) -> Result<Flow, ShellError> {
        let mut session = self.session.borrow_mut();
        if session.connect(security).is_connected() {
            writeln!(io.stdout, "{CONNECTED}")?;
            return Ok(Flow::Continue);
        }
        writeln!(io.stdout, "{NOT_CONNECTED}")?;
        let cause = session
            .last_connect_error()
            .map_or_else(|| "no cause recorded".to_owned(), ToString::to_string);
        Err(ShellError::Connect {
            endpoint: session.endpoint().to_string(),
            cause,
        })
    }

    /// Parses and executes one prompt line.
    ///
    /// Help requested with `help` or `--help` is printed to stdout and is not
    /// a failure.
    pub(crate) fn execute_line<W: Write, E: Write>(
        &self,
        line: &str,
        io: &mut IoStreams<'_, W, E>,
    ) -> Result<Flow, ShellError> {
        match ShellCommand::parse_line(line) {
            Ok(Some(command)) => self.execute(command, io),
            Ok(None) => Ok(Flow::Continue),
            Err(error) if !error.use_stderr() => {
                write!(io.stdout, "{error}")?;
                Ok(Flow::Continue)
            }
            Err(error) => Err(ShellError::CommandUsage(error)),
        }
    }

    pub(crate) fn execute<W: Write, E: Write>(
        &self,
        command: ShellCommand,
        io: &mut IoStreams<'_, W, E>,
    ) -> Result<Flow, ShellError> {
        debug!(target: SHELL_TARGET, ?command, "executing");
        match command {
            ShellCommand::Connect { insecure } => {
                let security = if insecure {
                    Security::Insecure
                } else {
                    self.default_security
                };
                return self.connect(security, io);
            }
            ShellCommand::Disconnect => {
                self.session.borrow_mut().disconnect();
                writeln!(io.stdout, "{DISCONNECTED}")?;
            }
            ShellCommand::Authorize { token } => {
                let resolved = read_token(&token)?;
                let reply = self.session.borrow_mut().authorize(&resolved);
                print_reply(reply, io)?;
            }
            ShellCommand::SetServerAddress { host, port } => {
                writeln!(io.stdout, "Setting Server Address to {host}:{port}")?;
                let mut session = self.session.borrow_mut();
                session.set_endpoint(host, port);
                Span::current().record(ENDPOINT_FIELD, field::display(session.endpoint()));
            }
            ShellCommand::GetServerAddress => {
                writeln!(io.stdout, "{}", self.session.borrow().endpoint())?;
            }
            ShellCommand::GetValue { path } => {
                let reply = self.session.borrow_mut().get(&path);
                print_reply(reply, io)?;
            }
            ShellCommand::SetValue { path, value } => {
                let reply = self.session.borrow_mut().set(&path, &value.join(" "));
                print_reply(reply, io)?;
            }
            ShellCommand::GetMetaData { path } => {
                let reply = self.session.borrow_mut().get_metadata(&path);
                print_reply(reply, io)?;
            }
            ShellCommand::Quit => {
                self.shutdown();
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    /// Runs `lines` in order and stops at `quit`. Every failure is printed;
    /// the exit code reports whether any line failed.
    pub(crate) fn run_batch<W: Write, E: Write>(
        &self,
        lines: &[String],
        io: &mut IoStreams<'_, W, E>,
    ) -> Result<ExitCode, ShellError> {
        let mut failed = false;
        for line in lines {
            match self.execute_line(line, io) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => break,
                Err(error) => {
                    failed = true;
                    writeln!(io.stderr, "{error}")?;
                }
            }
        }
        self.shutdown();
        Ok(if failed {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        })
    }

    /// Stops the transport worker.
    pub(crate) fn shutdown(&self) {
        self.session.borrow_mut().disconnect();
    }
}

fn print_reply<W: Write, E: Write>(
    reply: Result<Response, vss_bridge::BridgeError>,
    io: &mut IoStreams<'_, W, E>,
) -> Result<(), ShellError> {
    let response = reply?;
    output::write_reply(io.stdout, &response, io.style)?;
    Ok(())
}

/// Returns the token itself, or the first line of the file it names.
pub(crate) fn read_token(argument: &str) -> Result<String, ShellError> {
    let path = Utf8Path::new(argument);
    if !path.is_file() {
        return Ok(argument.to_owned());
    }
    let contents = fs::read_to_string(path).map_err(|source| ShellError::TokenFile {
        path: path.to_owned(),
        source,
    })?;
    contents
        .lines()
        .next()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or_else(|| ShellError::EmptyTokenFile {
            path: path.to_owned(),
        })
}
