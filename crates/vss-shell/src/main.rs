//! Entry point for the `vss-client` interactive shell.
//!
//! The binary delegates to [`vss_shell::run`], which loads configuration,
//! connects to the VSS server and then either runs the `--command` lines or
//! reads commands interactively.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    vss_shell::run(std::env::args_os(), &mut stdout, &mut stderr)
}
