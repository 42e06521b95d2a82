//! Interactive read-eval-print loop.

use std::io::Write;

use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{CompletionType, Editor};
use tracing::{debug, warn};
use vss_bridge::WorkerFactory;
use vss_config::Config;

use crate::IoStreams;
use crate::completion::ShellHelper;
use crate::errors::ShellError;
use crate::shell::{Flow, Shell};

/// Prompt shown before each command.
pub(crate) const PROMPT: &str = "VSS Client> ";

const REPL_TARGET: &str = "vss_shell::repl";

/// Reads commands until `quit`, `exit` or end of input.
///
/// Command failures are printed and the loop carries on. Ctrl-C at the
/// prompt discards the current line.
pub(crate) fn run<F, W, E>(
    shell: &Shell<F>,
    config: &Config,
    io: &mut IoStreams<'_, W, E>,
) -> Result<(), ShellError>
where
    F: WorkerFactory,
    W: Write,
    E: Write,
{
    let editor_config = rustyline::Config::builder()
        .max_history_size(config.history_length())?
        .auto_add_history(true)
        .completion_type(CompletionType::List)
        .build();
    let mut editor: Editor<ShellHelper<F>, DefaultHistory> = Editor::with_config(editor_config)?;
    editor.set_helper(Some(ShellHelper::new(shell.session())));

    let history = config.history_file();
    if let Err(error) = editor.load_history(history) {
        debug!(target: REPL_TARGET, %history, %error, "starting without history");
    }

    let outcome = read_commands(shell, &mut editor, io);

    if let Err(error) = editor.save_history(history) {
        warn!(target: REPL_TARGET, %history, %error, "failed to save history");
    }
    shell.shutdown();
    outcome
}

fn read_commands<F, W, E>(
    shell: &Shell<F>,
    editor: &mut Editor<ShellHelper<F>, DefaultHistory>,
    io: &mut IoStreams<'_, W, E>,
) -> Result<(), ShellError>
where
    F: WorkerFactory,
    W: Write,
    E: Write,
{
    loop {
        match editor.readline(PROMPT) {
            Ok(line) => match shell.execute_line(&line, io) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Quit) => return Ok(()),
                Err(error) => writeln!(io.stderr, "{error}")?,
            },
            Err(ReadlineError::Interrupted) => {}
            Err(ReadlineError::Eof) => return Ok(()),
            Err(error) => return Err(ShellError::Editor(error)),
        }
        io.stdout.flush()?;
    }
}
