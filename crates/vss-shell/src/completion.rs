//! Tab completion for the line editor.

use std::cell::RefCell;
use std::path::MAIN_SEPARATOR;
use std::rc::Rc;

use rustyline::completion::{Completer, FilenameCompleter, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tracing::debug;
use vss_bridge::{CompletionCandidate, Session, WorkerFactory};

use crate::command::{PATH_COMMANDS, TOKEN_COMMAND, command_names};

/// Most candidates offered for one completion request.
pub(crate) const MAX_COMPLETION_ITEMS: usize = 20;

const COMPLETION_TARGET: &str = "vss_shell::completion";
const TOKEN_EXTENSION: &str = ".token";

/// What the word under the cursor stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompletionTarget<'line> {
    /// The command name.
    Command { start: usize, fragment: &'line str },
    /// The `Parameter` argument of a path command.
    Path { start: usize, fragment: &'line str },
    /// The token argument of `authorize`, which may name a token file.
    TokenFile { start: usize, fragment: &'line str },
}

/// Locates the word being completed in the text before the cursor.
pub(crate) fn locate(head: &str) -> Option<CompletionTarget<'_>> {
    let start = head
        .trim_end_matches(|character: char| !character.is_whitespace())
        .len();
    let fragment = head.get(start..)?;
    let preceding = head.get(..start)?;
    let mut words = preceding.split_whitespace();
    match (words.next(), words.next()) {
        (None, _) => Some(CompletionTarget::Command { start, fragment }),
        (Some(command), None) if PATH_COMMANDS.contains(&command) => {
            Some(CompletionTarget::Path { start, fragment })
        }
        (Some(TOKEN_COMMAND), None) => Some(CompletionTarget::TokenFile { start, fragment }),
        _ => None,
    }
}

fn command_pairs(fragment: &str) -> Vec<Pair> {
    command_names()
        .into_iter()
        .filter(|name| name.starts_with(fragment))
        .map(|name| Pair {
            display: name.clone(),
            replacement: name,
        })
        .collect()
}

/// Turns resolver candidates into editor pairs, keeping only those that
/// extend `fragment`.
pub(crate) fn path_pairs(fragment: &str, candidates: Vec<CompletionCandidate>) -> Vec<Pair> {
    candidates
        .into_iter()
        .filter(|candidate| candidate.full_path.starts_with(fragment))
        .take(MAX_COMPLETION_ITEMS)
        .map(|candidate| Pair {
            display: if candidate.annotation.is_empty() {
                candidate.full_path.clone()
            } else {
                format!("{} {}", candidate.full_path, candidate.annotation)
            },
            replacement: candidate.full_path,
        })
        .collect()
}

/// Keeps directories and `*.token` files.
pub(crate) fn token_file_pairs(pairs: Vec<Pair>) -> Vec<Pair> {
    pairs
        .into_iter()
        .filter(|pair| {
            pair.replacement.ends_with(MAIN_SEPARATOR)
                || pair.replacement.ends_with(TOKEN_EXTENSION)
        })
        .take(MAX_COMPLETION_ITEMS)
        .collect()
}

/// Line editor helper completing command names, signal paths and token files.
pub(crate) struct ShellHelper<F: WorkerFactory> {
    session: Rc<RefCell<Session<F>>>,
    files: FilenameCompleter,
}

impl<F: WorkerFactory> ShellHelper<F> {
    pub(crate) fn new(session: Rc<RefCell<Session<F>>>) -> Self {
        Self {
            session,
            files: FilenameCompleter::new(),
        }
    }

    /// Candidates for the text before the cursor. Failures to fetch the
    /// metadata tree yield no candidates.
    pub(crate) fn candidates(&self, head: &str) -> (usize, Vec<Pair>) {
        match locate(head) {
            Some(CompletionTarget::Command { start, fragment }) => {
                (start, command_pairs(fragment))
            }
            Some(CompletionTarget::Path { start, fragment }) => {
                (start, self.path_candidates(fragment))
            }
            Some(CompletionTarget::TokenFile { start, fragment }) => {
                self.token_file_candidates(start, fragment)
            }
            None => (head.len(), Vec::new()),
        }
    }

    fn path_candidates(&self, fragment: &str) -> Vec<Pair> {
        let Ok(mut session) = self.session.try_borrow_mut() else {
            return Vec::new();
        };
        match session.complete(fragment) {
            Ok(candidates) => path_pairs(fragment, candidates),
            Err(error) => {
                debug!(target: COMPLETION_TARGET, %error, fragment, "no path candidates");
                Vec::new()
            }
        }
    }

    fn token_file_candidates(&self, start: usize, fragment: &str) -> (usize, Vec<Pair>) {
        match self.files.complete_path(fragment, fragment.len()) {
            Ok((offset, pairs)) => (start + offset, token_file_pairs(pairs)),
            Err(error) => {
                debug!(target: COMPLETION_TARGET, %error, fragment, "no token file candidates");
                (start, Vec::new())
            }
        }
    }
}

impl<F: WorkerFactory> Completer for ShellHelper<F> {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let head = line.get(..pos).unwrap_or(line);
        Ok(self.candidates(head))
    }
}

impl<F: WorkerFactory> Hinter for ShellHelper<F> {
    type Hint = String;
}

impl<F: WorkerFactory> Highlighter for ShellHelper<F> {}

impl<F: WorkerFactory> Validator for ShellHelper<F> {}

impl<F: WorkerFactory> Helper for ShellHelper<F> {}
