//! Configuration loading helpers for the shell.
//!
//! Configuration flags may appear anywhere on the command line. They are
//! partitioned out so the loader only receives the flags it understands and
//! the shell parser never sees them.

use std::ffi::{OsStr, OsString};

use ortho_config::OrthoConfig;
use vss_config::Config;

use crate::errors::ShellError;

/// Shell flags whose following argument is always a shell value.
const SHELL_VALUE_FLAGS: &[&str] = &["--command", "-c"];

pub(crate) trait ConfigLoader {
    /// Loads configuration from the partitioned configuration arguments.
    ///
    /// `args` starts with the binary name, as `clap` expects.
    fn load(&self, args: &[OsString]) -> Result<Config, ShellError>;
}

pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, ShellError> {
        Config::load_from_iter(args.iter().cloned()).map_err(ShellError::LoadConfiguration)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagAction {
    Config { needs_value: bool },
    ShellValue,
    Shell,
}

fn classify(argument: &OsStr) -> FlagAction {
    let lossy = argument.to_string_lossy();
    let text: &str = &lossy;
    if SHELL_VALUE_FLAGS.contains(&text) {
        return FlagAction::ShellValue;
    }
    if !text.starts_with("--") {
        return FlagAction::Shell;
    }

    let mut parts = text.splitn(2, '=');
    let flag = parts.next().unwrap_or_default();
    let has_inline_value = parts.next().is_some();
    if super::CONFIG_CLI_FLAGS.contains(&flag) {
        return FlagAction::Config {
            needs_value: !has_inline_value,
        };
    }
    FlagAction::Shell
}

/// Arguments split between the configuration loader and the shell parser.
/// Both vectors start with the binary name.
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct ConfigArgumentSplit {
    pub(crate) config_arguments: Vec<OsString>,
    pub(crate) shell_arguments: Vec<OsString>,
}

pub(crate) fn split_config_arguments(args: &[OsString]) -> ConfigArgumentSplit {
    let mut split = ConfigArgumentSplit::default();
    let mut remaining = args.iter();
    if let Some(binary) = remaining.next() {
        split.config_arguments.push(binary.clone());
        split.shell_arguments.push(binary.clone());
    }

    while let Some(argument) = remaining.next() {
        match classify(argument) {
            FlagAction::Config { needs_value } => {
                split.config_arguments.push(argument.clone());
                if needs_value && let Some(value) = remaining.next() {
                    split.config_arguments.push(value.clone());
                }
            }
            FlagAction::ShellValue => {
                split.shell_arguments.push(argument.clone());
                if let Some(value) = remaining.next() {
                    split.shell_arguments.push(value.clone());
                }
            }
            FlagAction::Shell => split.shell_arguments.push(argument.clone()),
        }
    }
    split
}
