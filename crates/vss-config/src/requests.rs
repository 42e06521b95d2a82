//! Request identifier allocation modes.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// How the bridge assigns `requestId` values to outgoing requests.
#[derive(
    Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum RequestIdMode {
    /// A fresh, monotonically increasing identifier per request.
    #[default]
    Sequential,
    /// One fixed tag per action, as older servers and clients expect.
    PerAction,
}

/// Errors encountered while parsing a [`RequestIdMode`] from text.
pub type RequestIdModeParseError = strum::ParseError;
