//! Wire messages exchanged with the VSS server.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use vss_config::RequestIdMode;

/// Operation requested from the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    /// Read the value of a signal.
    Get,
    /// Write the value of a signal.
    Set,
    /// Read the metadata subtree of a path.
    GetMetadata,
    /// Present an authorisation token.
    Authorize,
}

impl Action {
    /// Fixed tag historically sent as `requestId` for this action.
    #[must_use]
    pub const fn legacy_request_id(self) -> i64 {
        match self {
            Self::Get => 1234,
            Self::Set => 1235,
            Self::GetMetadata => 1236,
            Self::Authorize => 1238,
        }
    }

    /// Whether the action may change server state.
    #[must_use]
    pub const fn is_write(self) -> bool {
        matches!(self, Self::Set)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => formatter.write_str("get"),
            Self::Set => formatter.write_str("set"),
            Self::GetMetadata => formatter.write_str("getMetadata"),
            Self::Authorize => formatter.write_str("authorize"),
        }
    }
}

/// Allocates `requestId` values for one session.
#[derive(Debug, Clone)]
pub struct RequestIdSequence {
    mode: RequestIdMode,
    next: i64,
}

impl RequestIdSequence {
    /// Creates a sequence starting at 1.
    #[must_use]
    pub const fn new(mode: RequestIdMode) -> Self {
        Self { mode, next: 1 }
    }

    /// Returns the identifier for the next request of the given action.
    pub fn next_for(&mut self, action: Action) -> i64 {
        match self.mode {
            RequestIdMode::PerAction => action.legacy_request_id(),
            RequestIdMode::Sequential => {
                let id = self.next;
                self.next = self.next.wrapping_add(1).max(1);
                id
            }
        }
    }
}

/// A request as serialised on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Correlation identifier echoed by the server.
    pub request_id: i64,
    /// Requested operation.
    pub action: Action,
    /// Dotted signal path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Value to write.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Authorisation token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens: Option<String>,
}

impl Request {
    /// Creates a request with the given identifier and no parameters.
    #[must_use]
    pub const fn new(request_id: i64, action: Action) -> Self {
        Self {
            request_id,
            action,
            path: None,
            value: None,
            tokens: None,
        }
    }

    /// Sets the signal path.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Sets the authorisation token.
    #[must_use]
    pub fn with_tokens(mut self, tokens: impl Into<String>) -> Self {
        self.tokens = Some(tokens.into());
        self
    }

    /// Serialises the request to JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Parameters of a request before an identifier has been assigned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestParams {
    /// Dotted signal path.
    pub path: Option<String>,
    /// Value to write.
    pub value: Option<String>,
    /// Authorisation token.
    pub tokens: Option<String>,
}

impl RequestParams {
    /// Parameters carrying only a path.
    #[must_use]
    pub fn path(path: impl Into<String>) -> Self {
        Self {
            path: Some(path.into()),
            ..Self::default()
        }
    }

    /// Builds the wire request.
    #[must_use]
    pub fn into_request(self, request_id: i64, action: Action) -> Request {
        Request {
            request_id,
            action,
            path: self.path,
            value: self.value,
            tokens: self.tokens,
        }
    }
}

/// A reply from the server, kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    raw: String,
}

impl Response {
    /// Wraps reply text.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// The reply text exactly as received.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Parses the reply as JSON.
    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::from_str(&self.raw)
    }

    /// The top-level `requestId` when the reply is a JSON object carrying one.
    ///
    /// String-encoded identifiers are accepted since some servers echo them
    /// that way.
    #[must_use]
    pub fn request_id(&self) -> Option<i64> {
        let value = self.to_json().ok()?;
        match value.get("requestId")? {
            Value::Number(number) => number.as_i64(),
            Value::String(text) => text.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.raw)
    }
}
