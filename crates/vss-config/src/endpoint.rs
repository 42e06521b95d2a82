use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Address of the VSS server the shell talks to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct ServerEndpoint {
    host: String,
    port: u16,
}

impl ServerEndpoint {
    /// Builds an endpoint from a host name (or IP literal) and a port.
    ///
    /// Bare IPv6 literals are bracketed so the endpoint can appear in a URL.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        let raw: String = host.into();
        let bracketed = if raw.parse::<Ipv6Addr>().is_ok() {
            format!("[{raw}]")
        } else {
            raw
        };
        Self {
            host: bracketed,
            port,
        }
    }

    /// Host name or IP literal as configured. IPv6 literals keep their brackets.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// TCP port of the server.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Host suitable for socket address resolution, with IPv6 brackets removed.
    #[must_use]
    pub fn resolvable_host(&self) -> &str {
        self.host
            .strip_prefix('[')
            .and_then(|inner| inner.strip_suffix(']'))
            .unwrap_or(&self.host)
    }
}

impl fmt::Display for ServerEndpoint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}:{}", self.host, self.port)
    }
}

impl FromStr for ServerEndpoint {
    type Err = EndpointParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(EndpointParseError::Empty);
        }
        // A scheme without a default port keeps explicit ports such as 80.
        let url = Url::parse(&format!("tcp://{trimmed}"))?;
        if !matches!(url.path(), "" | "/") || url.query().is_some() {
            return Err(EndpointParseError::UnexpectedPath(trimmed.to_owned()));
        }
        let host = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| EndpointParseError::MissingHost(trimmed.to_owned()))?;
        let port = url
            .port()
            .ok_or_else(|| EndpointParseError::MissingPort(trimmed.to_owned()))?;
        Ok(Self::new(host, port))
    }
}

/// Errors encountered while parsing a [`ServerEndpoint`] from text.
#[derive(Debug, Error)]
pub enum EndpointParseError {
    /// Nothing was supplied.
    #[error("server address must not be empty")]
    Empty,
    /// Host name was missing.
    #[error("missing host in '{0}'")]
    MissingHost(String),
    /// Port was missing.
    #[error("missing port in '{0}'; expected host:port")]
    MissingPort(String),
    /// Extra path or query components were supplied.
    #[error("unexpected path in server address '{0}'; expected host:port")]
    UnexpectedPath(String),
    /// URL grammar rejected the address.
    #[error(transparent)]
    Url(#[from] url::ParseError),
}
