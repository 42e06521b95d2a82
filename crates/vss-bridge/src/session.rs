//! The session object tying the bridge components together.

use crossbeam_channel::{Receiver, unbounded};
use tracing::debug;
use vss_config::{Config, ServerEndpoint};

use crate::correlator::{CORRELATOR_TARGET, Canceller, Correlator};
use crate::error::BridgeError;
use crate::lifecycle::{ConnectionManager, ConnectionState, PollPolicy};
use crate::message::{Action, RequestParams, Response};
use crate::metadata::{ChildMap, MetadataCache, MetadataNode};
use crate::resolver::{self, CompletionCandidate};
use crate::websocket::{WebSocketFactory, WebSocketSettings};
use crate::worker::{Security, WorkerFactory};

/// Path requesting the whole metadata tree.
pub const FULL_TREE_PATH: &str = "*";

/// One operator session against one VSS server.
///
/// Owns the connection manager, the correlator, the metadata cache and the
/// cancellation channel. All calls are made from a single command thread;
/// only [`Canceller`] handles cross threads.
#[derive(Debug)]
pub struct Session<F: WorkerFactory = WebSocketFactory> {
    connection: ConnectionManager<F>,
    correlator: Correlator,
    cache: MetadataCache,
    canceller: Canceller,
    cancelled: Receiver<()>,
}

impl Session<WebSocketFactory> {
    /// Creates a session using the WebSocket worker.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let factory = WebSocketFactory::new(WebSocketSettings::from_config(config));
        Self::with_factory(factory, config)
    }
}

impl<F: WorkerFactory> Session<F> {
    /// Creates a session with a custom worker factory.
    #[must_use]
    pub fn with_factory(factory: F, config: &Config) -> Self {
        let (signal, cancelled) = unbounded();
        Self {
            connection: ConnectionManager::new(
                factory,
                config.server_endpoint(),
                PollPolicy::from_config(config),
            ),
            correlator: Correlator::new(config.request_ids(), config.request_timeout()),
            cache: MetadataCache::new(),
            canceller: Canceller::new(signal),
            cancelled,
        }
    }

    /// Connects to the configured endpoint, replacing any live connection.
    pub fn connect(&mut self, security: Security) -> ConnectionState {
        self.connection.connect(security)
    }

    /// Drops the connection. Safe to call when already disconnected.
    pub fn disconnect(&mut self) {
        self.connection.disconnect();
    }

    /// Sets the endpoint used by the next [`Self::connect`].
    pub fn set_endpoint(&mut self, host: impl Into<String>, port: u16) {
        self.connection.set_endpoint(ServerEndpoint::new(host, port));
    }

    /// Endpoint used by the next [`Self::connect`].
    #[must_use]
    pub const fn endpoint(&self) -> &ServerEndpoint {
        self.connection.endpoint()
    }

    /// Current connection state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.connection.current_state()
    }

    /// Failure recorded by the most recent unsuccessful connect.
    #[must_use]
    pub const fn last_connect_error(&self) -> Option<&BridgeError> {
        self.connection.last_error()
    }

    /// Handle that aborts the request currently awaiting a reply.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        self.canceller.clone()
    }

    /// Sends one request and returns its reply verbatim.
    ///
    /// A `set` clears the metadata cache once the request has been queued.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] without touching the channels
    /// when no connection is established, and any correlator error otherwise.
    pub fn send(&mut self, action: Action, params: RequestParams) -> Result<Response, BridgeError> {
        let channels = self.connection.channels()?;
        let pending = self
            .correlator
            .push(channels, &self.cancelled, action, params)?;
        if action.is_write() {
            self.cache.invalidate();
        }
        let _waiting = self.canceller.begin_wait();
        self.correlator
            .await_reply(channels, &self.cancelled, pending)
    }

    /// Reads the value at `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub fn get(&mut self, path: &str) -> Result<Response, BridgeError> {
        self.send(Action::Get, RequestParams::path(path))
    }

    /// Writes `value` at `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub fn set(&mut self, path: &str, value: &str) -> Result<Response, BridgeError> {
        let params = RequestParams {
            value: Some(value.to_owned()),
            ..RequestParams::path(path)
        };
        self.send(Action::Set, params)
    }

    /// Reads the metadata subtree at `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub fn get_metadata(&mut self, path: &str) -> Result<Response, BridgeError> {
        self.send(Action::GetMetadata, RequestParams::path(path))
    }

    /// Presents an authorisation token.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub fn authorize(&mut self, token: &str) -> Result<Response, BridgeError> {
        let params = RequestParams {
            tokens: Some(token.to_owned()),
            ..RequestParams::default()
        };
        self.send(Action::Authorize, params)
    }

    /// The full metadata tree, fetched on first use and cached afterwards.
    ///
    /// # Errors
    ///
    /// Returns the send error or [`BridgeError::MalformedResponse`]; the
    /// cache stays empty in either case.
    pub fn get_tree(&mut self) -> Result<&MetadataNode, BridgeError> {
        let Self {
            connection,
            correlator,
            cache,
            canceller,
            cancelled,
        } = self;
        cache.get_or_fetch(|| {
            debug!(target: CORRELATOR_TARGET, "fetching full metadata tree");
            let channels = connection.channels()?;
            let _waiting = canceller.begin_wait();
            correlator.exchange(
                channels,
                cancelled,
                Action::GetMetadata,
                RequestParams::path(FULL_TREE_PATH),
            )
        })
    }

    /// Clears the metadata cache.
    pub fn invalidate_tree(&mut self) {
        self.cache.invalidate();
    }

    /// Children of the deepest node matched by `path`.
    ///
    /// # Errors
    ///
    /// See [`Self::get_tree`].
    pub fn children_of(&mut self, path: &str) -> Result<&ChildMap, BridgeError> {
        let tree = self.get_tree()?;
        Ok(resolver::children_of(tree, path))
    }

    /// Completion candidates for a partially typed path.
    ///
    /// # Errors
    ///
    /// See [`Self::get_tree`].
    pub fn complete(&mut self, path: &str) -> Result<Vec<CompletionCandidate>, BridgeError> {
        let tree = self.get_tree()?;
        Ok(resolver::complete(tree, path))
    }
}
