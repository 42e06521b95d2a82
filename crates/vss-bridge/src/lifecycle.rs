//! Connection lifecycle management.
//!
//! The manager owns at most one transport worker. `connect` always tears the
//! previous worker down before starting a new one on fresh channels, then
//! polls the worker's liveness flag within a fixed budget.

use std::fmt;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use vss_config::{Config, ServerEndpoint};

use crate::error::BridgeError;
use crate::worker::{Security, SessionChannels, TransportWorker, WorkerFactory, channel_pair};

/// Tracing target for connection lifecycle events.
pub const LIFECYCLE_TARGET: &str = "vss_bridge::lifecycle";

/// Observable state of the session's connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    /// No worker is running.
    #[default]
    Disconnected,
    /// A worker was started and liveness is being polled.
    Connecting,
    /// The worker reported liveness.
    Connected,
    /// The last connection attempt did not succeed.
    Failed,
}

impl ConnectionState {
    /// Whether requests may be sent.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        };
        formatter.write_str(label)
    }
}

/// How liveness is polled after a worker starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between polls.
    pub interval: Duration,
    /// Number of polls before giving up.
    pub attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PollPolicy {
    /// Policy taken from configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            interval: config.connect_poll_interval(),
            attempts: config.connect_poll_attempts(),
        }
    }

    fn interval_ms(self) -> u64 {
        u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX)
    }
}

/// A started worker together with the session ends of its channels.
struct ActiveLink {
    worker: Box<dyn TransportWorker>,
    channels: SessionChannels,
}

/// Starts, polls and stops the transport worker.
pub struct ConnectionManager<F> {
    factory: F,
    endpoint: ServerEndpoint,
    policy: PollPolicy,
    state: ConnectionState,
    link: Option<ActiveLink>,
    last_error: Option<BridgeError>,
}

impl<F: WorkerFactory> ConnectionManager<F> {
    /// Creates a manager that is not connected.
    #[must_use]
    pub const fn new(factory: F, endpoint: ServerEndpoint, policy: PollPolicy) -> Self {
        Self {
            factory,
            endpoint,
            policy,
            state: ConnectionState::Disconnected,
            link: None,
            last_error: None,
        }
    }

    /// Tears down any active worker and starts a new one.
    ///
    /// Returns [`ConnectionState::Connected`] when the worker reported liveness
    /// within the polling budget and [`ConnectionState::Failed`] otherwise. The
    /// cause of a failure is available from [`Self::last_error`].
    pub fn connect(&mut self, security: Security) -> ConnectionState {
        self.teardown();
        self.last_error = None;
        self.state = ConnectionState::Connecting;

        let (session_side, worker_side) = channel_pair();
        let mut worker = self.factory.create(&self.endpoint, security, worker_side);
        debug!(
            target: LIFECYCLE_TARGET,
            endpoint = %self.endpoint,
            ?security,
            "starting transport worker"
        );

        if let Err(error) = worker.start() {
            warn!(target: LIFECYCLE_TARGET, endpoint = %self.endpoint, %error, "worker failed to start");
            worker.stop_comm();
            return self.fail(error);
        }

        if self.await_liveness(worker.as_ref()) {
            info!(target: LIFECYCLE_TARGET, endpoint = %self.endpoint, "connected");
            self.link = Some(ActiveLink {
                worker,
                channels: session_side,
            });
            self.state = ConnectionState::Connected;
            return self.state;
        }

        worker.stop_comm();
        warn!(
            target: LIFECYCLE_TARGET,
            endpoint = %self.endpoint,
            attempts = self.policy.attempts,
            "worker did not become live"
        );
        let timeout = BridgeError::ConnectTimeout {
            attempts: self.policy.attempts,
            interval_ms: self.policy.interval_ms(),
        };
        self.fail(timeout)
    }

    fn await_liveness(&self, worker: &dyn TransportWorker) -> bool {
        for _ in 0..self.policy.attempts {
            if worker.is_connected() {
                return true;
            }
            thread::sleep(self.policy.interval);
        }
        worker.is_connected()
    }

    fn fail(&mut self, error: BridgeError) -> ConnectionState {
        self.last_error = Some(error);
        self.state = ConnectionState::Failed;
        self.state
    }

    /// Stops and discards the active worker. Does nothing when disconnected.
    pub fn disconnect(&mut self) {
        if self.teardown() {
            info!(target: LIFECYCLE_TARGET, endpoint = %self.endpoint, "disconnected");
        }
        self.state = ConnectionState::Disconnected;
    }

    fn teardown(&mut self) -> bool {
        let Some(mut link) = self.link.take() else {
            return false;
        };
        link.worker.stop_comm();
        true
    }

    /// Changes the endpoint used by the next [`Self::connect`].
    pub fn set_endpoint(&mut self, endpoint: ServerEndpoint) {
        debug!(target: LIFECYCLE_TARGET, %endpoint, "endpoint changed");
        self.endpoint = endpoint;
    }

    /// Endpoint used by the next connection attempt.
    #[must_use]
    pub const fn endpoint(&self) -> &ServerEndpoint {
        &self.endpoint
    }

    /// Current state. A connection whose worker has lost liveness reads as
    /// [`ConnectionState::Disconnected`].
    #[must_use]
    pub fn current_state(&self) -> ConnectionState {
        match (&self.link, self.state) {
            (Some(link), ConnectionState::Connected) if !link.worker.is_connected() => {
                ConnectionState::Disconnected
            }
            (_, state) => state,
        }
    }

    /// Failure recorded by the most recent unsuccessful [`Self::connect`].
    #[must_use]
    pub const fn last_error(&self) -> Option<&BridgeError> {
        self.last_error.as_ref()
    }

    /// Session ends of the active worker's channels.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NotConnected`] unless the current state is
    /// [`ConnectionState::Connected`].
    pub fn channels(&self) -> Result<&SessionChannels, BridgeError> {
        match &self.link {
            Some(link) if self.current_state().is_connected() => Ok(&link.channels),
            _ => Err(BridgeError::NotConnected),
        }
    }

    /// Factory used to build workers.
    #[must_use]
    pub const fn factory(&self) -> &F {
        &self.factory
    }

    /// Whether a worker is currently held.
    #[must_use]
    pub const fn has_worker(&self) -> bool {
        self.link.is_some()
    }
}

impl<F> Drop for ConnectionManager<F> {
    fn drop(&mut self) {
        if let Some(mut link) = self.link.take() {
            link.worker.stop_comm();
        }
    }
}

impl<F> fmt::Debug for ConnectionManager<F> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ConnectionManager")
            .field("endpoint", &self.endpoint)
            .field("policy", &self.policy)
            .field("state", &self.state)
            .field("has_worker", &self.link.is_some())
            .field("last_error", &self.last_error)
            .finish_non_exhaustive()
    }
}
