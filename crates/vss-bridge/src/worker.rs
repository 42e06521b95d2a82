//! Transport worker interface and the channels that connect it to a session.
//!
//! A worker owns the physical connection on a background thread. It reads
//! outbound request text from one channel and pushes inbound events onto
//! another. The session never touches the socket directly.

use crossbeam_channel::{Receiver, Sender, unbounded};
use vss_config::ServerEndpoint;

use crate::error::BridgeError;

/// Tracing target for transport workers.
pub const WORKER_TARGET: &str = "vss_bridge::worker";

/// Whether the connection is wrapped in TLS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Security {
    /// `wss://` with TLS.
    #[default]
    Secure,
    /// Plain `ws://`.
    Insecure,
}

impl Security {
    /// Picks [`Security::Insecure`] when `insecure` is set.
    #[must_use]
    pub const fn from_insecure_flag(insecure: bool) -> Self {
        if insecure { Self::Insecure } else { Self::Secure }
    }

    /// URL scheme used for the handshake.
    #[must_use]
    pub const fn scheme(self) -> &'static str {
        match self {
            Self::Secure => "wss",
            Self::Insecure => "ws",
        }
    }
}

/// Event delivered from the worker to the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// A text message received from the server.
    Message(String),
    /// The worker hit an unrecoverable error and is stopping.
    Failure(String),
}

/// Worker-side ends of a fresh channel pair.
#[derive(Debug)]
pub struct WorkerChannels {
    /// Requests waiting to be written to the socket.
    pub outbound: Receiver<String>,
    /// Where received messages are delivered.
    pub inbound: Sender<Inbound>,
}

/// Session-side ends of a fresh channel pair.
#[derive(Debug, Clone)]
pub struct SessionChannels {
    /// Queue of requests for the worker.
    pub outbound: Sender<String>,
    /// Messages received by the worker.
    pub inbound: Receiver<Inbound>,
}

/// Creates the two unbounded FIFO channels shared by a session and its worker.
#[must_use]
pub fn channel_pair() -> (SessionChannels, WorkerChannels) {
    let (outbound_tx, outbound_rx) = unbounded();
    let (inbound_tx, inbound_rx) = unbounded();
    (
        SessionChannels {
            outbound: outbound_tx,
            inbound: inbound_rx,
        },
        WorkerChannels {
            outbound: outbound_rx,
            inbound: inbound_tx,
        },
    )
}

/// Background task that owns one live connection.
pub trait TransportWorker: Send {
    /// Starts the background thread. Liveness may become true later.
    ///
    /// # Errors
    ///
    /// Returns an error when the thread cannot be spawned.
    fn start(&mut self) -> Result<(), BridgeError>;

    /// Stops communication and waits for the thread to end. Idempotent.
    fn stop_comm(&mut self);

    /// Whether the connection is currently established.
    fn is_connected(&self) -> bool;
}

/// Builds workers bound to an endpoint and a set of channels.
pub trait WorkerFactory {
    /// Creates a worker that has not yet been started.
    fn create(
        &self,
        endpoint: &ServerEndpoint,
        security: Security,
        channels: WorkerChannels,
    ) -> Box<dyn TransportWorker>;
}
