//! WebSocket transport worker backed by `tungstenite`.
//!
//! The worker thread opens the TCP connection, performs the client handshake
//! (TLS via rustls when secure) and then alternates between draining the
//! outbound queue and reading frames with a short timeout, so the stop flag is
//! observed promptly.

use std::io;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::TryRecvError;
use tracing::{debug, info, warn};
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Error as WsError, Message, WebSocket};
use vss_config::{Config, ServerEndpoint};

use crate::error::BridgeError;
use crate::worker::{
    Inbound, Security, TransportWorker, WORKER_TARGET, WorkerChannels, WorkerFactory,
};

/// Read timeout used between outbound drains once connected.
const DEFAULT_READ_POLL: Duration = Duration::from_millis(50);

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Timing knobs for [`WebSocketWorker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebSocketSettings {
    /// Budget for the TCP connect and for each handshake read.
    pub connect_timeout: Duration,
    /// Read timeout while idle; bounds outbound latency and stop latency.
    pub read_poll: Duration,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl WebSocketSettings {
    /// Settings derived from the shell configuration.
    #[must_use]
    pub const fn from_config(config: &Config) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            read_poll: DEFAULT_READ_POLL,
        }
    }
}

/// Creates [`WebSocketWorker`] instances.
#[derive(Debug, Clone, Copy, Default)]
pub struct WebSocketFactory {
    settings: WebSocketSettings,
}

impl WebSocketFactory {
    /// Creates a factory with explicit settings.
    #[must_use]
    pub const fn new(settings: WebSocketSettings) -> Self {
        Self { settings }
    }
}

impl WorkerFactory for WebSocketFactory {
    fn create(
        &self,
        endpoint: &ServerEndpoint,
        security: Security,
        channels: WorkerChannels,
    ) -> Box<dyn TransportWorker> {
        Box::new(WebSocketWorker::new(
            endpoint.clone(),
            security,
            channels,
            self.settings,
        ))
    }
}

/// State shared between the worker handle and its thread.
#[derive(Debug, Default)]
struct Shared {
    connected: AtomicBool,
    stop: AtomicBool,
    control: Mutex<Option<TcpStream>>,
}

impl Shared {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn set_control(&self, stream: Option<TcpStream>) {
        *self.control.lock().unwrap_or_else(PoisonError::into_inner) = stream;
    }

    fn shutdown_socket(&self) {
        let guard = self.control.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(stream) = guard.as_ref()
            && let Err(error) = stream.shutdown(Shutdown::Both)
        {
            // The peer may already have closed the socket.
            debug!(target: WORKER_TARGET, %error, "socket shutdown failed");
        }
    }
}

/// Transport worker speaking WebSocket to one endpoint.
#[derive(Debug)]
pub struct WebSocketWorker {
    endpoint: ServerEndpoint,
    security: Security,
    settings: WebSocketSettings,
    channels: Option<WorkerChannels>,
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl WebSocketWorker {
    /// Creates a worker that has not yet been started.
    #[must_use]
    pub fn new(
        endpoint: ServerEndpoint,
        security: Security,
        channels: WorkerChannels,
        settings: WebSocketSettings,
    ) -> Self {
        Self {
            endpoint,
            security,
            settings,
            channels: Some(channels),
            shared: Arc::new(Shared::default()),
            handle: None,
        }
    }

    /// URL used for the client handshake.
    #[must_use]
    pub fn url(&self) -> String {
        format!("{}://{}", self.security.scheme(), self.endpoint)
    }
}

impl TransportWorker for WebSocketWorker {
    fn start(&mut self) -> Result<(), BridgeError> {
        let Some(channels) = self.channels.take() else {
            return Err(BridgeError::transport("worker already started"));
        };
        let task = WorkerTask {
            url: self.url(),
            endpoint: self.endpoint.clone(),
            settings: self.settings,
            channels,
            shared: Arc::clone(&self.shared),
        };
        let handle = thread::Builder::new()
            .name("vss-websocket".to_owned())
            .spawn(move || task.run())
            .map_err(|error| BridgeError::transport(format!("cannot spawn worker: {error}")))?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop_comm(&mut self) {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.shutdown_socket();
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            warn!(target: WORKER_TARGET, endpoint = %self.endpoint, "worker thread panicked");
        }
        self.shared.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }
}

impl Drop for WebSocketWorker {
    fn drop(&mut self) {
        self.stop_comm();
    }
}

/// Everything the worker thread owns.
struct WorkerTask {
    url: String,
    endpoint: ServerEndpoint,
    settings: WebSocketSettings,
    channels: WorkerChannels,
    shared: Arc<Shared>,
}

impl WorkerTask {
    fn run(self) {
        let outcome = self.open().and_then(|socket| self.pump(socket));
        self.shared.connected.store(false, Ordering::SeqCst);
        self.shared.set_control(None);
        match outcome {
            Ok(()) => debug!(target: WORKER_TARGET, url = %self.url, "worker stopped"),
            Err(reason) if self.shared.stopping() => {
                debug!(target: WORKER_TARGET, url = %self.url, %reason, "worker stopped");
            }
            Err(reason) => {
                warn!(target: WORKER_TARGET, url = %self.url, %reason, "connection lost");
                if self.channels.inbound.send(Inbound::Failure(reason)).is_err() {
                    debug!(target: WORKER_TARGET, "session gone before failure was reported");
                }
            }
        }
    }

    fn open(&self) -> Result<Socket, String> {
        let stream = self.connect_tcp()?;
        let control = stream
            .try_clone()
            .map_err(|error| format!("cannot clone socket: {error}"))?;
        stream
            .set_read_timeout(Some(self.settings.connect_timeout))
            .map_err(|error| format!("cannot set read timeout: {error}"))?;
        if let Err(error) = stream.set_nodelay(true) {
            debug!(target: WORKER_TARGET, %error, "cannot disable Nagle's algorithm");
        }
        self.shared.set_control(Some(control));
        if self.shared.stopping() {
            return Err("stopped before handshake".to_owned());
        }

        let (socket, _response) = tungstenite::client_tls(self.url.as_str(), stream)
            .map_err(|error| format!("handshake with {} failed: {error}", self.url))?;
        self.set_read_poll()?;
        self.shared.connected.store(true, Ordering::SeqCst);
        info!(target: WORKER_TARGET, url = %self.url, "websocket connected");
        Ok(socket)
    }

    fn connect_tcp(&self) -> Result<TcpStream, String> {
        let addrs: Vec<SocketAddr> = (self.endpoint.resolvable_host(), self.endpoint.port())
            .to_socket_addrs()
            .map_err(|error| format!("cannot resolve {}: {error}", self.endpoint))?
            .collect();
        let mut last_error = format!("no addresses for {}", self.endpoint);
        for addr in addrs {
            match TcpStream::connect_timeout(&addr, self.settings.connect_timeout) {
                Ok(stream) => return Ok(stream),
                Err(error) => {
                    debug!(target: WORKER_TARGET, %addr, %error, "tcp connect failed");
                    last_error = format!("cannot connect to {addr}: {error}");
                }
            }
        }
        Err(last_error)
    }

    fn set_read_poll(&self) -> Result<(), String> {
        let guard = self.shared.control.lock().unwrap_or_else(PoisonError::into_inner);
        let stream = guard
            .as_ref()
            .ok_or_else(|| "socket closed during handshake".to_owned())?;
        stream
            .set_read_timeout(Some(self.settings.read_poll))
            .map_err(|error| format!("cannot set read timeout: {error}"))
    }

    fn pump(&self, mut socket: Socket) -> Result<(), String> {
        loop {
            if self.shared.stopping() || !self.drain_outbound(&mut socket)? {
                close_quietly(&mut socket);
                return Ok(());
            }
            match socket.read() {
                Ok(message) => self.deliver(message)?,
                Err(WsError::Io(error)) if is_poll_timeout(&error) => {}
                Err(WsError::ConnectionClosed | WsError::AlreadyClosed) => {
                    return Err("server closed the connection".to_owned());
                }
                Err(error) => return Err(format!("read failed: {error}")),
            }
        }
    }

    /// Sends every queued request. Returns `false` once the session side is gone.
    fn drain_outbound(&self, socket: &mut Socket) -> Result<bool, String> {
        loop {
            match self.channels.outbound.try_recv() {
                Ok(text) => {
                    debug!(target: WORKER_TARGET, bytes = text.len(), "sending frame");
                    socket
                        .send(Message::text(text))
                        .map_err(|error| format!("send failed: {error}"))?;
                }
                Err(TryRecvError::Empty) => return Ok(true),
                Err(TryRecvError::Disconnected) => return Ok(false),
            }
        }
    }

    fn deliver(&self, message: Message) -> Result<(), String> {
        let text = match message {
            Message::Text(text) => text.as_str().to_owned(),
            Message::Binary(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Message::Close(_) => return Err("server closed the connection".to_owned()),
            Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => return Ok(()),
        };
        debug!(target: WORKER_TARGET, bytes = text.len(), "received frame");
        self.channels
            .inbound
            .send(Inbound::Message(text))
            .map_err(|_| "session dropped its receiver".to_owned())
    }
}

/// Sends a close frame; the socket is about to be shut down anyway.
fn close_quietly(socket: &mut Socket) {
    if let Err(error) = socket.close(None) {
        debug!(target: WORKER_TARGET, %error, "close handshake failed");
    }
}

fn is_poll_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}
