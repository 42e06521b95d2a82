//! Crate-level unit and behavioural tests with an in-process fake server.

mod correlator;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::RecvTimeoutError;
use serde_json::{Value, json};
use vss_config::{Config, ServerEndpoint};

use crate::error::BridgeError;
use crate::session::Session;
use crate::worker::{Inbound, Security, TransportWorker, WorkerChannels, WorkerFactory};

/// What the fake server does in answer to one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Reply {
    /// Deliver a text message.
    Send(String),
    /// Report a worker failure and stop.
    Fail(String),
    /// Drop the connection without a word.
    Hangup,
}

type Responder = Box<dyn Fn(&Value) -> Vec<Reply> + Send>;

/// Echoes the request back with a `value` field, like a cooperative server.
pub(crate) fn echo_responder() -> Responder {
    Box::new(|request: &Value| {
        let mut reply = request.clone();
        if let Some(object) = reply.as_object_mut() {
            object.insert("value".to_owned(), json!("42"));
        }
        vec![Reply::Send(reply.to_string())]
    })
}

/// Answers metadata requests with a small tree and echoes everything else.
pub(crate) fn metadata_responder(tree: Value) -> Responder {
    let echo = echo_responder();
    Box::new(move |request: &Value| {
        if request["action"] == "getMetadata" {
            let reply = json!({
                "action": "getMetadata",
                "requestId": request["requestId"],
                "metadata": tree,
            });
            vec![Reply::Send(reply.to_string())]
        } else {
            echo(request)
        }
    })
}

/// Shared observations and knobs for every worker a [`FakeFactory`] creates.
pub(crate) struct FakeServer {
    responder: Mutex<Responder>,
    sent: Mutex<Vec<Value>>,
    live: AtomicUsize,
    max_live: AtomicUsize,
    created: AtomicUsize,
    refuse: AtomicBool,
    fail_start: AtomicBool,
}

impl FakeServer {
    pub(crate) fn new(responder: Responder) -> Arc<Self> {
        Arc::new(Self {
            responder: Mutex::new(responder),
            sent: Mutex::new(Vec::new()),
            live: AtomicUsize::new(0),
            max_live: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            refuse: AtomicBool::new(false),
            fail_start: AtomicBool::new(false),
        })
    }

    pub(crate) fn set_responder(&self, responder: Responder) {
        *self.responder.lock().expect("responder lock") = responder;
    }

    /// Workers started from now on never report liveness.
    pub(crate) fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Workers started from now on fail in `start`.
    pub(crate) fn fail_start(&self, fail: bool) {
        self.fail_start.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().expect("sent lock").clone()
    }

    pub(crate) fn sent_actions(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|request| request["action"].as_str().unwrap_or_default().to_owned())
            .collect()
    }

    pub(crate) fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub(crate) fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }

    pub(crate) fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn handle(&self, text: &str) -> Vec<Reply> {
        let request: Value = serde_json::from_str(text).expect("request is JSON");
        self.sent.lock().expect("sent lock").push(request.clone());
        (self.responder.lock().expect("responder lock"))(&request)
    }

    fn went_live(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_live.fetch_max(now, Ordering::SeqCst);
    }

    fn went_down(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Builds [`FakeWorker`]s sharing one [`FakeServer`].
#[derive(Clone)]
pub(crate) struct FakeFactory {
    server: Arc<FakeServer>,
}

impl FakeFactory {
    pub(crate) fn new(server: &Arc<FakeServer>) -> Self {
        Self {
            server: Arc::clone(server),
        }
    }
}

impl std::fmt::Debug for FakeFactory {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("FakeFactory")
    }
}

impl WorkerFactory for FakeFactory {
    fn create(
        &self,
        _endpoint: &ServerEndpoint,
        _security: Security,
        channels: WorkerChannels,
    ) -> Box<dyn TransportWorker> {
        self.server.created.fetch_add(1, Ordering::SeqCst);
        Box::new(FakeWorker {
            server: Arc::clone(&self.server),
            channels: Some(channels),
            connected: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }
}

/// Worker thread that answers requests through the server's responder.
pub(crate) struct FakeWorker {
    server: Arc<FakeServer>,
    channels: Option<WorkerChannels>,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TransportWorker for FakeWorker {
    fn start(&mut self) -> Result<(), BridgeError> {
        if self.server.fail_start.load(Ordering::SeqCst) {
            return Err(BridgeError::transport("fake worker refused to start"));
        }
        let channels = self.channels.take().expect("started once");
        if self.server.refuse.load(Ordering::SeqCst) {
            return Ok(());
        }

        let server = Arc::clone(&self.server);
        let connected = Arc::clone(&self.connected);
        let stop = Arc::clone(&self.stop);
        server.went_live();
        connected.store(true, Ordering::SeqCst);
        self.handle = Some(thread::spawn(move || {
            serve(&server, &channels, &stop);
            connected.store(false, Ordering::SeqCst);
            server.went_down();
        }));
        Ok(())
    }

    fn stop_comm(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake worker thread");
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

fn serve(server: &FakeServer, channels: &WorkerChannels, stop: &AtomicBool) {
    while !stop.load(Ordering::SeqCst) {
        let text = match channels.outbound.recv_timeout(Duration::from_millis(5)) {
            Ok(text) => text,
            Err(RecvTimeoutError::Timeout) => continue,
            Err(RecvTimeoutError::Disconnected) => return,
        };
        for reply in server.handle(&text) {
            match reply {
                Reply::Send(body) => {
                    if channels.inbound.send(Inbound::Message(body)).is_err() {
                        return;
                    }
                }
                Reply::Fail(reason) => {
                    let _ = channels.inbound.send(Inbound::Failure(reason));
                    return;
                }
                Reply::Hangup => return,
            }
        }
    }
}

/// Configuration with short polling so failed connects end quickly.
pub(crate) fn fast_config() -> Config {
    Config {
        connect_poll_interval_ms: 1,
        connect_poll_attempts: 5,
        request_timeout_ms: 2_000,
        ..Config::default()
    }
}

/// A connected session over a fake server.
pub(crate) fn connected_session(server: &Arc<FakeServer>) -> Session<FakeFactory> {
    let mut session = Session::with_factory(FakeFactory::new(server), &fast_config());
    let state = session.connect(Security::Insecure);
    assert!(state.is_connected(), "fake connect should succeed");
    session
}

/// Waits until `condition` holds or a second passes.
pub(crate) fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

/// Tree `{a: {children: {b: {children: {c: {}}}}}}`.
pub(crate) fn nested_tree() -> Value {
    json!({"a": {"children": {"b": {"children": {"c": {}}}}}})
}
