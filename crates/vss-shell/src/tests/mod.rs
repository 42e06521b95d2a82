//! Crate-level tests driving the shell against an in-process fake server.


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::{Value, json};
use vss_bridge::{
    BridgeError, Inbound, Security, Session, TransportWorker, WorkerChannels, WorkerFactory,
};
use vss_config::{Config, ServerEndpoint};

use crate::IoStreams;
use crate::shell::Shell;

/// A cooperative server answering every request, plus a log of what it saw.
#[derive(Debug)]
pub(crate) struct FakeServer {
    tree: Value,
    sent: Mutex<Vec<Value>>,
    refuse: AtomicBool,
}

impl FakeServer {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            tree: vehicle_tree(),
            sent: Mutex::new(Vec::new()),
            refuse: AtomicBool::new(false),
        })
    }

    pub(crate) fn refuse_connections(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<Value> {
        self.sent.lock().expect("sent log").clone()
    }

    pub(crate) fn sent_actions(&self) -> Vec<String> {
        self.sent()
            .iter()
            .filter_map(|request| request["action"].as_str().map(str::to_owned))
            .collect()
    }

    fn reply_to(&self, request: &Value) -> String {
        self.sent.lock().expect("sent log").push(request.clone());
        let reply = if request["action"] == "getMetadata" {
            json!({
                "action": "getMetadata",
                "requestId": request["requestId"],
                "metadata": self.tree,
            })
        } else {
            json!({
                "action": request["action"],
                "requestId": request["requestId"],
                "path": request["path"],
                "value": "42",
            })
        };
        reply.to_string()
    }
}

/// `Vehicle` with a described `Speed` leaf and a `Cabin` branch.
pub(crate) fn vehicle_tree() -> Value {
    json!({
        "Vehicle": {
            "description": "High-level vehicle data.",
            "children": {
                "Speed": {"description": "Vehicle speed.", "type": "float"},
                "Cabin": {
                    "description": "All in-cabin components.",
                    "children": {
                        "Light": {"type": "boolean"}
                    }
                }
            }
        }
    })
}

#[derive(Debug)]
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

impl WorkerFactory for FakeFactory {
    fn create(
        &self,
        _endpoint: &ServerEndpoint,
        _security: Security,
        channels: WorkerChannels,
    ) -> Box<dyn TransportWorker> {
        Box::new(FakeWorker {
            server: Arc::clone(&self.server),
            channels: Some(channels),
            connected: Arc::new(AtomicBool::new(false)),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        })
    }
}

struct FakeWorker {
    server: Arc<FakeServer>,
    channels: Option<WorkerChannels>,
    connected: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl TransportWorker for FakeWorker {
    fn start(&mut self) -> Result<(), BridgeError> {
        if self.server.refuse.load(Ordering::SeqCst) {
            return Ok(());
        }
        let channels = self.channels.take().expect("started once");
        let server = Arc::clone(&self.server);
        let connected = Arc::clone(&self.connected);
        let stop = Arc::clone(&self.stop);
        connected.store(true, Ordering::SeqCst);
        self.handle = Some(thread::spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                let Ok(text) = channels.outbound.recv_timeout(Duration::from_millis(5)) else {
                    continue;
                };
                let request: Value = serde_json::from_str(&text).expect("request JSON");
                let reply = server.reply_to(&request);
                if channels.inbound.send(Inbound::Message(reply)).is_err() {
                    break;
                }
            }
            connected.store(false, Ordering::SeqCst);
        }));
        Ok(())
    }

    fn stop_comm(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.join().expect("fake worker thread");
        }
        self.connected.store(false, Ordering::SeqCst);
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// Configuration with a tiny connect budget so refusals fail fast.
pub(crate) fn fast_config() -> Config {
    Config {
        connect_poll_interval_ms: 1,
        connect_poll_attempts: 5,
        request_timeout_ms: 2_000,
        ..Config::default()
    }
}

pub(crate) fn fake_session(server: &Arc<FakeServer>) -> Session<FakeFactory> {
    Session::with_factory(FakeFactory::new(server), &fast_config())
}

pub(crate) fn fake_shell(server: &Arc<FakeServer>) -> Shell<FakeFactory> {
    Shell::new(fake_session(server), Security::Secure)
}

/// Captured stdout and stderr of one or more commands.
#[derive(Debug, Default)]
pub(crate) struct Captured {
    pub(crate) stdout: Vec<u8>,
    pub(crate) stderr: Vec<u8>,
}

impl Captured {
    pub(crate) fn streams(&mut self) -> IoStreams<'_, Vec<u8>, Vec<u8>> {
        IoStreams::new(&mut self.stdout, &mut self.stderr)
    }

    pub(crate) fn stdout_text(&self) -> String {
        String::from_utf8(self.stdout.clone()).expect("stdout utf8")
    }

    pub(crate) fn stderr_text(&self) -> String {
        String::from_utf8(self.stderr.clone()).expect("stderr utf8")
    }
}
