//! Request/response correlation.
//!
//! Each request is pushed onto the worker's outbound queue and the calling
//! thread then waits for the one reply that belongs to it. Replies carrying a
//! different `requestId` are logged and skipped; replies without a usable
//! identifier are treated as the answer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, Sender, at, never, select};
use tracing::{debug, warn};
use vss_config::RequestIdMode;

use crate::error::BridgeError;
use crate::message::{Action, RequestIdSequence, RequestParams, Response};
use crate::worker::{Inbound, SessionChannels};

/// Tracing target for request correlation.
pub const CORRELATOR_TARGET: &str = "vss_bridge::correlator";

/// Maximum number of foreign replies skipped while waiting for one request.
pub const MAX_STRAY_REPLIES: usize = 100;

/// A request that has been pushed and still awaits its reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a pushed request must be awaited"]
pub struct PendingRequest {
    request_id: i64,
    action: Action,
}

impl PendingRequest {
    /// Identifier the reply is expected to echo.
    #[must_use]
    pub const fn request_id(self) -> i64 {
        self.request_id
    }
}

/// Cloneable handle that aborts the request currently being awaited.
#[derive(Debug, Clone)]
pub struct Canceller {
    signal: Sender<()>,
    waiting: Arc<AtomicBool>,
}

impl Canceller {
    pub(crate) fn new(signal: Sender<()>) -> Self {
        Self {
            signal,
            waiting: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a request is currently awaiting its reply.
    #[must_use]
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Marks a wait as in progress until the returned guard drops.
    pub(crate) fn begin_wait(&self) -> WaitGuard {
        self.waiting.store(true, Ordering::SeqCst);
        WaitGuard(Arc::clone(&self.waiting))
    }

    /// Cancels the pending wait, if any. Signals raised while nothing is
    /// pending are discarded before the next request is sent.
    pub fn cancel(&self) {
        if self.signal.send(()).is_err() {
            debug!(target: CORRELATOR_TARGET, "session dropped; nothing to cancel");
        }
    }
}

/// Clears the waiting flag of a [`Canceller`] on drop.
#[derive(Debug)]
pub(crate) struct WaitGuard(Arc<AtomicBool>);

impl Drop for WaitGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Assigns request identifiers and matches replies to requests.
#[derive(Debug, Clone)]
pub struct Correlator {
    ids: RequestIdSequence,
    timeout: Option<Duration>,
}

impl Correlator {
    /// Creates a correlator. `timeout` of `None` waits without bound.
    #[must_use]
    pub const fn new(mode: RequestIdMode, timeout: Option<Duration>) -> Self {
        Self {
            ids: RequestIdSequence::new(mode),
            timeout,
        }
    }

    /// Serialises a request and queues it for the worker.
    ///
    /// Cancellation signals left over from earlier requests are discarded
    /// first.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Codec`] if the request cannot be serialised and
    /// [`BridgeError::TransportFailure`] if the worker has gone away.
    pub fn push(
        &mut self,
        channels: &SessionChannels,
        cancel: &Receiver<()>,
        action: Action,
        params: RequestParams,
    ) -> Result<PendingRequest, BridgeError> {
        let stale = cancel.try_iter().count();
        if stale > 0 {
            debug!(target: CORRELATOR_TARGET, stale, "discarded stale cancellation signals");
        }

        let request_id = self.ids.next_for(action);
        let payload = params.into_request(request_id, action).to_json()?;
        debug!(
            target: CORRELATOR_TARGET,
            request_id,
            %action,
            "sending request"
        );
        channels
            .outbound
            .send(payload)
            .map_err(|_| BridgeError::transport("transport worker has stopped"))?;
        Ok(PendingRequest { request_id, action })
    }

    /// Blocks until the reply for `pending` arrives.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Timeout`] when the deadline passes,
    /// [`BridgeError::Cancelled`] when a [`Canceller`] fires, and
    /// [`BridgeError::TransportFailure`] when the worker fails, stops, or
    /// floods the session with replies for other requests.
    pub fn await_reply(
        &self,
        channels: &SessionChannels,
        cancel: &Receiver<()>,
        pending: PendingRequest,
    ) -> Result<Response, BridgeError> {
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut strays = 0_usize;
        loop {
            let text = self.next_message(channels, cancel, deadline)?;
            let response = Response::new(text);
            match response.request_id() {
                Some(found) if found != pending.request_id => {
                    strays += 1;
                    warn!(
                        target: CORRELATOR_TARGET,
                        expected = pending.request_id,
                        found,
                        "skipping reply for another request"
                    );
                    if strays >= MAX_STRAY_REPLIES {
                        return Err(BridgeError::transport(format!(
                            "no reply for request {} after {MAX_STRAY_REPLIES} unrelated messages",
                            pending.request_id
                        )));
                    }
                }
                _ => {
                    debug!(
                        target: CORRELATOR_TARGET,
                        request_id = pending.request_id,
                        action = %pending.action,
                        bytes = response.as_str().len(),
                        "received reply"
                    );
                    return Ok(response);
                }
            }
        }
    }

    /// Pushes a request and waits for its reply.
    ///
    /// # Errors
    ///
    /// Propagates the errors of [`Self::push`] and [`Self::await_reply`].
    pub fn exchange(
        &mut self,
        channels: &SessionChannels,
        cancel: &Receiver<()>,
        action: Action,
        params: RequestParams,
    ) -> Result<Response, BridgeError> {
        let pending = self.push(channels, cancel, action, params)?;
        self.await_reply(channels, cancel, pending)
    }

    fn next_message(
        &self,
        channels: &SessionChannels,
        cancel: &Receiver<()>,
        deadline: Option<Instant>,
    ) -> Result<String, BridgeError> {
        let timer = deadline.map_or_else(never, at);
        select! {
            recv(channels.inbound) -> event => match event {
                Ok(Inbound::Message(text)) => Ok(text),
                Ok(Inbound::Failure(reason)) => Err(BridgeError::transport(reason)),
                Err(_) => Err(BridgeError::transport("connection closed")),
            },
            recv(cancel) -> _ => {
                debug!(target: CORRELATOR_TARGET, "request cancelled");
                Err(BridgeError::Cancelled)
            },
            recv(timer) -> _ => Err(BridgeError::Timeout {
                timeout_ms: self.timeout_ms(),
            }),
        }
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout
            .map_or(0, |timeout| u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX))
    }
}
