//! Session bridge between an interactive VSS shell and a VSS server.
//!
//! The bridge owns a single WebSocket connection run by a background
//! [`TransportWorker`], turns each command into exactly one request whose
//! reply is routed back to the caller, and caches the server's signal
//! metadata tree for path lookup and completion.
//!
//! [`Session`] is the entry point. It is driven from one command thread;
//! [`Canceller`] handles may be moved to other threads to abort a pending
//! request.

mod correlator;
mod error;
mod lifecycle;
mod message;
mod metadata;
mod resolver;
mod session;
mod websocket;
mod worker;

#[cfg(test)]
mod tests;

pub use correlator::{CORRELATOR_TARGET, Canceller, Correlator, MAX_STRAY_REPLIES, PendingRequest};
pub use error::BridgeError;
pub use lifecycle::{ConnectionManager, ConnectionState, LIFECYCLE_TARGET, PollPolicy};
pub use message::{Action, Request, RequestIdSequence, RequestParams, Response};
pub use metadata::{ChildMap, METADATA_TARGET, MetadataCache, MetadataNode};
pub use resolver::{CompletionCandidate, Resolution, children_of, complete, resolve};
pub use session::{FULL_TREE_PATH, Session};
pub use websocket::{WebSocketFactory, WebSocketSettings, WebSocketWorker};
pub use worker::{
    Inbound, Security, SessionChannels, TransportWorker, WORKER_TARGET, WorkerChannels,
    WorkerFactory, channel_pair,
};
