//! Correlator tests driven directly over a channel pair.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, unbounded};
use rstest::{fixture, rstest};
use serde_json::{Value, json};
use vss_config::RequestIdMode;

use crate::correlator::{Canceller, Correlator, MAX_STRAY_REPLIES};
use crate::error::BridgeError;
use crate::message::{Action, RequestParams};
use crate::worker::{Inbound, SessionChannels, WorkerChannels, channel_pair};

struct Harness {
    session: SessionChannels,
    worker: WorkerChannels,
    canceller: Canceller,
    cancelled: Receiver<()>,
}

#[fixture]
fn harness() -> Harness {
    let (session, worker) = channel_pair();
    let (signal, cancelled) = unbounded();
    Harness {
        session,
        worker,
        canceller: Canceller::new(signal),
        cancelled,
    }
}

fn correlator(timeout: Option<Duration>) -> Correlator {
    Correlator::new(RequestIdMode::Sequential, timeout)
}

fn reply_for(request_id: i64, value: &str) -> Inbound {
    Inbound::Message(json!({"requestId": request_id, "value": value}).to_string())
}

#[rstest]
fn reply_is_returned_verbatim(harness: Harness) {
    let mut correlator = correlator(Some(Duration::from_secs(1)));
    let raw = r#"{"action":"get","requestId":1,  "value":"88"}"#;
    harness
        .worker
        .inbound
        .send(Inbound::Message(raw.to_owned()))
        .expect("queue reply");

    let response = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect("reply");

    assert_eq!(response.as_str(), raw);
    let sent: Value =
        serde_json::from_str(&harness.worker.outbound.recv().expect("request")).expect("json");
    assert_eq!(
        sent,
        json!({"requestId": 1, "action": "get", "path": "Vehicle.Speed"})
    );
}

#[rstest]
fn replies_for_other_requests_are_skipped(harness: Harness) {
    let mut correlator = correlator(Some(Duration::from_secs(1)));
    harness.worker.inbound.send(reply_for(99, "stale")).expect("stray");
    harness.worker.inbound.send(reply_for(1, "fresh")).expect("reply");

    let response = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect("reply");

    assert!(response.as_str().contains("fresh"));
}

#[rstest]
fn too_many_stray_replies_fail_the_request(harness: Harness) {
    let mut correlator = correlator(None);
    for _ in 0..MAX_STRAY_REPLIES {
        harness.worker.inbound.send(reply_for(500, "noise")).expect("stray");
    }

    let error = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect_err("stray flood");

    assert!(matches!(error, BridgeError::TransportFailure { .. }));
}

#[rstest]
#[case("not json at all")]
#[case(r#"{"action":"get","value":"1"}"#)]
#[case(r#"{"requestId":"abc"}"#)]
fn replies_without_usable_id_are_accepted(harness: Harness, #[case] raw: &str) {
    let mut correlator = correlator(Some(Duration::from_secs(1)));
    harness
        .worker
        .inbound
        .send(Inbound::Message(raw.to_owned()))
        .expect("reply");

    let response = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect("reply");

    assert_eq!(response.as_str(), raw);
}

#[rstest]
fn silent_server_times_out(harness: Harness) {
    let mut correlator = correlator(Some(Duration::from_millis(30)));

    let error = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect_err("no reply");

    assert!(matches!(error, BridgeError::Timeout { timeout_ms: 30 }));
}

#[rstest]
fn canceller_aborts_pending_wait(harness: Harness) {
    let mut correlator = correlator(None);
    let canceller = harness.canceller.clone();
    let trigger = thread::spawn(move || {
        thread::sleep(Duration::from_millis(20));
        canceller.cancel();
    });

    let error = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect_err("cancelled");
    trigger.join().expect("cancel thread");

    assert!(matches!(error, BridgeError::Cancelled));
}

#[rstest]
fn stale_cancellation_is_discarded(harness: Harness) {
    let mut correlator = correlator(Some(Duration::from_secs(1)));
    harness.canceller.cancel();
    harness.canceller.cancel();
    harness.worker.inbound.send(reply_for(1, "ok")).expect("reply");

    let response = correlator.exchange(
        &harness.session,
        &harness.cancelled,
        Action::Get,
        RequestParams::path("Vehicle.Speed"),
    );

    assert!(response.is_ok());
}

#[rstest]
fn worker_failure_ends_wait(harness: Harness) {
    let mut correlator = correlator(None);
    harness
        .worker
        .inbound
        .send(Inbound::Failure("reset by peer".to_owned()))
        .expect("failure");

    let error = correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect_err("failure");

    assert!(matches!(error, BridgeError::TransportFailure { reason } if reason == "reset by peer"));
}

#[rstest]
fn dropped_worker_ends_wait(harness: Harness) {
    let mut correlator = correlator(None);
    let Harness {
        session,
        worker,
        cancelled,
        ..
    } = harness;
    let WorkerChannels { outbound, inbound } = worker;
    drop(inbound);

    let error = correlator
        .exchange(
            &session,
            &cancelled,
            Action::Get,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect_err("closed");

    assert!(matches!(error, BridgeError::TransportFailure { .. }));
    assert!(outbound.try_recv().is_ok(), "request was still pushed");
}

#[rstest]
fn per_action_mode_sends_legacy_tags(harness: Harness) {
    let mut correlator = Correlator::new(RequestIdMode::PerAction, Some(Duration::from_secs(1)));
    harness.worker.inbound.send(reply_for(1235, "ok")).expect("reply");

    correlator
        .exchange(
            &harness.session,
            &harness.cancelled,
            Action::Set,
            RequestParams::path("Vehicle.Speed"),
        )
        .expect("reply");

    let sent: Value =
        serde_json::from_str(&harness.worker.outbound.recv().expect("request")).expect("json");
    assert_eq!(sent["requestId"], json!(1235));
}
