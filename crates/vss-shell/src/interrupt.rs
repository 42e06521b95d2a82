//! Forwarding of Ctrl-C to the pending request.
//!
//! While the line editor owns the terminal, Ctrl-C arrives as a key press and
//! clears the line. While a request is in flight the terminal is in cooked
//! mode, so Ctrl-C raises `SIGINT`; the watcher turns that into a
//! cancellation of the pending wait. With nothing pending, as during a batch
//! or between commands, `SIGINT` ends the process as it normally would.

use std::io;

use vss_bridge::Canceller;

/// Target for interrupt watcher events.
const INTERRUPT_TARGET: &str = "vss_shell::interrupt";

/// What a `SIGINT` should do right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum InterruptAction {
    /// Abort the request awaiting its reply.
    Cancel,
    /// Fall back to the default handler.
    Terminate,
}

pub(crate) fn interrupt_action(canceller: &Canceller) -> InterruptAction {
    if canceller.is_waiting() {
        InterruptAction::Cancel
    } else {
        InterruptAction::Terminate
    }
}

/// Stops the watcher thread when dropped.
#[derive(Debug)]
pub(crate) struct InterruptGuard {
    #[cfg(unix)]
    handle: signal_hook::iterator::Handle,
    #[cfg(unix)]
    thread: Option<std::thread::JoinHandle<()>>,
}

/// Starts a thread that cancels the pending request on each `SIGINT`.
#[cfg(unix)]
pub(crate) fn forward_interrupts(canceller: Canceller) -> io::Result<InterruptGuard> {
    use signal_hook::consts::signal::SIGINT;
    use signal_hook::iterator::Signals;
    use signal_hook::low_level::emulate_default_handler;

    let mut signals = Signals::new([SIGINT])?;
    let handle = signals.handle();
    let thread = std::thread::Builder::new()
        .name("vss-interrupt".to_owned())
        .spawn(move || {
            for signal in signals.forever() {
                match interrupt_action(&canceller) {
                    InterruptAction::Cancel => {
                        tracing::debug!(
                            target: INTERRUPT_TARGET,
                            signal,
                            "cancelling pending request"
                        );
                        canceller.cancel();
                    }
                    InterruptAction::Terminate => {
                        tracing::debug!(target: INTERRUPT_TARGET, signal, "no request pending");
                        if let Err(error) = emulate_default_handler(signal) {
                            tracing::warn!(
                                target: INTERRUPT_TARGET,
                                %error,
                                "default handler failed"
                            );
                        }
                    }
                }
            }
        })?;
    Ok(InterruptGuard {
        handle,
        thread: Some(thread),
    })
}

/// Without `SIGINT` forwarding the default handler ends the process.
#[cfg(not(unix))]
pub(crate) fn forward_interrupts(canceller: Canceller) -> io::Result<InterruptGuard> {
    drop(canceller);
    tracing::debug!(target: INTERRUPT_TARGET, "interrupt forwarding unavailable");
    Ok(InterruptGuard {})
}

#[cfg(unix)]
impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take()
            && thread.join().is_err()
        {
            tracing::warn!(target: INTERRUPT_TARGET, "interrupt watcher panicked");
        }
    }
}
