//! # Dispatch strategies: synchronous and asynchronous delivery.
//!
//! [`Dispatch`] is the policy seam between the publish protocol and handler
//! invocation. Both shipped policies operate over the same matching logic
//! ([`DispatchTarget::supports`] / [`DispatchTarget::invoke`]); they differ
//! only in **where** and **when** the invocation happens.
//!
//! ## Policies
//! - [`SyncDispatch`] — invokes matching handlers on the calling thread,
//!   before `publish` returns. Failures are collected across the full
//!   fan-out and surfaced to the publisher in one error; one failing
//!   listener never suppresses delivery to its siblings.
//! - [`AsyncDispatch`] — submits one independent unit of work per matching
//!   listener to the tokio blocking pool (an elastic, reusable pool) and
//!   returns immediately. No ordering between listeners, no completion
//!   signal, no cancellation primitive: a long-running handler cannot be
//!   aborted once dispatched. Failures and panics are confined to the
//!   single worker task and reported via `tracing`.
//!
//! ## Rules
//! - Both policies upgrade the listener's weak reference at invocation
//!   time: a listener reclaimed between snapshot and invocation silently
//!   contributes no invocation.
//! - The snapshot passed in is already consistent; strategies never touch
//!   the registry.

use std::panic::{catch_unwind, AssertUnwindSafe};

use tokio::runtime::Handle;
use tracing::{error, warn};

use crate::error::{BusError, HandlerFailure};
use crate::events::Event;
use crate::listeners::DispatchTarget;

/// Delivery policy for locally dispatching one event to a listener
/// snapshot.
///
/// Implementations must not assume any ordering of `targets` and must not
/// hold locks across handler invocations (the bus passed an owned
/// snapshot precisely so they do not have to).
pub trait Dispatch: Send + Sync + 'static {
    /// Delivers `event` to every supporting target.
    ///
    /// Returns the failures to surface to the publisher; fire-and-forget
    /// policies return an empty vec and report elsewhere.
    fn dispatch(&self, event: &Event, targets: Vec<DispatchTarget>) -> Vec<HandlerFailure>;

    /// Returns a short stable label (snake_case) for use in logs.
    fn as_label(&self) -> &'static str;
}

/// Fully sequential dispatch on the publishing thread.
///
/// `publish` does not return until every matching handler of every live
/// listener has been invoked. Iteration order over listeners is
/// unspecified.
#[derive(Clone, Copy, Debug, Default)]
pub struct SyncDispatch;

impl Dispatch for SyncDispatch {
    fn dispatch(&self, event: &Event, targets: Vec<DispatchTarget>) -> Vec<HandlerFailure> {
        let mut failures = Vec::new();
        for target in targets {
            if target.supports(event) {
                failures.extend(target.invoke(event));
            }
        }
        failures
    }

    fn as_label(&self) -> &'static str {
        "sync"
    }
}

/// Fire-and-forget dispatch on the tokio blocking pool.
///
/// One worker unit per matching listener; `publish` returns after the
/// units are enqueued, with no guarantee any handler has run yet. Tests
/// must poll/await for completion rather than assert immediately.
///
/// The runtime handle acts as the pluggable pool: [`AsyncDispatch::new`]
/// captures the ambient runtime, [`AsyncDispatch::with_handle`] injects a
/// specific one.
#[derive(Clone, Debug)]
pub struct AsyncDispatch {
    handle: Handle,
}

impl AsyncDispatch {
    /// Captures the current tokio runtime as the worker pool.
    ///
    /// Fails with [`BusError::NoRuntime`] when called outside a runtime.
    pub fn new() -> Result<Self, BusError> {
        Handle::try_current()
            .map(|handle| Self { handle })
            .map_err(|_| BusError::NoRuntime)
    }

    /// Uses the given runtime handle as the worker pool.
    pub fn with_handle(handle: Handle) -> Self {
        Self { handle }
    }
}

impl Dispatch for AsyncDispatch {
    fn dispatch(&self, event: &Event, targets: Vec<DispatchTarget>) -> Vec<HandlerFailure> {
        for target in targets {
            if !target.supports(event) {
                continue;
            }
            let event = event.clone();
            self.handle.spawn_blocking(move || {
                match catch_unwind(AssertUnwindSafe(|| target.invoke(&event))) {
                    Ok(failures) => {
                        for failure in &failures {
                            warn!(
                                listener = failure.listener,
                                payload = failure.payload_type,
                                error = %failure.error,
                                "handler failed during asynchronous dispatch"
                            );
                        }
                    }
                    Err(panic) => {
                        error!(
                            listener = target.listener_name(),
                            payload = event.payload_type_name(),
                            panic = panic_message(&panic),
                            "handler panicked during asynchronous dispatch"
                        );
                    }
                }
            });
        }
        Vec::new()
    }

    fn as_label(&self) -> &'static str {
        "async"
    }
}

/// Best-effort extraction of a panic payload message.
fn panic_message(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::{Duration, Instant};

    use super::*;
    use crate::error::HandlerError;
    use crate::events::Scope;
    use crate::listeners::{Capabilities, Listen};

    #[derive(Default)]
    struct Flaky {
        ok_hits: AtomicUsize,
    }

    impl Listen for Flaky {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.on(|_f: &Flaky, _ev: &Event, _s: &String| {
                Err(HandlerError::msg("broken handler"))
            });
            caps.on_any(|f: &Flaky, _ev: &Event| {
                f.ok_hits.fetch_add(1, Ordering::Relaxed);
                Ok(())
            });
        }

        fn name(&self) -> &'static str {
            "flaky"
        }
    }

    #[derive(Default)]
    struct Slowpoke {
        hits: Arc<AtomicUsize>,
    }

    impl Listen for Slowpoke {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.on(|s: &Slowpoke, _ev: &Event, _p: &String| {
                std::thread::sleep(Duration::from_millis(10));
                s.hits.fetch_add(1, Ordering::Relaxed);
                Ok(())
            });
        }

        fn name(&self) -> &'static str {
            "slowpoke"
        }
    }

    fn targets_for<L: Listen>(listener: &Arc<L>) -> Vec<DispatchTarget> {
        let registry = crate::listeners::Registry::new();
        registry.register(listener);
        registry.snapshot()
    }

    #[test]
    fn test_sync_failure_does_not_suppress_other_handlers() {
        let flaky = Arc::new(Flaky::default());
        let event = Event::new("hi".to_string(), crate::events::BusId::next(), Scope::Local);

        let failures = SyncDispatch.dispatch(&event, targets_for(&flaky));

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].listener, "flaky");
        assert_eq!(failures[0].error.message(), "broken handler");
        // The catch-all still ran after the failing typed handler.
        assert_eq!(flaky.ok_hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_returns_before_completion_and_delivers_eventually() {
        let slow = Arc::new(Slowpoke::default());
        let hits = Arc::clone(&slow.hits);
        let event = Event::new("go".to_string(), crate::events::BusId::next(), Scope::Local);

        let dispatch = AsyncDispatch::new().unwrap();
        let failures = dispatch.dispatch(&event, targets_for(&slow));
        assert!(failures.is_empty(), "fire-and-forget reports nothing");

        // Poll for completion instead of asserting immediately.
        let deadline = Instant::now() + Duration::from_secs(5);
        while hits.load(Ordering::Relaxed) == 0 {
            assert!(Instant::now() < deadline, "handler never ran");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(hits.load(Ordering::Relaxed), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_async_failures_are_confined_to_the_worker() {
        let flaky = Arc::new(Flaky::default());
        let event = Event::new("hi".to_string(), crate::events::BusId::next(), Scope::Local);

        let dispatch = AsyncDispatch::new().unwrap();
        assert!(dispatch.dispatch(&event, targets_for(&flaky)).is_empty());

        let deadline = Instant::now() + Duration::from_secs(5);
        while flaky.ok_hits.load(Ordering::Relaxed) == 0 {
            assert!(Instant::now() < deadline, "surviving handler never ran");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    #[test]
    fn test_no_runtime_error() {
        let err = AsyncDispatch::new().unwrap_err();
        assert_eq!(err.as_label(), "bus_no_runtime");
    }

    #[test]
    fn test_strategy_labels() {
        assert_eq!(SyncDispatch.as_label(), "sync");
    }
}
