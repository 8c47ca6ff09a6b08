//! # Listener registry: weak, identity-keyed, snapshot-consistent.
//!
//! The per-bus [`Registry`] maps each registered listener to its erased
//! handler table. Entries hold the listener **weakly**: the registry is
//! never the reason a listener stays alive, so forgetting to unregister
//! does not leak it — the entry is purged once no external owner remains.
//!
//! ## Rules
//! - Keyed by listener identity (the `Arc` allocation), not by value:
//!   registering two clones of one `Arc` is one entry; re-registering
//!   replaces the capability set.
//! - `snapshot()` returns the targets as of that instant. A publish call
//!   dispatches to that snapshot; concurrent (un)registrations are visible
//!   only to subsequent publishes.
//! - Dead entries are purged on registration and on every snapshot.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::capability::{Capabilities, ErasedHandler, Listen};
use crate::error::HandlerFailure;
use crate::events::Event;

/// A registry entry: weak target plus its fixed handler table.
struct Entry {
    name: &'static str,
    target: Weak<dyn Any + Send + Sync>,
    handlers: Arc<[ErasedHandler]>,
}

/// One dispatch unit produced by [`Registry::snapshot`].
///
/// Holds the listener weakly; [`DispatchTarget::invoke`] upgrades at
/// invocation time, so a listener reclaimed between snapshot and
/// invocation silently contributes no invocation.
#[derive(Clone)]
pub struct DispatchTarget {
    name: &'static str,
    target: Weak<dyn Any + Send + Sync>,
    handlers: Arc<[ErasedHandler]>,
}

impl DispatchTarget {
    /// Returns the listener name (for logs and failure reports).
    pub fn listener_name(&self) -> &'static str {
        self.name
    }

    /// Returns `true` when at least one handler accepts the event's
    /// payload type.
    pub fn supports(&self, event: &Event) -> bool {
        let payload_type = event.payload_type();
        self.handlers.iter().any(|h| h.accepts.matches(payload_type))
    }

    /// Invokes every matching handler, collecting failures.
    ///
    /// Returns an empty vec when the listener is gone or no handler
    /// matched. One failing handler does not stop the remaining handlers
    /// of the same listener.
    pub fn invoke(&self, event: &Event) -> Vec<HandlerFailure> {
        let Some(listener) = self.target.upgrade() else {
            return Vec::new();
        };
        let payload_type = event.payload_type();
        let mut failures = Vec::new();
        for handler in self.handlers.iter().filter(|h| h.accepts.matches(payload_type)) {
            if let Err(error) = (handler.invoke)(listener.as_ref(), event) {
                failures.push(HandlerFailure {
                    listener: self.name,
                    payload_type: event.payload_type_name(),
                    error,
                });
            }
        }
        failures
    }
}

/// Weak, identity-keyed listener registry of one bus.
pub(crate) struct Registry {
    entries: Mutex<HashMap<usize, Entry>>,
}

impl Registry {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Computes the listener's capability set and stores/overwrites the
    /// weak entry.
    pub(crate) fn register<L: Listen>(&self, listener: &Arc<L>) {
        let mut caps = Capabilities::<L>::new();
        L::capabilities(&mut caps);
        let handlers = caps.into_erased();

        let erased: Arc<dyn Any + Send + Sync> = listener.clone();
        let entry = Entry {
            name: listener.name(),
            target: Arc::downgrade(&erased),
            handlers,
        };

        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.target.strong_count() > 0);
        entries.insert(Self::key(listener), entry);
    }

    /// Removes the listener's entry; unknown listeners are a no-op.
    pub(crate) fn unregister<L: Listen>(&self, listener: &Arc<L>) {
        self.entries.lock().remove(&Self::key(listener));
    }

    /// Returns the dispatch targets as of this instant, purging entries
    /// whose listener has been reclaimed.
    pub(crate) fn snapshot(&self) -> Vec<DispatchTarget> {
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.target.strong_count() > 0);
        entries
            .values()
            .map(|e| DispatchTarget {
                name: e.name,
                target: Weak::clone(&e.target),
                handlers: Arc::clone(&e.handlers),
            })
            .collect()
    }

    /// Number of live entries (test/diagnostic aid).
    pub(crate) fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|_, e| e.target.strong_count() > 0);
        entries.len()
    }

    #[inline]
    fn key<L>(listener: &Arc<L>) -> usize {
        Arc::as_ptr(listener) as *const () as usize
    }
}
