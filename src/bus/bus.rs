//! # Bus: the publish/subscribe engine and its hierarchy links.
//!
//! A [`Bus`] holds a weak listener registry, a dispatch strategy, at most
//! one parent link, and a weak list of children (buses whose parent it
//! is). Buses are cheap-to-clone handles over a shared core.
//!
//! ## Publish protocol
//! ```text
//! publish(payload, scope)
//!   └─► Event::new(payload, self.id, scope)
//!         └─► publish_event(&event)
//!               ├─ event.mark_published(self.id)    — no-op if already recorded
//!               ├─ dispatch snapshot locally        — Sync or Async strategy
//!               ├─ relay DOWN to children           — unconditional, history-guarded
//!               └─ relay UP to parent               — Global scope only,
//!                                                     parent snapshotted once
//! ```
//!
//! ## Rules
//! - The **same event instance** flows through the graph; the publication
//!   history guards against re-processing, so cyclic and diamond-shaped
//!   hierarchies terminate and each bus processes an instance at most once.
//! - Each bus guards only its own state (registry, parent slot, children
//!   list) under narrow locks; no lock is held while invoking handlers or
//!   relaying to another bus, so hierarchy-wide fan-out cannot deadlock.
//! - The parent reference is snapshotted once per publish: re-parenting a
//!   bus while a publish is in flight neither loses nor duplicates that
//!   delivery.
//!
//! ## Example
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use treebus::{Bus, Capabilities, Event, Listen, Scope};
//!
//! #[derive(Default)]
//! struct Tally(AtomicUsize);
//!
//! impl Listen for Tally {
//!     fn capabilities(caps: &mut Capabilities<Self>) {
//!         caps.on(|t: &Tally, _ev: &Event, _n: &u32| {
//!             t.0.fetch_add(1, Ordering::Relaxed);
//!             Ok(())
//!         });
//!     }
//! }
//!
//! let parent = Bus::synchronous();
//! let child = Bus::synchronous();
//! child.set_parent(Some(&parent));
//!
//! let tally = Arc::new(Tally::default());
//! parent.register(&tally);
//!
//! child.publish(7u32, Scope::Global).unwrap();
//! assert_eq!(tally.0.load(Ordering::Relaxed), 1);
//!
//! child.publish(7u32, Scope::Local).unwrap();
//! assert_eq!(tally.0.load(Ordering::Relaxed), 1); // local stays on the child
//! ```

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::debug;

use super::dispatch::{Dispatch, SyncDispatch};
use crate::error::{BusError, HandlerFailure};
use crate::events::{BusId, Event, Scope};
use crate::listeners::{Listen, Registry};

/// Shared state of one bus.
struct BusCore {
    id: BusId,
    name: Arc<str>,
    registry: Registry,
    dispatch: Arc<dyn Dispatch>,
    /// At most one parent; read via snapshot once per publish.
    parent: Mutex<Option<Bus>>,
    /// Buses whose parent is this bus, held weakly.
    children: Mutex<Vec<Weak<BusCore>>>,
}

/// A node in the pub/sub hierarchy.
///
/// Cloning a `Bus` clones the handle; all clones share one core. Equality
/// is identity: two handles are equal when they refer to the same bus.
#[derive(Clone)]
pub struct Bus {
    core: Arc<BusCore>,
}

impl Bus {
    /// Creates a bus with the synchronous dispatch strategy.
    pub fn synchronous() -> Self {
        Self::builder().build()
    }

    /// Creates a bus with the asynchronous dispatch strategy, backed by
    /// the current tokio runtime.
    ///
    /// Fails with [`BusError::NoRuntime`] outside a runtime.
    pub fn asynchronous() -> Result<Self, BusError> {
        let dispatch = super::dispatch::AsyncDispatch::new()?;
        Ok(Self::builder().with_dispatch(Arc::new(dispatch)).build())
    }

    /// Starts building a bus with a custom name and/or dispatch strategy.
    pub fn builder() -> BusBuilder {
        BusBuilder::default()
    }

    /// Returns this bus's process-unique identity.
    #[inline]
    pub fn id(&self) -> BusId {
        self.core.id
    }

    /// Returns this bus's human-readable name (for logs).
    #[inline]
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Registers a listener, computing its capability set.
    ///
    /// The registration is weak: it never keeps the listener alive.
    /// Registering the same listener again replaces its capability set.
    pub fn register<L: Listen>(&self, listener: &Arc<L>) {
        self.core.registry.register(listener);
        debug!(
            bus = self.core.name.as_ref(),
            listener = listener.name(),
            "listener registered"
        );
    }

    /// Unregisters a listener; unknown listeners are a no-op.
    ///
    /// After this call returns, subsequent publishes deliver nothing to
    /// the listener — even if it was registered moments before.
    pub fn unregister<L: Listen>(&self, listener: &Arc<L>) {
        self.core.registry.unregister(listener);
        debug!(
            bus = self.core.name.as_ref(),
            listener = listener.name(),
            "listener unregistered"
        );
    }

    /// Number of live listener registrations (diagnostic aid).
    pub fn listener_count(&self) -> usize {
        self.core.registry.len()
    }

    /// Wraps `payload` into a fresh [`Event`] originating here and
    /// publishes it.
    ///
    /// With [`SyncDispatch`] every matching local handler has run when
    /// this returns; with [`AsyncDispatch`](super::dispatch::AsyncDispatch)
    /// only the enqueue has happened.
    pub fn publish<P>(&self, payload: P, scope: Scope) -> Result<(), BusError>
    where
        P: Send + Sync + 'static,
    {
        self.publish_event(&Event::new(payload, self.core.id, scope))
    }

    /// Publishes a pre-built event.
    ///
    /// If this bus already appears in the event's publication history the
    /// call is a silent no-op — this is the guard that makes propagation
    /// across cyclic or repeatedly-linked hierarchies terminate, and it
    /// also suppresses a second publication of the same instance on any
    /// bus that has already processed it.
    pub fn publish_event(&self, event: &Event) -> Result<(), BusError> {
        let failures = self.deliver(event);
        if failures.is_empty() {
            Ok(())
        } else {
            Err(BusError::Dispatch { failures })
        }
    }

    /// Sets (or clears) the parent bus.
    ///
    /// Atomically under this bus's own lock: unlinks from the previous
    /// parent's children list, installs the new parent, and links into the
    /// new parent's children list. Events published on the parent ripple
    /// down to this bus from then on.
    pub fn set_parent(&self, parent: Option<&Bus>) {
        let mut slot = self.core.parent.lock();
        if let Some(old) = slot.take() {
            old.remove_child(self.core.id);
        }
        if let Some(new) = parent {
            new.add_child(&self.core);
            *slot = Some(new.clone());
        }
        debug!(
            bus = self.core.name.as_ref(),
            parent = parent.map(|p| p.core.name.as_ref().to_string()),
            "parent changed"
        );
    }

    /// Returns the current parent bus, if any (synchronized read).
    pub fn parent(&self) -> Option<Bus> {
        self.core.parent.lock().clone()
    }

    /// Processes the event here and relays it through the hierarchy,
    /// accumulating handler failures from every bus it visits.
    fn deliver(&self, event: &Event) -> Vec<HandlerFailure> {
        if !event.mark_published(self.core.id) {
            debug!(
                bus = self.core.name.as_ref(),
                payload = event.payload_type_name(),
                "event already published here; skipping"
            );
            return Vec::new();
        }

        debug!(
            bus = self.core.name.as_ref(),
            payload = event.payload_type_name(),
            scope = event.scope().as_label(),
            strategy = self.core.dispatch.as_label(),
            "publishing event"
        );

        let targets = self.core.registry.snapshot();
        let mut failures = self.core.dispatch.dispatch(event, targets);

        // Downward ripple is unconditional: parent-originated events reach
        // the children regardless of scope.
        for child in self.children() {
            if !event.was_published_on(child.id()) {
                failures.extend(child.deliver(event));
            }
        }

        if event.scope().propagates_upward() {
            // Snapshot the parent once so a concurrent set_parent cannot
            // lose or duplicate this in-flight delivery.
            if let Some(parent) = self.parent() {
                failures.extend(parent.deliver(event));
            }
        }

        failures
    }

    /// Live children snapshot, purging reclaimed entries.
    fn children(&self) -> Vec<Bus> {
        let mut children = self.core.children.lock();
        children.retain(|c| c.strong_count() > 0);
        children
            .iter()
            .filter_map(Weak::upgrade)
            .map(|core| Bus { core })
            .collect()
    }

    fn add_child(&self, child: &Arc<BusCore>) {
        let mut children = self.core.children.lock();
        children.retain(|c| c.strong_count() > 0);
        if !children
            .iter()
            .filter_map(Weak::upgrade)
            .any(|c| c.id == child.id)
        {
            children.push(Arc::downgrade(child));
        }
    }

    fn remove_child(&self, id: BusId) {
        self.core
            .children
            .lock()
            .retain(|c| c.upgrade().map(|c| c.id != id).unwrap_or(false));
    }
}

impl PartialEq for Bus {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.core, &other.core)
    }
}

impl Eq for Bus {}

impl fmt::Debug for Bus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bus")
            .field("id", &self.core.id)
            .field("name", &self.core.name)
            .field("strategy", &self.core.dispatch.as_label())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Bus`].
///
/// Defaults: auto-generated name `bus-{id}`, [`SyncDispatch`] strategy.
#[derive(Default)]
pub struct BusBuilder {
    name: Option<String>,
    dispatch: Option<Arc<dyn Dispatch>>,
}

impl BusBuilder {
    /// Sets the bus name used in logs and `Debug` output.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the dispatch strategy (default: [`SyncDispatch`]).
    pub fn with_dispatch(mut self, dispatch: Arc<dyn Dispatch>) -> Self {
        self.dispatch = Some(dispatch);
        self
    }

    /// Builds the bus.
    pub fn build(self) -> Bus {
        let id = BusId::next();
        let name: Arc<str> = match self.name {
            Some(name) => name.into(),
            None => format!("bus-{id}").into(),
        };
        Bus {
            core: Arc::new(BusCore {
                id,
                name,
                registry: Registry::new(),
                dispatch: self.dispatch.unwrap_or_else(|| Arc::new(SyncDispatch)),
                parent: Mutex::new(None),
                children: Mutex::new(Vec::new()),
            }),
        }
    }
}
