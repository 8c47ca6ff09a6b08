//! # PersistentBus: save/restore for a bus and its durable listeners.
//!
//! The core bus holds listeners weakly and knows nothing about storage.
//! [`PersistentBus`] wraps a bus and keeps a strong record per durable
//! listener: the listener itself (so registration alone keeps it alive)
//! plus a capture-time closure that encodes its state. [`save`] walks the
//! records and the durable parent chain into a [`BusSnapshot`];
//! [`restore`] rebuilds fresh buses and listeners from one, guided by a
//! [`ListenerCodec`](super::ListenerCodec).
//!
//! ## Rules
//! - Transient registrations ([`register_transient`], and anything
//!   registered directly on the inner bus) never appear in snapshots.
//! - A restored graph contains new bus and listener instances; identities
//!   ([`BusId`](crate::BusId)s, `Arc` pointers) are not preserved, state is.
//! - The parent chain is snapshotted recursively, but only through parents
//!   attached with [`set_parent`]; [`set_transient_parent`] wires the
//!   hierarchy without entering the snapshot.
//!
//! [`save`]: PersistentBus::save
//! [`restore`]: PersistentBus::restore
//! [`register_transient`]: PersistentBus::register_transient
//! [`set_parent`]: PersistentBus::set_parent
//! [`set_transient_parent`]: PersistentBus::set_transient_parent

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use super::codec::{ListenerCodec, PersistListen};
use super::snapshot::{BusSnapshot, ListenerRecord};
use crate::bus::Bus;
use crate::error::{BusError, PersistError};
use crate::events::{Event, Scope};
use crate::listeners::Listen;

/// Produces buses during [`PersistentBus::restore`].
///
/// Implemented for any `Fn() -> Bus`, so `&Bus::synchronous` is a valid
/// factory. Restore calls it once per bus in the snapshot's parent chain.
pub trait BusFactory: Send + Sync {
    /// Creates one fresh, empty bus.
    fn create(&self) -> Bus;
}

impl<F> BusFactory for F
where
    F: Fn() -> Bus + Send + Sync,
{
    fn create(&self) -> Bus {
        self()
    }
}

/// Strong record of one durable listener.
pub(crate) struct PersistRecord {
    tag: &'static str,
    /// Keeps the listener alive for as long as the record exists.
    listener: Arc<dyn Any + Send + Sync>,
    save: Box<dyn Fn() -> Result<serde_json::Value, PersistError> + Send + Sync>,
}

impl PersistRecord {
    /// Captures a strong record; the closure borrows nothing, it owns its
    /// own `Arc` so encoding works however long the record lives.
    pub(crate) fn capture<L: PersistListen>(listener: &Arc<L>) -> Self {
        let for_save = Arc::clone(listener);
        Self {
            tag: L::TAG,
            listener: Arc::clone(listener) as Arc<dyn Any + Send + Sync>,
            save: Box::new(move || {
                serde_json::to_value(&*for_save).map_err(|source| PersistError::Encode { source })
            }),
        }
    }

    #[inline]
    pub(crate) fn tag(&self) -> &'static str {
        self.tag
    }

    /// Identity key: the listener's `Arc` data pointer.
    fn key(&self) -> usize {
        Arc::as_ptr(&self.listener) as *const () as usize
    }

    fn encode(&self) -> Result<ListenerRecord, PersistError> {
        Ok(ListenerRecord {
            tag: self.tag.to_string(),
            state: (self.save)()?,
        })
    }
}

impl fmt::Debug for PersistRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistRecord")
            .field("tag", &self.tag)
            .finish_non_exhaustive()
    }
}

struct State {
    /// Durable records in registration order.
    records: Vec<PersistRecord>,
    /// Durable parent; `None` when detached or transient.
    parent: Option<PersistentBus>,
}

struct Shared {
    bus: Bus,
    state: Mutex<State>,
}

/// A bus wrapper whose durable listeners and parent chain survive
/// save/restore cycles.
///
/// Cloning is cheap and shares state, mirroring [`Bus`].
#[derive(Clone)]
pub struct PersistentBus {
    shared: Arc<Shared>,
}

impl PersistentBus {
    /// Wraps an existing bus. Listeners already registered on it are
    /// transient: they work but never enter snapshots.
    pub fn new(bus: Bus) -> Self {
        Self {
            shared: Arc::new(Shared {
                bus,
                state: Mutex::new(State {
                    records: Vec::new(),
                    parent: None,
                }),
            }),
        }
    }

    /// Persistent wrapper over a fresh synchronous bus.
    pub fn synchronous() -> Self {
        Self::new(Bus::synchronous())
    }

    /// Persistent wrapper over a fresh asynchronous bus.
    pub fn asynchronous() -> Result<Self, BusError> {
        Ok(Self::new(Bus::asynchronous()?))
    }

    /// Returns a handle to the wrapped bus.
    #[inline]
    pub fn bus(&self) -> Bus {
        self.shared.bus.clone()
    }

    /// Registers a durable listener.
    ///
    /// Unlike plain bus registration this holds the listener strongly:
    /// the caller may drop its own `Arc` and the listener stays live and
    /// snapshot-visible until [`unregister`](Self::unregister).
    pub fn register<L: PersistListen>(&self, listener: &Arc<L>) {
        self.shared.bus.register(listener);
        let record = PersistRecord::capture(listener);
        debug!(
            bus = self.shared.bus.name(),
            listener = listener.name(),
            tag = record.tag(),
            "durable listener registered"
        );
        let mut state = self.shared.state.lock();
        state.records.retain(|r| r.key() != record.key());
        state.records.push(record);
    }

    /// Registers a listener that participates in dispatch but is dropped
    /// from snapshots, like an attached debugger or metrics probe.
    pub fn register_transient<L: Listen>(&self, listener: &Arc<L>) {
        self.shared.bus.register(listener);
    }

    /// Unregisters a listener, durable or transient.
    pub fn unregister<L: Listen>(&self, listener: &Arc<L>) {
        let key = Arc::as_ptr(listener) as *const () as usize;
        self.shared.state.lock().records.retain(|r| r.key() != key);
        self.shared.bus.unregister(listener);
    }

    /// Sets (or clears) a durable parent: the hierarchy link is wired on
    /// the inner buses and the parent is captured in future snapshots.
    pub fn set_parent(&self, parent: Option<&PersistentBus>) {
        let parent_bus = parent.map(PersistentBus::bus);
        let mut state = self.shared.state.lock();
        self.shared.bus.set_parent(parent_bus.as_ref());
        state.parent = parent.cloned();
    }

    /// Wires a parent on the inner bus only; snapshots record no parent.
    pub fn set_transient_parent(&self, parent: Option<&Bus>) {
        let mut state = self.shared.state.lock();
        self.shared.bus.set_parent(parent);
        state.parent = None;
    }

    /// Publishes a payload on the wrapped bus.
    pub fn publish<P>(&self, payload: P, scope: Scope) -> Result<(), BusError>
    where
        P: Send + Sync + 'static,
    {
        self.shared.bus.publish(payload, scope)
    }

    /// Publishes a pre-built event on the wrapped bus.
    pub fn publish_event(&self, event: &Event) -> Result<(), BusError> {
        self.shared.bus.publish_event(event)
    }

    /// Captures the durable listeners and parent chain as plain data.
    pub fn save(&self) -> Result<BusSnapshot, PersistError> {
        let (listeners, parent) = {
            let state = self.shared.state.lock();
            let mut listeners = Vec::with_capacity(state.records.len());
            for record in &state.records {
                listeners.push(record.encode()?);
            }
            (listeners, state.parent.clone())
        };
        // Recurse outside our own lock; the chain is walked child first.
        let parent = match parent {
            Some(p) => Some(Box::new(p.save()?)),
            None => None,
        };
        debug!(
            bus = self.shared.bus.name(),
            listeners = listeners.len(),
            has_parent = parent.is_some(),
            "bus state captured"
        );
        Ok(BusSnapshot { listeners, parent })
    }

    /// Rebuilds a bus graph from a snapshot.
    ///
    /// The factory supplies one fresh bus per node; the codec rebuilds
    /// and registers each durable listener. Fails on the first unknown
    /// tag or undecodable state, leaving nothing half-wired observable.
    pub fn restore(
        snapshot: BusSnapshot,
        factory: &dyn BusFactory,
        codec: &ListenerCodec,
    ) -> Result<Self, PersistError> {
        let bus = factory.create();
        let mut records = Vec::with_capacity(snapshot.listeners.len());
        for record in &snapshot.listeners {
            records.push(codec.decode(record, &bus)?);
        }
        let parent = match snapshot.parent {
            Some(p) => Some(Self::restore(*p, factory, codec)?),
            None => None,
        };
        if let Some(p) = &parent {
            bus.set_parent(Some(&p.shared.bus));
        }
        debug!(
            bus = bus.name(),
            listeners = records.len(),
            "bus state restored"
        );
        Ok(Self {
            shared: Arc::new(Shared {
                bus,
                state: Mutex::new(State { records, parent }),
            }),
        })
    }
}

impl fmt::Debug for PersistentBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.state.lock();
        f.debug_struct("PersistentBus")
            .field("bus", &self.shared.bus)
            .field("durable_listeners", &state.records.len())
            .field("has_durable_parent", &state.parent.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::listeners::Capabilities;

    #[derive(Default, Serialize, Deserialize)]
    struct Counter {
        hits: AtomicU64,
    }

    impl Listen for Counter {
        fn capabilities(caps: &mut Capabilities<Self>) {
            caps.on(|c: &Counter, _ev: &Event, _s: &String| {
                c.hits.fetch_add(1, Ordering::Relaxed);
                Ok(())
            });
        }

        fn name(&self) -> &'static str {
            "counter"
        }
    }

    impl PersistListen for Counter {
        const TAG: &'static str = "counter";
    }

    fn codec() -> ListenerCodec {
        ListenerCodec::new().with::<Counter>()
    }

    #[test]
    fn test_round_trip_preserves_listener_state() {
        let bus = PersistentBus::synchronous();
        let counter = Arc::new(Counter::default());
        bus.register(&counter);

        bus.publish("one".to_string(), Scope::Local).unwrap();
        bus.publish("two".to_string(), Scope::Local).unwrap();

        // Through an actual wire format, not just the in-memory snapshot.
        let text = serde_json::to_string(&bus.save().unwrap()).unwrap();
        let snapshot: BusSnapshot = serde_json::from_str(&text).unwrap();

        let restored = PersistentBus::restore(snapshot, &Bus::synchronous, &codec()).unwrap();
        restored.publish("three".to_string(), Scope::Local).unwrap();

        let again = restored.save().unwrap();
        assert_eq!(again.listeners.len(), 1);
        assert_eq!(again.listeners[0].state["hits"], 3, "2 saved + 1 after restore");
    }

    #[test]
    fn test_transient_listeners_are_dropped_from_snapshots() {
        let bus = PersistentBus::synchronous();
        let durable = Arc::new(Counter::default());
        let transient = Arc::new(Counter::default());
        bus.register(&durable);
        bus.register_transient(&transient);

        bus.publish("both".to_string(), Scope::Local).unwrap();
        assert_eq!(transient.hits.load(Ordering::Relaxed), 1, "transient still dispatches");

        let snapshot = bus.save().unwrap();
        assert_eq!(snapshot.listeners.len(), 1, "only the durable one is captured");
    }

    #[test]
    fn test_durable_registration_keeps_the_listener_alive() {
        let bus = PersistentBus::synchronous();
        let counter = Arc::new(Counter::default());
        bus.register(&counter);
        drop(counter);

        bus.publish("still here".to_string(), Scope::Local).unwrap();
        let snapshot = bus.save().unwrap();
        assert_eq!(snapshot.listeners[0].state["hits"], 1);
    }

    #[test]
    fn test_unregister_removes_the_durable_record() {
        let bus = PersistentBus::synchronous();
        let counter = Arc::new(Counter::default());
        bus.register(&counter);
        bus.unregister(&counter);

        bus.publish("nobody".to_string(), Scope::Local).unwrap();
        assert_eq!(counter.hits.load(Ordering::Relaxed), 0);
        assert!(bus.save().unwrap().listeners.is_empty());
    }

    #[test]
    fn test_parent_chain_round_trips() {
        let parent = PersistentBus::synchronous();
        let child = PersistentBus::synchronous();
        child.set_parent(Some(&parent));

        let upstream = Arc::new(Counter::default());
        parent.register(&upstream);

        child.publish("up".to_string(), Scope::Global).unwrap();
        assert_eq!(upstream.hits.load(Ordering::Relaxed), 1);

        let snapshot = child.save().unwrap();
        let restored = PersistentBus::restore(snapshot, &Bus::synchronous, &codec()).unwrap();

        restored.publish("up again".to_string(), Scope::Global).unwrap();
        let again = restored.save().unwrap();
        let parent_again = again.parent.expect("durable parent captured");
        assert_eq!(parent_again.listeners[0].state["hits"], 2, "1 saved + 1 after restore");
    }

    #[test]
    fn test_transient_parent_is_not_captured() {
        let parent = Bus::synchronous();
        let child = PersistentBus::synchronous();
        child.set_transient_parent(Some(&parent));

        assert_eq!(child.bus().parent(), Some(parent), "hierarchy is wired");
        assert!(child.save().unwrap().parent.is_none());
    }

    #[test]
    fn test_debug_reports_durable_shape() {
        let bus = PersistentBus::synchronous();
        let counter = Arc::new(Counter::default());
        bus.register(&counter);

        let rendered = format!("{bus:?}");
        assert!(rendered.contains("durable_listeners: 1"));
        assert!(rendered.contains("has_durable_parent: false"));
    }

    #[test]
    fn test_restore_fails_on_unknown_tag() {
        let snapshot = BusSnapshot {
            listeners: vec![ListenerRecord {
                tag: "forgotten".to_string(),
                state: serde_json::Value::Null,
            }],
            parent: None,
        };

        let err =
            PersistentBus::restore(snapshot, &Bus::synchronous, &ListenerCodec::new()).unwrap_err();
        assert_eq!(err.as_label(), "persist_unknown_tag");
    }
}
