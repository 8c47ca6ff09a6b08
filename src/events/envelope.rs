//! # Event envelope: payload, scope, timestamp, publication history.
//!
//! [`Event`] is the immutable envelope that travels through the bus
//! hierarchy. It is a cheap-to-clone handle (internally `Arc`-backed), so
//! the **same event instance** flows through every bus that relays it —
//! which is exactly what the publication history keys on.
//!
//! ## Publication history
//! Every bus that processes the event appends its [`BusId`] to the event's
//! history, atomically, via [`Event::mark_published`]. The history is:
//! - **ordered**: the first entry is the bus that first published the event;
//! - **append-only**: entries are never removed or reordered;
//! - **deduplicated**: a bus id appears at most once.
//!
//! The history is the cycle guard of the propagation protocol: a bus that
//! finds itself already recorded skips the event entirely, so cyclic or
//! diamond-shaped hierarchies terminate and every bus processes a given
//! instance at most once.
//!
//! ## Payload typing
//! The payload is type-erased at construction; its concrete [`TypeId`] and
//! type name are captured so dispatch can match handlers without knowing
//! the payload type statically. Two events created from equal payloads are
//! independent instances with independent histories — only re-delivery of
//! the *same instance* is suppressed.

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;

use super::scope::Scope;

/// Global sequence counter for bus identities.
static BUS_SEQ: AtomicU64 = AtomicU64::new(0);

/// Process-unique identity of a bus, used in publication histories.
///
/// Ids are drawn from a global monotonic counter, so they are unique for
/// the lifetime of the process and stable for the lifetime of the bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BusId(u64);

impl BusId {
    /// Allocates the next unique bus id.
    pub(crate) fn next() -> Self {
        BusId(BUS_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Returns the raw numeric value (for logs and diagnostics).
    #[inline]
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for BusId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

struct EventInner {
    payload: Arc<dyn Any + Send + Sync>,
    payload_type: TypeId,
    payload_type_name: &'static str,
    scope: Scope,
    at: SystemTime,
    origin: BusId,
    /// Ordered, append-only record of buses that processed this instance.
    history: Mutex<Vec<BusId>>,
}

/// Immutable event envelope with a shared, internally-synchronized
/// publication history.
///
/// Cloning an `Event` clones the handle, not the envelope: all clones share
/// the same payload and the same history. Buses relay the same instance, so
/// the history guard sees every hop.
///
/// ### Example
/// ```
/// use treebus::{Bus, Event, Scope};
///
/// let bus = Bus::synchronous();
/// let event = Event::new("hello".to_string(), bus.id(), Scope::Local);
///
/// assert!(event.payload_is::<String>());
/// assert_eq!(event.payload_ref::<String>().map(String::as_str), Some("hello"));
/// assert_eq!(event.scope(), Scope::Local);
/// assert!(event.publication_history().is_empty()); // not yet published
/// ```
#[derive(Clone)]
pub struct Event {
    inner: Arc<EventInner>,
}

impl Event {
    /// Creates a new event wrapping `payload` for the bus identified by
    /// `origin`, with the given propagation `scope`.
    ///
    /// The payload's concrete type is captured here; the creation timestamp
    /// is taken from the wall clock. The publication history starts empty
    /// and records the origin bus when the event is first published —
    /// [`Bus::publish`](crate::Bus::publish) does both steps in one call.
    pub fn new<P>(payload: P, origin: BusId, scope: Scope) -> Self
    where
        P: Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(EventInner {
                payload: Arc::new(payload),
                payload_type: TypeId::of::<P>(),
                payload_type_name: std::any::type_name::<P>(),
                scope,
                at: SystemTime::now(),
                origin,
                history: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Returns a reference to the payload, if it is of type `P`.
    #[inline]
    pub fn payload_ref<P: 'static>(&self) -> Option<&P> {
        self.inner.payload.downcast_ref::<P>()
    }

    /// Returns a shared handle to the payload, if it is of type `P`.
    #[inline]
    pub fn payload<P: Send + Sync + 'static>(&self) -> Option<Arc<P>> {
        Arc::clone(&self.inner.payload).downcast::<P>().ok()
    }

    /// Returns `true` when the payload is of type `P`.
    #[inline]
    pub fn payload_is<P: 'static>(&self) -> bool {
        self.inner.payload_type == TypeId::of::<P>()
    }

    /// Returns the [`TypeId`] of the payload's concrete type.
    #[inline]
    pub fn payload_type(&self) -> TypeId {
        self.inner.payload_type
    }

    /// Returns the payload's concrete type name (for logs and failures).
    #[inline]
    pub fn payload_type_name(&self) -> &'static str {
        self.inner.payload_type_name
    }

    /// Returns the propagation scope, fixed at creation.
    #[inline]
    pub fn scope(&self) -> Scope {
        self.inner.scope
    }

    /// Returns the wall-clock instant the event was created.
    #[inline]
    pub fn at(&self) -> SystemTime {
        self.inner.at
    }

    /// Returns the id of the bus the event was created for.
    ///
    /// In normal use this equals the first entry of the publication
    /// history once the event has been published.
    #[inline]
    pub fn origin(&self) -> BusId {
        self.inner.origin
    }

    /// Returns a defensive copy of the publication history.
    ///
    /// The first entry is the bus that first published the event; each bus
    /// appears at most once, in processing order.
    pub fn publication_history(&self) -> Vec<BusId> {
        self.inner.history.lock().clone()
    }

    /// Returns `true` when the bus identified by `id` has already
    /// processed this event instance.
    pub fn was_published_on(&self, id: BusId) -> bool {
        self.inner.history.lock().contains(&id)
    }

    /// Atomically records `id` in the publication history.
    ///
    /// Returns `true` when the id was newly appended, `false` when the bus
    /// had already processed this instance. The check-and-append runs under
    /// the history lock, so concurrent publishes crossing the same
    /// hierarchy cannot record a bus twice or corrupt the ordering.
    pub(crate) fn mark_published(&self, id: BusId) -> bool {
        let mut history = self.inner.history.lock();
        if history.contains(&id) {
            false
        } else {
            history.push(id);
            true
        }
    }

    /// Returns `true` when `other` is the same event instance.
    #[inline]
    pub fn same_instance(&self, other: &Event) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("payload_type", &self.inner.payload_type_name)
            .field("scope", &self.inner.scope)
            .field("origin", &self.inner.origin)
            .field("history", &*self.inner.history.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_type_captured_at_construction() {
        let ev = Event::new(42i32, BusId::next(), Scope::Local);
        assert!(ev.payload_is::<i32>());
        assert!(!ev.payload_is::<String>());
        assert_eq!(ev.payload_ref::<i32>(), Some(&42));
        assert_eq!(ev.payload_ref::<String>(), None);
        assert_eq!(ev.payload_type(), TypeId::of::<i32>());
    }

    #[test]
    fn test_payload_arc_downcast() {
        let ev = Event::new("hi".to_string(), BusId::next(), Scope::Global);
        let payload = ev.payload::<String>().expect("string payload");
        assert_eq!(payload.as_str(), "hi");
        assert!(ev.payload::<i32>().is_none());
    }

    #[test]
    fn test_mark_published_is_idempotent_per_bus() {
        let a = BusId::next();
        let b = BusId::next();
        let ev = Event::new((), a, Scope::Global);

        assert!(ev.mark_published(a));
        assert!(!ev.mark_published(a), "second mark on the same bus is a no-op");
        assert!(ev.mark_published(b));

        assert_eq!(ev.publication_history(), vec![a, b]);
        assert!(ev.was_published_on(a));
        assert!(ev.was_published_on(b));
        assert!(!ev.was_published_on(BusId::next()));
    }

    #[test]
    fn test_history_copy_is_defensive() {
        let a = BusId::next();
        let ev = Event::new((), a, Scope::Local);
        ev.mark_published(a);

        let mut copy = ev.publication_history();
        copy.clear();
        assert_eq!(ev.publication_history(), vec![a]);
    }

    #[test]
    fn test_clones_share_one_history() {
        let a = BusId::next();
        let ev = Event::new((), a, Scope::Global);
        let clone = ev.clone();

        assert!(ev.same_instance(&clone));
        assert!(ev.mark_published(a));
        assert!(!clone.mark_published(a), "clone shares the history");
    }

    #[test]
    fn test_equal_payloads_are_independent_instances() {
        let a = BusId::next();
        let first = Event::new("dup".to_string(), a, Scope::Global);
        let second = Event::new("dup".to_string(), a, Scope::Global);

        assert!(!first.same_instance(&second));
        assert!(first.mark_published(a));
        assert!(second.mark_published(a), "independent history per instance");
    }
}
