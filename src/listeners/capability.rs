//! # Capability declaration: the static dispatch table of a listener.
//!
//! Provides [`Listen`], the extension point for plugging event handlers
//! into a bus, and [`Capabilities`], the builder a listener fills in once
//! at registration time.
//!
//! Instead of scanning methods at runtime, a listener declares an explicit
//! list of (payload type, callback) pairs:
//! - [`Capabilities::on`] registers a handler for one concrete payload type;
//! - [`Capabilities::on_any`] registers a catch-all that receives **every**
//!   payload — the covariant "handler for the universal type" case.
//!
//! ## Rules
//! - The capability set is computed once when the listener is registered;
//!   re-registering a listener replaces its previous set.
//! - A listener with zero handlers is legal; it simply never receives events.
//! - A handler supports an event when its declared payload type equals the
//!   event's runtime payload type, or when it is a catch-all.
//! - Handler failures never prevent delivery to other handlers; see
//!   `bus/dispatch.rs` for the reporting policy.
//!
//! ## Example
//! ```
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use treebus::{Capabilities, Event, Listen};
//!
//! #[derive(Default)]
//! struct Audit {
//!     strings: AtomicUsize,
//!     anything: AtomicUsize,
//! }
//!
//! impl Listen for Audit {
//!     fn capabilities(caps: &mut Capabilities<Self>) {
//!         caps.on(|audit: &Audit, _event: &Event, _text: &String| {
//!             audit.strings.fetch_add(1, Ordering::Relaxed);
//!             Ok(())
//!         });
//!         caps.on_any(|audit: &Audit, _event: &Event| {
//!             audit.anything.fetch_add(1, Ordering::Relaxed);
//!             Ok(())
//!         });
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "audit"
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::sync::Arc;

use crate::error::HandlerError;
use crate::events::Event;

/// A listener type whose handler set is declared statically.
///
/// Any `Send + Sync + 'static` type can implement `Listen`. The bus stores
/// registered listeners weakly: registration never keeps a listener alive,
/// so forgetting to unregister does not leak it.
pub trait Listen: Send + Sync + 'static {
    /// Declares the listener's handlers.
    ///
    /// Called once per registration; the resulting set is fixed until the
    /// listener is registered again.
    fn capabilities(caps: &mut Capabilities<Self>)
    where
        Self: Sized;

    /// Returns the listener name used in logs and failure reports.
    ///
    /// Prefer short, descriptive names (e.g., "audit", "metrics").
    /// The default uses `type_name::<Self>()`, which can be verbose -
    /// override it when possible.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// What payload types a handler accepts.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Accepts {
    /// Exactly one concrete payload type.
    Only(TypeId),
    /// Every payload (catch-all).
    AnyPayload,
}

impl Accepts {
    #[inline]
    pub(crate) fn matches(&self, payload_type: TypeId) -> bool {
        match self {
            Accepts::Only(id) => *id == payload_type,
            Accepts::AnyPayload => true,
        }
    }
}

/// One declared handler, still typed by the listener.
struct TypedHandler<L> {
    accepts: Accepts,
    #[allow(clippy::type_complexity)]
    invoke: Box<dyn Fn(&L, &Event) -> Result<(), HandlerError> + Send + Sync>,
}

/// A handler with the listener type erased, ready for the registry.
///
/// The invoke closure downcasts the target back to the concrete listener
/// type it was built for; a mismatch (impossible by construction) is a
/// silent no-op.
#[derive(Clone)]
pub(crate) struct ErasedHandler {
    pub(crate) accepts: Accepts,
    #[allow(clippy::type_complexity)]
    pub(crate) invoke:
        Arc<dyn Fn(&(dyn Any + Send + Sync), &Event) -> Result<(), HandlerError> + Send + Sync>,
}

/// Builder for a listener's handler set.
///
/// Filled in by [`Listen::capabilities`]; consumed by the registry when the
/// listener is registered.
pub struct Capabilities<L> {
    handlers: Vec<TypedHandler<L>>,
}

impl<L: Listen> Capabilities<L> {
    pub(crate) fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Registers a handler for payload type `P`.
    ///
    /// The handler receives the listener, the full [`Event`] envelope, and
    /// the typed payload. It is invoked once per matching event per bus the
    /// listener is registered on.
    pub fn on<P, F>(&mut self, handler: F) -> &mut Self
    where
        P: Send + Sync + 'static,
        F: Fn(&L, &Event, &P) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(TypedHandler {
            accepts: Accepts::Only(TypeId::of::<P>()),
            invoke: Box::new(move |listener, event| match event.payload_ref::<P>() {
                Some(payload) => handler(listener, event, payload),
                // Filtered out by `accepts` before invocation.
                None => Ok(()),
            }),
        });
        self
    }

    /// Registers a catch-all handler invoked for every payload type.
    ///
    /// This is the covariant-supertype case: a single broad handler that
    /// observes every event published on the bus. Use
    /// [`Event::payload_ref`] inside the handler to probe for types of
    /// interest.
    pub fn on_any<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&L, &Event) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.handlers.push(TypedHandler {
            accepts: Accepts::AnyPayload,
            invoke: Box::new(handler),
        });
        self
    }

    /// Returns the number of declared handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Returns `true` when no handlers are declared.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Erases the listener type, producing the registry's handler table.
    pub(crate) fn into_erased(self) -> Arc<[ErasedHandler]> {
        self.handlers
            .into_iter()
            .map(|handler| {
                let invoke = handler.invoke;
                ErasedHandler {
                    accepts: handler.accepts,
                    invoke: Arc::new(
                        move |target: &(dyn Any + Send + Sync), event: &Event| {
                            match target.downcast_ref::<L>() {
                                Some(listener) => invoke(listener, event),
                                None => Ok(()),
                            }
                        },
                    ),
                }
            })
            .collect()
    }
}
