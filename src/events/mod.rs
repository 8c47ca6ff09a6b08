//! Event model: envelope, scope and bus identity.
//!
//! This module groups the event **data model** used by the publish/subscribe
//! engine: the immutable [`Event`] envelope with its internally-synchronized
//! publication history, the propagation [`Scope`], and the [`BusId`]
//! identity that histories are recorded against.
//!
//! ## Contents
//! - [`Event`] type-erased payload + scope + timestamp + publication history
//! - [`Scope`] local vs. global propagation
//! - [`BusId`] process-unique bus identity
//!
//! ## Quick reference
//! - **Producers**: [`Bus::publish`](crate::Bus::publish) wraps a payload
//!   into a fresh envelope; pre-built envelopes go through
//!   [`Bus::publish_event`](crate::Bus::publish_event).
//! - **Consumers**: handler callbacks receive `&Event` next to the typed
//!   payload; relaying buses use the history guard internally.
//!
//! See `bus/mod.rs` for the propagation protocol.

mod envelope;
mod scope;

pub use envelope::{BusId, Event};
pub use scope::Scope;
