//! # treebus
//!
//! **Treebus** is an in-process, hierarchical publish/subscribe event bus
//! for Rust.
//!
//! Buses form a tree (or any directed graph): each bus dispatches to its
//! own listeners and relays events along its parent and child links. A
//! publication-history guard makes every delivery at-most-once per bus,
//! so cycles and diamonds are safe to build.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                        ┌───────────────┐
//!                        │  parent Bus   │ ◄── Global events climb up
//!                        │  (registry)   │
//!                        └──────┬────────┘
//!              every event      │      every event
//!              ripples down ┌───┴────┐ ripples down
//!                           ▼        ▼
//!                  ┌────────────┐  ┌────────────┐
//!                  │ child Bus  │  │ child Bus  │
//!                  │ (registry) │  │ (registry) │
//!                  └─────┬──────┘  └─────┬──────┘
//!                        ▼               ▼
//!                  DispatchTarget   DispatchTarget
//!                  (weak listener   (weak listener
//!                   + handlers)      + handlers)
//! ```
//!
//! ### One publish call
//! ```text
//! bus.publish(payload, scope)
//!   ├─► wrap payload in Event { origin, scope, timestamp, history }
//!   ├─► mark this bus in the history (skip everything if already there)
//!   ├─► dispatch to local listeners whose capabilities match the
//!   │   payload type (SyncDispatch inline / AsyncDispatch on the
//!   │   tokio blocking pool)
//!   ├─► relay to every child bus, whatever the scope
//!   └─► relay to the parent bus, Global scope only
//! ```
//!
//! ## Features
//! | Area            | Description                                                  | Key types / traits                        |
//! |-----------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Events**      | Typed payload, scope, origin and publication history.        | [`Event`], [`Scope`], [`BusId`]            |
//! | **Listeners**   | Declare per-payload-type handlers plus a catch-all.          | [`Listen`], [`Capabilities`]               |
//! | **Hierarchy**   | Parent/child bus links with cycle-safe propagation.          | [`Bus`], [`BusBuilder`]                    |
//! | **Dispatch**    | Inline or tokio-pool handler invocation, pluggable.          | [`Dispatch`], [`SyncDispatch`], [`AsyncDispatch`] |
//! | **Context**     | A scoped ambient "current bus" for deeply nested code.       | [`context::enter`], [`ScopedBus`]          |
//! | **Errors**      | Typed publisher-facing and handler-facing errors.            | [`BusError`], [`HandlerError`]             |
//!
//! ## Optional features
//! - `persist` _(default)_: save/restore of buses and durable listeners
//!   via serde ([`PersistentBus`], [`ListenerCodec`]).
//!
//! ## Example
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use treebus::{Bus, Capabilities, Event, Listen, Scope};
//!
//! struct OrderPlaced {
//!     total_cents: u64,
//! }
//!
//! #[derive(Default)]
//! struct Billing {
//!     charged: AtomicUsize,
//! }
//!
//! impl Listen for Billing {
//!     fn capabilities(caps: &mut Capabilities<Self>) {
//!         caps.on(|b: &Billing, _ev: &Event, order: &OrderPlaced| {
//!             b.charged.fetch_add(order.total_cents as usize, Ordering::Relaxed);
//!             Ok(())
//!         });
//!     }
//! }
//!
//! fn main() -> Result<(), treebus::BusError> {
//!     let root = Bus::builder().with_name("root").build();
//!     let checkout = Bus::builder().with_name("checkout").build();
//!     checkout.set_parent(Some(&root));
//!
//!     let billing = Arc::new(Billing::default());
//!     root.register(&billing);
//!
//!     // Global events published on the child climb to the root.
//!     checkout.publish(OrderPlaced { total_cents: 1499 }, Scope::Global)?;
//!     assert_eq!(billing.charged.load(Ordering::Relaxed), 1499);
//!     Ok(())
//! }
//! ```

mod bus;
mod error;
mod events;
mod listeners;

pub mod context;

// ---- Public re-exports ----

pub use bus::{AsyncDispatch, Bus, BusBuilder, Dispatch, SyncDispatch};
pub use context::ScopedBus;
pub use error::{BusError, HandlerError, HandlerFailure};
pub use events::{BusId, Event, Scope};
pub use listeners::{Capabilities, DispatchTarget, Listen};

// Optional: save/restore of buses and their durable listeners.
// Enabled by default; opt out with `default-features = false`.
#[cfg(feature = "persist")]
mod persist;
#[cfg(feature = "persist")]
pub use error::PersistError;
#[cfg(feature = "persist")]
pub use persist::{BusFactory, BusSnapshot, ListenerCodec, ListenerRecord, PersistListen, PersistentBus};
