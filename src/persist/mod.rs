//! # Persist: snapshotting buses and durable listeners (feature `persist`).
//!
//! ```text
//!   PersistentBus ──save()──► BusSnapshot ──serde──► any format
//!        ▲                        │
//!        └──restore(factory, codec)◄──────────────── bytes
//! ```
//!
//! The wrapper never changes dispatch semantics: it is bookkeeping around
//! an ordinary [`Bus`](crate::Bus).

mod bus;
mod codec;
mod snapshot;

pub use bus::{BusFactory, PersistentBus};
pub use codec::{ListenerCodec, PersistListen};
pub use snapshot::{BusSnapshot, ListenerRecord};
