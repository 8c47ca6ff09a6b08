//! # Listeners: capability declaration and the weak registry.
//!
//! This module provides the [`Listen`] trait and the machinery that turns
//! a registered listener into dispatchable units.
//!
//! ## Architecture
//! ```text
//! registration:
//!   Arc<L: Listen> ──► L::capabilities(&mut Capabilities<L>)
//!                          │  (payload-type, callback) pairs
//!                          ▼
//!                    erased handler table ──► Registry entry (Weak<L> + table)
//!
//! dispatch:
//!   Registry::snapshot() ──► Vec<DispatchTarget>
//!                                 │  upgrade Weak at invocation time
//!                                 ▼
//!                            matching handlers invoked, failures collected
//! ```
//!
//! ## Rules
//! - Registration is weak: the registry never extends a listener's lifetime.
//! - The capability set is fixed at registration; re-registering replaces it.
//! - Matching is by exact payload `TypeId`, plus catch-all handlers that
//!   accept every payload.

mod capability;
mod registry;

pub use capability::{Capabilities, Listen};
pub use registry::DispatchTarget;

pub(crate) use registry::Registry;
