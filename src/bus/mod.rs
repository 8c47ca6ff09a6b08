//! # Bus: hierarchy nodes and dispatch strategies.
//!
//! ```text
//!                    ┌──────────────┐
//!                    │     Bus      │  parent/children links,
//!                    │  (registry)  │  publish protocol
//!                    └──────┬───────┘
//!                           │ dispatch(event, targets)
//!                ┌──────────┴──────────┐
//!                ▼                     ▼
//!        ┌──────────────┐      ┌───────────────┐
//!        │ SyncDispatch │      │ AsyncDispatch │
//!        │  (inline)    │      │ (tokio pool)  │
//!        └──────────────┘      └───────────────┘
//! ```

mod bus;
mod dispatch;

pub use bus::{Bus, BusBuilder};
pub use dispatch::{AsyncDispatch, Dispatch, SyncDispatch};
