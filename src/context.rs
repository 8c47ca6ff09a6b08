//! # Context: a scoped "current bus" for code that cannot take one.
//!
//! Deeply nested code sometimes needs to publish without threading a
//! [`Bus`] handle through every call signature. [`ScopedBus`] makes a bus
//! ambient for the current thread, for exactly the lexical scope of the
//! guard. Scopes nest: the innermost guard wins, and dropping it restores
//! the enclosing one.
//!
//! ## Rules
//! - The guard is `!Send`: the ambient bus never leaks to other threads,
//!   and a scope always ends on the thread that opened it.
//! - [`current`] outside any scope returns `None`; callers decide whether
//!   that is an error.
//!
//! ## Example
//! ```
//! use treebus::{context, Bus, Scope};
//!
//! fn deep_inside() {
//!     if let Some(bus) = context::current() {
//!         bus.publish("from deep inside".to_string(), Scope::Local).ok();
//!     }
//! }
//!
//! let bus = Bus::synchronous();
//! {
//!     let _scope = context::enter(&bus);
//!     deep_inside(); // sees `bus`
//! }
//! assert!(context::current().is_none());
//! ```

use std::cell::RefCell;
use std::marker::PhantomData;

use crate::bus::Bus;

thread_local! {
    static CURRENT_BUS: RefCell<Vec<Bus>> = const { RefCell::new(Vec::new()) };
}

/// Makes `bus` the current bus of this thread until the returned guard is
/// dropped. Nested calls shadow outer scopes.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub fn enter(bus: &Bus) -> ScopedBus {
    CURRENT_BUS.with(|stack| stack.borrow_mut().push(bus.clone()));
    ScopedBus {
        _not_send: PhantomData,
    }
}

/// Returns the innermost ambient bus of this thread, if any.
pub fn current() -> Option<Bus> {
    CURRENT_BUS.with(|stack| stack.borrow().last().cloned())
}

/// RAII guard returned by [`enter`]; restores the enclosing scope on drop.
pub struct ScopedBus {
    /// Pins the guard to its thread.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopedBus {
    fn drop(&mut self) {
        CURRENT_BUS.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}
