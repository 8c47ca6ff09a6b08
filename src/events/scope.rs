//! # Event scope: how far an event travels through the bus hierarchy.
//!
//! [`Scope`] is fixed when the event is created and never changes afterwards.
//!
//! ## Rules
//! - [`Scope::Local`] the event is dispatched on the publishing bus only.
//!   It still ripples **down** to child buses when published on a parent
//!   (downward propagation is unconditional), but it is never forwarded
//!   to the parent bus.
//! - [`Scope::Global`] the event is additionally forwarded to the parent
//!   bus after local dispatch; with chained buses it eventually reaches
//!   every bus in the connected hierarchy exactly once.

/// Propagation scope of a published event.
///
/// Fixed at creation time; see [`Event::scope`](crate::Event::scope).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Dispatch on the publishing bus (and its children) only.
    Local,
    /// Dispatch on the publishing bus and forward to the parent bus,
    /// propagating through the whole connected hierarchy.
    Global,
}

impl Scope {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    #[inline]
    pub fn as_label(&self) -> &'static str {
        match self {
            Scope::Local => "local",
            Scope::Global => "global",
        }
    }

    /// Returns `true` when the event should be forwarded to the parent bus.
    #[inline]
    pub fn propagates_upward(&self) -> bool {
        matches!(self, Scope::Global)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(Scope::Local.as_label(), "local");
        assert_eq!(Scope::Global.as_label(), "global");
    }

    #[test]
    fn test_only_global_propagates_upward() {
        assert!(!Scope::Local.propagates_upward());
        assert!(Scope::Global.propagates_upward());
    }
}
