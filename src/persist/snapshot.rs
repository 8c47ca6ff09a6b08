//! Serializable snapshot of a bus: its durable listeners and parent chain.

use serde::{Deserialize, Serialize};

/// State captured by [`PersistentBus::save`](super::PersistentBus::save).
///
/// A snapshot is plain data: serialize it with any serde format and feed
/// it back to [`PersistentBus::restore`](super::PersistentBus::restore).
/// Only durable listeners and durable parent links appear; transient
/// registrations are dropped by design of the capture, not by accident.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusSnapshot {
    /// Durable listeners, in registration order.
    pub listeners: Vec<ListenerRecord>,
    /// The durable parent's snapshot, captured recursively.
    pub parent: Option<Box<BusSnapshot>>,
}

/// One durable listener inside a [`BusSnapshot`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerRecord {
    /// Stable type tag; must match a codec entry at restore time.
    pub tag: String,
    /// The listener's serialized state.
    pub state: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_round_trips_through_json() {
        let snapshot = BusSnapshot {
            listeners: vec![ListenerRecord {
                tag: "counter".to_string(),
                state: serde_json::json!({ "hits": 3 }),
            }],
            parent: Some(Box::new(BusSnapshot {
                listeners: Vec::new(),
                parent: None,
            })),
        };

        let text = serde_json::to_string(&snapshot).unwrap();
        let back: BusSnapshot = serde_json::from_str(&text).unwrap();

        assert_eq!(back.listeners.len(), 1);
        assert_eq!(back.listeners[0].tag, "counter");
        assert_eq!(back.listeners[0].state["hits"], 3);
        assert!(back.parent.unwrap().listeners.is_empty());
    }
}
