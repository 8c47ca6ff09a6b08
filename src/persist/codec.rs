//! Tag-based codec mapping snapshot records back to listener types.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use super::bus::PersistRecord;
use super::snapshot::ListenerRecord;
use crate::bus::Bus;
use crate::error::PersistError;
use crate::listeners::Listen;

/// A listener whose state survives save/restore cycles.
///
/// Implementors carry serde-serializable state and a stable [`TAG`]
/// identifying the type inside snapshots. The tag, not the Rust type
/// path, is what snapshots store, so renaming a type does not invalidate
/// previously saved state as long as the tag stays put.
///
/// [`TAG`]: PersistListen::TAG
pub trait PersistListen: Listen + Serialize + DeserializeOwned {
    /// Stable snapshot tag for this listener type.
    const TAG: &'static str;
}

type DecodeFn =
    Arc<dyn Fn(serde_json::Value, &Bus) -> Result<PersistRecord, PersistError> + Send + Sync>;

/// Registry of decoders used by [`PersistentBus::restore`].
///
/// Restore is the inverse of save only for tags the codec knows: build
/// one codec per application listing every durable listener type, and
/// share it across all restore calls.
///
/// ```
/// use std::sync::atomic::{AtomicU64, Ordering};
/// use serde::{Deserialize, Serialize};
/// use treebus::{Capabilities, Event, Listen, ListenerCodec, PersistListen};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct AuditCounter {
///     seen: AtomicU64,
/// }
///
/// impl Listen for AuditCounter {
///     fn capabilities(caps: &mut Capabilities<Self>) {
///         caps.on(|c: &AuditCounter, _ev: &Event, _line: &String| {
///             c.seen.fetch_add(1, Ordering::Relaxed);
///             Ok(())
///         });
///     }
/// }
///
/// impl PersistListen for AuditCounter {
///     const TAG: &'static str = "audit-counter";
/// }
///
/// let codec = ListenerCodec::new().with::<AuditCounter>();
/// assert_eq!(codec.len(), 1);
/// ```
///
/// [`PersistentBus::restore`]: super::PersistentBus::restore
#[derive(Default)]
pub struct ListenerCodec {
    decoders: HashMap<&'static str, DecodeFn>,
}

impl ListenerCodec {
    /// Creates an empty codec.
    pub fn new() -> Self {
        Self::default()
    }

    /// Teaches the codec to decode listeners of type `L`.
    ///
    /// Registering the same tag twice keeps the latest decoder.
    pub fn with<L: PersistListen>(mut self) -> Self {
        self.decoders.insert(
            L::TAG,
            Arc::new(|state, bus| {
                let listener: L =
                    serde_json::from_value(state).map_err(|source| PersistError::Decode {
                        tag: L::TAG.to_string(),
                        source,
                    })?;
                let listener = Arc::new(listener);
                bus.register(&listener);
                Ok(PersistRecord::capture(&listener))
            }),
        );
        self
    }

    /// Number of known tags.
    #[inline]
    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    /// Whether the codec knows no tags at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decodes one record, registering the rebuilt listener on `bus`.
    pub(crate) fn decode(
        &self,
        record: &ListenerRecord,
        bus: &Bus,
    ) -> Result<PersistRecord, PersistError> {
        let decode = self
            .decoders
            .get(record.tag.as_str())
            .ok_or_else(|| PersistError::UnknownTag {
                tag: record.tag.clone(),
            })?;
        decode(record.state.clone(), bus)
    }
}
