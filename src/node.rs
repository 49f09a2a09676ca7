//! Opaque slot references for node-style traversal.

use core::sync::atomic::{AtomicU64, Ordering};

/// Process-wide source of map identities, so handles from one map are
/// recognised as foreign by every other map.
static NEXT_MAP_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) struct MapId(u64);

impl MapId {
    pub(crate) fn fresh() -> Self {
        MapId(NEXT_MAP_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Reference to one occupied slot of an [`IncHashMap`](crate::IncHashMap).
///
/// Handles are plain values: they borrow nothing, so the map may be mutated
/// while a handle is held. Resolving a handle re-validates it against the
/// map, and a handle whose entry was removed, migrated into a newer array,
/// or whose slot was reused yields [`NodeError::Stale`](crate::NodeError::Stale).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct NodeHandle {
    pub(crate) map: MapId,
    pub(crate) epoch: u64,
    pub(crate) index: usize,
    pub(crate) stamp: u64,
}
