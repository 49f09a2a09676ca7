//! Slot: one cell of a backing array and its tri-state lifecycle.

/// A live key/value pair together with its cached hash and placement stamp.
///
/// The hash is computed once on insert and reused when the entry migrates,
/// so `K: Hash` is never invoked during migration.
#[derive(Debug)]
pub(crate) struct Entry<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) hash: u64,
    pub(crate) stamp: u64,
}

/// Empty slots end a probe; Deleted slots (tombstones) do not, because a
/// matching key may lie further along the probe sequence.
#[derive(Debug, Default)]
pub(crate) enum Slot<K, V> {
    #[default]
    Empty,
    Occupied(Entry<K, V>),
    Deleted,
}

impl<K, V> Slot<K, V> {
    #[inline]
    pub(crate) fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }

    #[inline]
    pub(crate) fn entry(&self) -> Option<&Entry<K, V>> {
        match self {
            Slot::Occupied(e) => Some(e),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn entry_mut(&mut self) -> Option<&mut Entry<K, V>> {
        match self {
            Slot::Occupied(e) => Some(e),
            _ => None,
        }
    }

    /// Vacate an occupied slot, leaving a tombstone. Returns `None` and
    /// leaves the slot untouched when it is not occupied.
    pub(crate) fn take(&mut self) -> Option<Entry<K, V>> {
        if !self.is_occupied() {
            return None;
        }
        match core::mem::replace(self, Slot::Deleted) {
            Slot::Occupied(e) => Some(e),
            _ => None,
        }
    }
}
