//! Migration controller: drains a retired backing array into the current
//! one a few slots at a time.

use crate::bucket_array::BucketArray;
use crate::probe;
use crate::slot::Slot;

/// An in-progress incremental rehash. Owns the retired array and the scan
/// cursor into it. Slots before the cursor have been migrated (their entries
/// now live in the current array and a tombstone is left behind, so probe
/// chains through the old array stay intact for entries not yet moved).
pub(crate) struct Migration<K, V> {
    old: BucketArray<K, V>,
    cursor: usize,
}

/// Result of a migration step.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct StepOutcome {
    /// Entries moved into the current array.
    pub(crate) moved: usize,
    /// Tombstones in the current array claimed by moved entries.
    pub(crate) reclaimed: usize,
}

impl<K, V> Migration<K, V> {
    pub(crate) fn new(old: BucketArray<K, V>) -> Self {
        Self { old, cursor: 0 }
    }

    #[inline]
    pub(crate) fn old(&self) -> &BucketArray<K, V> {
        &self.old
    }

    #[inline]
    pub(crate) fn old_mut(&mut self) -> &mut BucketArray<K, V> {
        &mut self.old
    }

    #[inline]
    pub(crate) fn cursor(&self) -> usize {
        self.cursor
    }

    #[inline]
    pub(crate) fn is_done(&self) -> bool {
        self.cursor == self.old.capacity()
    }

    /// Advance the cursor by up to `batch` positions, whether or not the
    /// visited slots are occupied, re-placing occupied entries into `into`
    /// with their cached hash.
    pub(crate) fn step(&mut self, into: &mut BucketArray<K, V>, batch: usize) -> StepOutcome {
        let mut out = StepOutcome::default();
        let end = self.cursor.saturating_add(batch).min(self.old.capacity());
        while self.cursor < end {
            if let Some(entry) = self.old.slots[self.cursor].take() {
                let at = probe::placement(&into.slots, entry.hash)
                    .expect("current array always has a free slot during migration");
                if matches!(into.slots[at], Slot::Deleted) {
                    out.reclaimed += 1;
                }
                into.slots[at] = Slot::Occupied(entry);
                out.moved += 1;
            }
            self.cursor += 1;
        }
        out
    }

    /// Run the migration to completion.
    pub(crate) fn drain(&mut self, into: &mut BucketArray<K, V>) -> StepOutcome {
        let rest = self.old.capacity() - self.cursor;
        self.step(into, rest)
    }

    pub(crate) fn into_old(self) -> BucketArray<K, V> {
        self.old
    }
}
