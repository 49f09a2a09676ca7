//! Backing array: a fixed-capacity run of slots tagged with an epoch.

use crate::slot::Slot;

pub(crate) struct BucketArray<K, V> {
    /// Identifies this array within its map; node handles record it so a
    /// handle into a retired array can be told apart from a live one.
    pub(crate) epoch: u64,
    pub(crate) slots: Box<[Slot<K, V>]>,
}

impl<K, V> BucketArray<K, V> {
    pub(crate) fn new(capacity: usize, epoch: u64) -> Self {
        debug_assert!(capacity > 0);
        let slots: Box<[Slot<K, V>]> = core::iter::repeat_with(|| Slot::Empty)
            .take(capacity)
            .collect();
        Self { epoch, slots }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Index of the first occupied slot at or after `from`.
    pub(crate) fn next_occupied(&self, from: usize) -> Option<usize> {
        self.slots
            .get(from..)?
            .iter()
            .position(Slot::is_occupied)
            .map(|off| from + off)
    }
}

impl<K, V> core::fmt::Debug for BucketArray<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let occupied = self.slots.iter().filter(|s| s.is_occupied()).count();
        f.debug_struct("BucketArray")
            .field("epoch", &self.epoch)
            .field("capacity", &self.capacity())
            .field("occupied", &occupied)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slot::Entry;

    #[test]
    fn new_array_is_all_empty() {
        let a: BucketArray<u32, u32> = BucketArray::new(53, 0);
        assert_eq!(a.capacity(), 53);
        assert!(a.slots.iter().all(|s| matches!(s, Slot::Empty)));
        assert_eq!(a.next_occupied(0), None);
    }

    #[test]
    fn next_occupied_skips_tombstones() {
        let mut a: BucketArray<u32, u32> = BucketArray::new(7, 3);
        a.slots[2] = Slot::Deleted;
        a.slots[5] = Slot::Occupied(Entry {
            key: 1,
            value: 1,
            hash: 5,
            stamp: 0,
        });
        assert_eq!(a.next_occupied(0), Some(5));
        assert_eq!(a.next_occupied(5), Some(5));
        assert_eq!(a.next_occupied(6), None);
        // Past-the-end starts are not an error.
        assert_eq!(a.next_occupied(7), None);
        assert_eq!(a.next_occupied(100), None);
    }
}
