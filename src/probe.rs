//! Probe engine: linear probe order and the per-slot scan state machine.
//!
//! Every scan (lookup, insert, migration placement) walks the same
//! sequence `home, home + 1, ..., home + capacity - 1 (mod capacity)` where
//! `home = hash % capacity`. What a scan does at each slot depends only on
//! the slot's [`Step`] classification.

use crate::slot::Slot;

/// Starting index of the probe sequence for `hash`.
#[inline]
pub(crate) fn home(hash: u64, capacity: usize) -> usize {
    // capacity fits in u64 on every supported target
    (hash % capacity as u64) as usize
}

/// Linear probe sequence. Visits every slot exactly once, then ends.
#[derive(Clone, Debug)]
pub(crate) struct Probe {
    pos: usize,
    capacity: usize,
    remaining: usize,
}

impl Probe {
    pub(crate) fn new(hash: u64, capacity: usize) -> Self {
        Self {
            pos: home(hash, capacity),
            capacity,
            remaining: capacity,
        }
    }
}

impl Iterator for Probe {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let at = self.pos;
        self.pos += 1;
        if self.pos == self.capacity {
            self.pos = 0;
        }
        Some(at)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Probe {}

/// Classification of one visited slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Step {
    /// Empty: the key cannot lie further along; stop.
    Vacant,
    /// Deleted: reusable by an insert, but keep scanning.
    Tombstone,
    /// Occupied by an equal key; stop.
    Match,
    /// Occupied by another key; keep scanning.
    Mismatch,
}

#[inline]
pub(crate) fn classify<K, V>(
    slot: &Slot<K, V>,
    hash: u64,
    eq: &mut impl FnMut(&K) -> bool,
) -> Step {
    match slot {
        Slot::Empty => Step::Vacant,
        Slot::Deleted => Step::Tombstone,
        Slot::Occupied(e) if e.hash == hash && eq(&e.key) => Step::Match,
        Slot::Occupied(_) => Step::Mismatch,
    }
}

/// Outcome of an insert-oriented scan.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Locate {
    /// The key lives at this index.
    Found(usize),
    /// The key is absent; a new entry belongs at this index. `tombstone`
    /// tells whether the index currently holds a Deleted slot.
    Vacant { index: usize, tombstone: bool },
    /// Every slot is occupied by other keys.
    Full,
}

/// Index of the occupied slot holding a key matching `eq`.
pub(crate) fn find<K, V>(
    slots: &[Slot<K, V>],
    hash: u64,
    mut eq: impl FnMut(&K) -> bool,
) -> Option<usize> {
    for i in Probe::new(hash, slots.len()) {
        match classify(&slots[i], hash, &mut eq) {
            Step::Match => return Some(i),
            Step::Vacant => return None,
            Step::Tombstone | Step::Mismatch => {}
        }
    }
    None
}

/// Scan for a key, remembering the first tombstone as the insertion point
/// in case the key turns out to be absent.
pub(crate) fn locate<K, V>(
    slots: &[Slot<K, V>],
    hash: u64,
    mut eq: impl FnMut(&K) -> bool,
) -> Locate {
    let mut reusable = None;
    for i in Probe::new(hash, slots.len()) {
        match classify(&slots[i], hash, &mut eq) {
            Step::Match => return Locate::Found(i),
            Step::Vacant => {
                return match reusable {
                    Some(index) => Locate::Vacant {
                        index,
                        tombstone: true,
                    },
                    None => Locate::Vacant {
                        index: i,
                        tombstone: false,
                    },
                };
            }
            Step::Tombstone => {
                reusable.get_or_insert(i);
            }
            Step::Mismatch => {}
        }
    }
    match reusable {
        Some(index) => Locate::Vacant {
            index,
            tombstone: true,
        },
        None => Locate::Full,
    }
}

/// First slot along the probe sequence that is not occupied. Used to place
/// an entry that is known to be absent from `slots`.
pub(crate) fn placement<K, V>(slots: &[Slot<K, V>], hash: u64) -> Option<usize> {
    Probe::new(hash, slots.len()).find(|&i| !slots[i].is_occupied())
}
