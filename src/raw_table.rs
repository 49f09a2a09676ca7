//! RawTable: the two-array table core. Knows nothing about hashing or
//! release callbacks; callers pass precomputed hashes in and receive
//! displaced pairs back.

use crate::bucket_array::BucketArray;
use crate::capacity;
use crate::migration::Migration;
use crate::probe::{self, Locate};
use crate::slot::{Entry, Slot};
use core::borrow::Borrow;
use core::mem;
use tracing::{debug, trace};

/// Location of an occupied slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Loc {
    Current(usize),
    Old(usize),
}

/// `(epoch, index, stamp)` of an occupied slot; the raw form of a node
/// handle.
pub(crate) type Position = (u64, usize, u64);

pub(crate) struct RawTable<K, V> {
    current: BucketArray<K, V>,
    migration: Option<Migration<K, V>>,
    /// Live entries across both arrays.
    len: usize,
    /// Deleted slots in `current` only.
    tombstones: usize,
    batch: usize,
    next_epoch: u64,
    next_stamp: u64,
}

impl<K, V> RawTable<K, V> {
    pub(crate) fn new(capacity: usize, batch: usize) -> Self {
        debug_assert!(batch > 0);
        Self {
            current: BucketArray::new(capacity, 0),
            migration: None,
            len: 0,
            tombstones: 0,
            batch,
            next_epoch: 1,
            next_stamp: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn tombstones(&self) -> usize {
        self.tombstones
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.current.capacity()
    }

    #[inline]
    pub(crate) fn is_migrating(&self) -> bool {
        self.migration.is_some()
    }

    /// `(cursor, old_capacity)` while migrating.
    pub(crate) fn migration_progress(&self) -> Option<(usize, usize)> {
        self.migration
            .as_ref()
            .map(|m| (m.cursor(), m.old().capacity()))
    }

    fn mint_epoch(&mut self) -> u64 {
        let e = self.next_epoch;
        self.next_epoch = self.next_epoch.wrapping_add(1);
        e
    }

    fn mint_stamp(&mut self) -> u64 {
        let s = self.next_stamp;
        self.next_stamp = self.next_stamp.wrapping_add(1);
        s
    }

    fn slots_at(&self, loc: Loc) -> Option<&Slot<K, V>> {
        match loc {
            Loc::Current(i) => self.current.slots.get(i),
            Loc::Old(i) => self.migration.as_ref()?.old().slots.get(i),
        }
    }

    fn slots_at_mut(&mut self, loc: Loc) -> Option<&mut Slot<K, V>> {
        match loc {
            Loc::Current(i) => self.current.slots.get_mut(i),
            Loc::Old(i) => self.migration.as_mut()?.old_mut().slots.get_mut(i),
        }
    }

    pub(crate) fn entry(&self, loc: Loc) -> Option<&Entry<K, V>> {
        self.slots_at(loc)?.entry()
    }

    pub(crate) fn entry_mut(&mut self, loc: Loc) -> Option<&mut Entry<K, V>> {
        self.slots_at_mut(loc)?.entry_mut()
    }

    pub(crate) fn position_of(&self, loc: Loc) -> Option<Position> {
        let (epoch, index) = match loc {
            Loc::Current(i) => (self.current.epoch, i),
            Loc::Old(i) => (self.migration.as_ref()?.old().epoch, i),
        };
        Some((epoch, index, self.entry(loc)?.stamp))
    }

    /// Lookup across both arrays: the current array first, then the old
    /// one with its own capacity.
    pub(crate) fn find<Q>(&self, hash: u64, q: &Q) -> Option<Loc>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        if let Some(i) = probe::find(&self.current.slots, hash, |k| k.borrow() == q) {
            return Some(Loc::Current(i));
        }
        self.find_in_old(hash, q).map(Loc::Old)
    }

    fn find_in_old<Q>(&self, hash: u64, q: &Q) -> Option<usize>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let old = self.migration.as_ref()?.old();
        probe::find(&old.slots, hash, |k| k.borrow() == q)
    }

    /// Insert or update. On update the previous key and value are swapped
    /// out and returned; the slot keeps its stamp.
    pub(crate) fn upsert(&mut self, hash: u64, key: K, value: V) -> Option<(K, V)>
    where
        K: Eq,
    {
        let spot = probe::locate(&self.current.slots, hash, |k| *k == key);
        let existing = match spot {
            Locate::Found(i) => Some(Loc::Current(i)),
            Locate::Vacant { .. } | Locate::Full => self.find_in_old(hash, &key).map(Loc::Old),
        };

        let displaced = match existing {
            Some(loc) => {
                let entry = self
                    .entry_mut(loc)
                    .expect("located slot must be occupied");
                let old_key = mem::replace(&mut entry.key, key);
                let old_value = mem::replace(&mut entry.value, value);
                Some((old_key, old_value))
            }
            None => {
                let Locate::Vacant { index, tombstone } = spot else {
                    unreachable!("load bound keeps a vacant slot in the current array");
                };
                if tombstone {
                    self.tombstones -= 1;
                }
                let stamp = self.mint_stamp();
                self.current.slots[index] = Slot::Occupied(Entry {
                    key,
                    value,
                    hash,
                    stamp,
                });
                self.len += 1;
                None
            }
        };

        self.after_insert();
        displaced
    }

    /// Migration progress and load-factor check that follow every insert.
    fn after_insert(&mut self) {
        if let Some(m) = self.migration.as_mut() {
            let out = m.step(&mut self.current, self.batch);
            self.tombstones -= out.reclaimed;
            if m.is_done() {
                self.retire_old();
            }
        }

        if capacity::over_load(self.len + self.tombstones, self.current.capacity()) {
            if let Some(m) = self.migration.as_ref() {
                debug!(
                    cursor = m.cursor(),
                    old_capacity = m.old().capacity(),
                    len = self.len,
                    tombstones = self.tombstones,
                    "Draining migration early to restore the load bound."
                );
                self.drain_migration();
            }
            self.start_migration();
        }
    }

    fn start_migration(&mut self) {
        let old_capacity = self.current.capacity();
        let new_capacity = capacity::next_capacity(old_capacity);
        let epoch = self.mint_epoch();
        let old = mem::replace(&mut self.current, BucketArray::new(new_capacity, epoch));
        debug!(
            old_capacity,
            new_capacity,
            len = self.len,
            tombstones = self.tombstones,
            "Started incremental migration."
        );

        // Tombstones are not carried over.
        self.tombstones = 0;
        let mut m = Migration::new(old);
        let out = m.step(&mut self.current, self.batch);
        debug_assert_eq!(out.reclaimed, 0);
        self.migration = Some(m);
        if self.migration.as_ref().is_some_and(Migration::is_done) {
            self.retire_old();
        }
    }

    fn drain_migration(&mut self) {
        if let Some(m) = self.migration.as_mut() {
            let out = m.drain(&mut self.current);
            trace!(moved = out.moved, reclaimed = out.reclaimed, "Drained migration.");
            self.tombstones -= out.reclaimed;
        }
        self.retire_old();
    }

    fn retire_old(&mut self) {
        if let Some(m) = self.migration.take() {
            debug_assert!(m.is_done());
            let old = m.into_old();
            debug!(
                old_capacity = old.capacity(),
                new_capacity = self.current.capacity(),
                len = self.len,
                "Completed incremental migration."
            );
        }
    }

    /// Vacate an occupied slot, leaving a tombstone. Never migrates.
    pub(crate) fn take_at(&mut self, loc: Loc) -> Option<Entry<K, V>> {
        let entry = self.slots_at_mut(loc)?.take()?;
        self.len -= 1;
        if let Loc::Current(_) = loc {
            self.tombstones += 1;
        }
        Some(entry)
    }

    pub(crate) fn take<Q>(&mut self, hash: u64, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let loc = self.find(hash, q)?;
        self.take_at(loc).map(|e| (e.key, e.value))
    }

    /// Move every live entry into a fresh array, hashing each key with
    /// `rehash`. Ends any migration and drops all tombstones.
    pub(crate) fn rebuild(&mut self, mut rehash: impl FnMut(&K) -> u64) {
        let capacity = capacity::capacity_for(self.len).max(self.current.capacity());
        let epoch = self.mint_epoch();
        let current = mem::replace(&mut self.current, BucketArray::new(capacity, epoch));
        let old = self.migration.take().map(Migration::into_old);
        self.tombstones = 0;
        trace!(capacity, len = self.len, "Rebuilding table.");

        let slots = current
            .slots
            .into_vec()
            .into_iter()
            .chain(old.into_iter().flat_map(|a| a.slots.into_vec()));
        for slot in slots {
            if let Slot::Occupied(mut entry) = slot {
                entry.hash = rehash(&entry.key);
                let at = probe::placement(&self.current.slots, entry.hash)
                    .expect("rebuilt array is sized for every live entry");
                self.current.slots[at] = Slot::Occupied(entry);
            }
        }
    }

    /// Replace both arrays with a single empty one of the current capacity,
    /// handing the detached arrays back so the caller can dispose of their
    /// entries.
    pub(crate) fn reset(&mut self) -> (BucketArray<K, V>, Option<BucketArray<K, V>>) {
        let epoch = self.mint_epoch();
        let fresh = BucketArray::new(self.current.capacity(), epoch);
        let current = mem::replace(&mut self.current, fresh);
        let old = self.migration.take().map(Migration::into_old);
        trace!(capacity = self.current.capacity(), len = self.len, "Clearing table.");
        self.len = 0;
        self.tombstones = 0;
        (current, old)
    }

    /// Current slots and, while migrating, old slots (empty otherwise).
    pub(crate) fn slices(&self) -> (&[Slot<K, V>], &[Slot<K, V>]) {
        let old: &[Slot<K, V>] = match &self.migration {
            Some(m) => &m.old().slots,
            None => &[],
        };
        (&self.current.slots, old)
    }

    pub(crate) fn slices_mut(&mut self) -> (&mut [Slot<K, V>], &mut [Slot<K, V>]) {
        let old: &mut [Slot<K, V>] = match &mut self.migration {
            Some(m) => &mut m.old_mut().slots,
            None => &mut [],
        };
        (&mut self.current.slots, old)
    }

    fn array(&self, epoch: u64) -> Option<&BucketArray<K, V>> {
        if self.current.epoch == epoch {
            return Some(&self.current);
        }
        self.migration
            .as_ref()
            .map(Migration::old)
            .filter(|a| a.epoch == epoch)
    }

    fn array_mut(&mut self, epoch: u64) -> Option<&mut BucketArray<K, V>> {
        if self.current.epoch == epoch {
            return Some(&mut self.current);
        }
        self.migration
            .as_mut()
            .map(Migration::old_mut)
            .filter(|a| a.epoch == epoch)
    }

    /// Entry at `(epoch, index)` if it still carries `stamp`.
    pub(crate) fn resolve(&self, epoch: u64, index: usize, stamp: u64) -> Option<&Entry<K, V>> {
        self.array(epoch)?
            .slots
            .get(index)?
            .entry()
            .filter(|e| e.stamp == stamp)
    }

    pub(crate) fn resolve_mut(
        &mut self,
        epoch: u64,
        index: usize,
        stamp: u64,
    ) -> Option<&mut Entry<K, V>> {
        self.array_mut(epoch)?
            .slots
            .get_mut(index)?
            .entry_mut()
            .filter(|e| e.stamp == stamp)
    }

    fn position(array: &BucketArray<K, V>, from: usize) -> Option<Position> {
        let i = array.next_occupied(from)?;
        let stamp = array.slots[i].entry()?.stamp;
        Some((array.epoch, i, stamp))
    }

    fn first_in_old(&self) -> Option<Position> {
        Self::position(self.migration.as_ref()?.old(), 0)
    }

    /// First occupied slot: current array first, then the old one.
    pub(crate) fn first(&self) -> Option<Position> {
        Self::position(&self.current, 0).or_else(|| self.first_in_old())
    }

    /// Occupied slot following `(epoch, index)` in traversal order. The
    /// outer `None` means the array `epoch` is no longer owned by the table.
    pub(crate) fn next_after(&self, epoch: u64, index: usize) -> Option<Option<Position>> {
        let from = index.saturating_add(1);
        if self.current.epoch == epoch {
            return Some(Self::position(&self.current, from).or_else(|| self.first_in_old()));
        }
        let old = self.migration.as_ref()?.old();
        (old.epoch == epoch).then(|| Self::position(old, from))
    }
}

impl<K, V> core::fmt::Debug for RawTable<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RawTable")
            .field("current", &self.current)
            .field("migration", &self.migration_progress())
            .field("len", &self.len)
            .field("tombstones", &self.tombstones)
            .finish()
    }
}
