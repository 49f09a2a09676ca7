//! IncHashMap: public map over [`RawTable`] adding hashing, release
//! callbacks, node handles and the exclusivity guard.

use crate::config::{Builder, Config};
use crate::error::NodeError;
use crate::exclusive::Exclusive;
use crate::iter::{Iter, IterMut, Keys, Values, ValuesMut};
use crate::node::{MapId, NodeHandle};
use crate::raw_table::{Position, RawTable};
use crate::release::{Release, Releasers};
use crate::slot::{Entry, Slot};
use core::borrow::Borrow;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Open-addressing hash map with incremental rehashing.
///
/// Growth never rehashes the whole table at once: the outgrown array is
/// kept alongside the new one and drained a few slots per insert. See the
/// crate documentation for the full model.
pub struct IncHashMap<K, V, S = DefaultHashBuilder> {
    hasher: S,
    table: RawTable<K, V>,
    release: Releasers<K, V>,
    config: Config,
    id: MapId,
    exclusive: Exclusive,
}

impl<K, V> IncHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> IncHashMap<K, V> {
    pub fn builder() -> Builder<K, V> {
        Builder::new()
    }
}

impl<K, V, S> Default for IncHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn default() -> Self {
        Self::with_hasher(S::default())
    }
}

impl<K, V, S> IncHashMap<K, V, S> {
    pub(crate) fn from_parts(hasher: S, config: Config, release: Releasers<K, V>) -> Self {
        Self {
            hasher,
            table: RawTable::new(config.initial_capacity, config.migration_batch.get()),
            release,
            config,
            id: MapId::fresh(),
            exclusive: Exclusive::new(),
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Capacity of the current backing array.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Deleted slots in the current backing array.
    pub fn tombstones(&self) -> usize {
        self.table.tombstones()
    }

    /// `(len + tombstones) / capacity`. At most 0.5 after every insert.
    pub fn load_factor(&self) -> f64 {
        (self.table.len() + self.table.tombstones()) as f64 / self.table.capacity() as f64
    }

    pub fn is_migrating(&self) -> bool {
        self.table.is_migrating()
    }

    /// `(cursor, old_capacity)` of the running migration, if any.
    pub fn migration_progress(&self) -> Option<(usize, usize)> {
        self.table.migration_progress()
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    /// Register the callback that receives keys leaving the map. Returns the
    /// previous callback.
    pub fn set_release_key(&mut self, f: Option<Release<K>>) -> Option<Release<K>> {
        self.release.set_key(f)
    }

    /// Register the callback that receives values leaving the map. Returns
    /// the previous callback.
    pub fn set_release_value(&mut self, f: Option<Release<V>>) -> Option<Release<V>> {
        self.release.set_value(f)
    }

    /// Remove every entry, releasing each key and value. Keeps the current
    /// capacity.
    pub fn clear(&mut self) {
        let (current, old) = {
            let _g = self.exclusive.enter("clear");
            self.table.reset()
        };
        let slots = current
            .slots
            .into_vec()
            .into_iter()
            .chain(old.into_iter().flat_map(|a| a.slots.into_vec()));
        for slot in slots {
            if let Slot::Occupied(Entry { key, value, .. }) = slot {
                self.release.pair(key, value);
            }
        }
    }

    /// Entries in physical slot order: the current array, then the old one.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let (current, old) = self.table.slices();
        Iter::new(current, old, self.table.len())
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        let len = self.table.len();
        let (current, old) = self.table.slices_mut();
        IterMut::new(current, old, len)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys { inner: self.iter() }
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values { inner: self.iter() }
    }

    pub fn values_mut(&mut self) -> ValuesMut<'_, K, V> {
        ValuesMut {
            inner: self.iter_mut(),
        }
    }

    fn handle(&self, (epoch, index, stamp): Position) -> NodeHandle {
        NodeHandle {
            map: self.id,
            epoch,
            index,
            stamp,
        }
    }

    fn check_owner(&self, node: NodeHandle) -> Result<(), NodeError> {
        if node.map == self.id {
            Ok(())
        } else {
            Err(NodeError::WrongMap)
        }
    }

    fn resolve(&self, node: NodeHandle) -> Result<&Entry<K, V>, NodeError> {
        self.check_owner(node)?;
        self.table
            .resolve(node.epoch, node.index, node.stamp)
            .ok_or(NodeError::Stale)
    }

    /// Handle to the first entry in traversal order.
    pub fn first(&self) -> Option<NodeHandle> {
        let _g = self.exclusive.enter("first");
        self.table.first().map(|p| self.handle(p))
    }

    /// Handle to the entry after `node` in traversal order, or `Ok(None)`
    /// at the end. Traversal continues from the handle's position even if
    /// its entry has since been removed, as long as its array is still
    /// owned by the map.
    pub fn next(&self, node: NodeHandle) -> Result<Option<NodeHandle>, NodeError> {
        let _g = self.exclusive.enter("next");
        self.check_owner(node)?;
        match self.table.next_after(node.epoch, node.index) {
            Some(p) => Ok(p.map(|p| self.handle(p))),
            None => Err(NodeError::Stale),
        }
    }

    pub fn node_key(&self, node: NodeHandle) -> Result<&K, NodeError> {
        let _g = self.exclusive.enter("node_key");
        self.resolve(node).map(|e| &e.key)
    }

    pub fn node_value(&self, node: NodeHandle) -> Result<&V, NodeError> {
        let _g = self.exclusive.enter("node_value");
        self.resolve(node).map(|e| &e.value)
    }

    pub fn node_value_mut(&mut self, node: NodeHandle) -> Result<&mut V, NodeError> {
        let _g = self.exclusive.enter("node_value_mut");
        self.check_owner(node)?;
        self.table
            .resolve_mut(node.epoch, node.index, node.stamp)
            .map(|e| &mut e.value)
            .ok_or(NodeError::Stale)
    }
}

impl<K, V, S> IncHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(hasher, Config::default(), Releasers::new(None, None))
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    /// Insert `key -> value`, or update the entry for an equal key. An
    /// update releases the previous key and value.
    pub fn insert(&mut self, key: K, value: V) {
        if let Some((k, v)) = self.upsert("insert", key, value) {
            self.release.pair(k, v);
        }
    }

    /// Like [`insert`](Self::insert), but hands the previous key and value
    /// back instead of releasing them.
    pub fn replace(&mut self, key: K, value: V) -> Option<(K, V)> {
        self.upsert("replace", key, value)
    }

    fn upsert(&mut self, op: &'static str, key: K, value: V) -> Option<(K, V)> {
        let _g = self.exclusive.enter(op);
        let hash = self.make_hash(&key);
        self.table.upsert(hash, key, value)
    }

    /// Remove the entry for `q`, releasing its key and value. Returns false
    /// (and changes nothing) when the key is absent.
    pub fn remove<Q>(&mut self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        match self.take_inner("remove", q) {
            Some((k, v)) => {
                self.release.pair(k, v);
                true
            }
            None => false,
        }
    }

    /// Remove the entry for `q` and return it without releasing.
    pub fn take<Q>(&mut self, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.take_inner("take", q)
    }

    fn take_inner<Q>(&mut self, op: &'static str, q: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.exclusive.enter(op);
        let hash = self.make_hash(q);
        self.table.take(hash, q)
    }

    pub fn get<Q>(&self, q: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_entry("get", q).map(|e| &e.value)
    }

    pub fn get_key_value<Q>(&self, q: &Q) -> Option<(&K, &V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_entry("get_key_value", q).map(|e| (&e.key, &e.value))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        self.get_entry("contains_key", q).is_some()
    }

    fn get_entry<Q>(&self, op: &'static str, q: &Q) -> Option<&Entry<K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.exclusive.enter(op);
        let hash = self.make_hash(q);
        let loc = self.table.find(hash, q)?;
        self.table.entry(loc)
    }

    pub fn get_mut<Q>(&mut self, q: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.exclusive.enter("get_mut");
        let hash = self.make_hash(q);
        let loc = self.table.find(hash, q)?;
        self.table.entry_mut(loc).map(|e| &mut e.value)
    }

    /// Handle to the slot holding `q`.
    pub fn find_node<Q>(&self, q: &Q) -> Option<NodeHandle>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
    {
        let _g = self.exclusive.enter("find_node");
        let hash = self.make_hash(q);
        let loc = self.table.find(hash, q)?;
        self.table.position_of(loc).map(|p| self.handle(p))
    }

    /// Swap the hash strategy and return the previous one. Every live
    /// entry is rehashed into a fresh array, which finishes any running
    /// migration and invalidates all node handles.
    pub fn set_hasher(&mut self, hasher: S) -> S {
        let _g = self.exclusive.enter("set_hasher");
        let previous = core::mem::replace(&mut self.hasher, hasher);
        let h = &self.hasher;
        self.table.rebuild(|k| h.hash_one(k));
        previous
    }
}

impl<K, V, S> Drop for IncHashMap<K, V, S> {
    fn drop(&mut self) {
        if self.release.is_empty() {
            return;
        }
        let (current, old) = self.table.slices_mut();
        for slot in current.iter_mut().chain(old.iter_mut()) {
            if let Some(Entry { key, value, .. }) = slot.take() {
                self.release.pair(key, value);
            }
        }
    }
}

impl<K, V, S> core::fmt::Debug for IncHashMap<K, V, S>
where
    K: core::fmt::Debug,
    V: core::fmt::Debug,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, S> Extend<(K, V)> for IncHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K, V, S> FromIterator<(K, V)> for IncHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::with_hasher(S::default());
        m.extend(iter);
        m
    }
}

impl<'a, K, V, S> IntoIterator for &'a IncHashMap<K, V, S> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, K, V, S> IntoIterator for &'a mut IncHashMap<K, V, S> {
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::IncHashMap;
    use crate::error::NodeError;
    use crate::hashing::IntHash;
    use core::hash::Hash;
    use std::cell::RefCell;
    use std::collections::BTreeSet;
    use std::rc::Rc;

    /// Invariant: inserting an existing key updates in place; len unchanged.
    #[test]
    fn upsert_updates_value_and_keeps_len() {
        let mut m: IncHashMap<String, i32> = IncHashMap::new();
        m.insert("k".to_string(), 1);
        m.insert("k".to_string(), 2);
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("k"), Some(&2));
    }

    /// Invariant: borrowed lookup works (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: IncHashMap<String, i32> = IncHashMap::new();
        m.insert("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.get_key_value("hello"), Some((&"hello".to_string(), &1)));
    }

    /// Invariant: remove of an absent key returns false and changes nothing.
    #[test]
    fn remove_absent_is_idempotent() {
        let mut m: IncHashMap<u32, u32, IntHash> = IncHashMap::with_hasher(IntHash);
        m.insert(1, 1);
        assert!(!m.remove(&2));
        assert!(!m.remove(&2));
        assert_eq!(m.len(), 1);
        assert_eq!(m.tombstones(), 0);
    }

    #[test]
    fn get_mut_and_values_mut_write_through() {
        let mut m: IncHashMap<u32, u32, IntHash> = IncHashMap::with_hasher(IntHash);
        for k in 0..40 {
            m.insert(k, k);
        }
        *m.get_mut(&3).unwrap() += 100;
        for v in m.values_mut() {
            *v += 1;
        }
        assert_eq!(m.get(&3), Some(&104));
        assert_eq!(m.get(&39), Some(&40));
    }

    /// Invariant: release callbacks fire once per overwritten, removed and
    /// torn-down pair; take/replace bypass them.
    #[test]
    fn release_callbacks_fire_on_every_exit_path() {
        let keys = Rc::new(RefCell::new(Vec::new()));
        let values = Rc::new(RefCell::new(Vec::new()));
        let (ks, vs) = (keys.clone(), values.clone());
        let mut m: IncHashMap<u32, String, IntHash> = IncHashMap::builder()
            .hasher(IntHash)
            .release_key(move |k: u32| ks.borrow_mut().push(k))
            .release_value(move |v: String| vs.borrow_mut().push(v))
            .build();

        m.insert(1, "a".into());
        m.insert(1, "b".into()); // overwrite releases 1/"a"
        m.insert(2, "c".into());
        assert!(m.remove(&2)); // releases 2/"c"
        m.insert(3, "d".into());
        assert_eq!(m.take(&3), Some((3, "d".to_string())));
        assert_eq!(m.replace(1, "e".into()), Some((1, "b".to_string())));
        assert_eq!(*keys.borrow(), vec![1, 2]);
        assert_eq!(*values.borrow(), vec!["a", "c"]);

        drop(m); // releases 1/"e"
        assert_eq!(*keys.borrow(), vec![1, 2, 1]);
        assert_eq!(*values.borrow(), vec!["a", "c", "e"]);
    }

    #[test]
    fn set_release_swaps_callbacks() {
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let mut m: IncHashMap<u32, u32> = IncHashMap::new();
        assert!(m
            .set_release_value(Some(Box::new(move |_: u32| *h.borrow_mut() += 1)))
            .is_none());
        m.insert(1, 1);
        m.insert(1, 2);
        assert_eq!(*hits.borrow(), 1);
        assert!(m.set_release_value(None).is_some());
        m.insert(1, 3);
        assert_eq!(*hits.borrow(), 1);
    }

    /// Invariant: swapping the key callback hands back the previous one,
    /// which still works when called directly.
    #[test]
    fn set_release_key_swaps_callbacks() {
        let first = Rc::new(RefCell::new(Vec::new()));
        let second = Rc::new(RefCell::new(Vec::new()));
        let (f, s) = (first.clone(), second.clone());
        let mut m: IncHashMap<u32, u32, IntHash> = IncHashMap::with_hasher(IntHash);
        assert!(m
            .set_release_key(Some(Box::new(move |k: u32| f.borrow_mut().push(k))))
            .is_none());
        m.insert(1, 1);
        m.insert(1, 2);
        assert!(m.remove(&1));
        assert_eq!(*first.borrow(), vec![1, 1]);

        let mut previous = m
            .set_release_key(Some(Box::new(move |k: u32| s.borrow_mut().push(k))))
            .expect("previous key callback");
        m.insert(2, 2);
        assert!(m.remove(&2));
        assert_eq!(*first.borrow(), vec![1, 1]);
        assert_eq!(*second.borrow(), vec![2]);

        previous(9);
        assert_eq!(*first.borrow(), vec![1, 1, 9]);
        assert!(m.set_release_key(None).is_some());
        m.insert(3, 3);
        assert!(m.remove(&3));
        assert_eq!(*second.borrow(), vec![2]);
    }

    /// Invariant: teardown releases entries still waiting in the old array.
    #[test]
    fn drop_releases_both_arrays() {
        let released = Rc::new(RefCell::new(BTreeSet::new()));
        let r = released.clone();
        let mut m: IncHashMap<u32, (), IntHash> = IncHashMap::builder()
            .hasher(IntHash)
            .release_key(move |k: u32| {
                r.borrow_mut().insert(k);
            })
            .build();
        for k in 0..27 {
            m.insert(k, ());
        }
        assert!(m.is_migrating());
        drop(m);
        assert_eq!(*released.borrow(), (0..27).collect::<BTreeSet<_>>());
    }

    #[test]
    fn clear_releases_and_keeps_capacity() {
        let count = Rc::new(RefCell::new(0));
        let c = count.clone();
        let mut m: IncHashMap<u32, u32, IntHash> = IncHashMap::builder()
            .hasher(IntHash)
            .release_value(move |_: u32| *c.borrow_mut() += 1)
            .build();
        for k in 0..30 {
            m.insert(k, k);
        }
        let cap = m.capacity();
        m.clear();
        assert_eq!(*count.borrow(), 30);
        assert!(m.is_empty());
        assert!(!m.is_migrating());
        assert_eq!(m.capacity(), cap);
        assert_eq!(m.get(&1), None);
        m.insert(1, 1);
        assert_eq!(m.get(&1), Some(&1));
    }

    /// Invariant: node handles resolve while their entry is in place and
    /// report `Stale` once it is removed or migrated away.
    #[test]
    fn node_handles_validate() {
        let mut m: IncHashMap<u32, u32, IntHash> = IncHashMap::with_hasher(IntHash);
        m.insert(7, 70);
        let n = m.find_node(&7).unwrap();
        assert_eq!(m.node_key(n), Ok(&7));
        assert_eq!(m.node_value(n), Ok(&70));
        *m.node_value_mut(n).unwrap() = 71;
        assert_eq!(m.get(&7), Some(&71));

        assert!(m.remove(&7));
        assert_eq!(m.node_key(n), Err(NodeError::Stale));
        // Same slot, new entry: the old handle must not alias it.
        m.insert(7, 1);
        assert_eq!(m.node_value(n), Err(NodeError::Stale));
        assert_ne!(m.find_node(&7), Some(n));
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let mut a: IncHashMap<u32, u32> = IncHashMap::new();
        let mut b: IncHashMap<u32, u32> = IncHashMap::new();
        a.insert(1, 1);
        b.insert(1, 1);
        let n = a.find_node(&1).unwrap();
        assert_eq!(b.node_key(n), Err(NodeError::WrongMap));
        assert_eq!(b.node_value_mut(n), Err(NodeError::WrongMap));
        assert_eq!(b.next(n), Err(NodeError::WrongMap));
    }

    #[test]
    fn set_hasher_keeps_keys_reachable() {
        let mut m: IncHashMap<u32, u32, IntHash> = IncHashMap::with_hasher(IntHash);
        for k in 0..40 {
            m.insert(k, k * 2);
        }
        let n = m.find_node(&5).unwrap();
        m.remove(&9);
        let _previous: IntHash = m.set_hasher(IntHash);
        assert!(!m.is_migrating());
        assert_eq!(m.tombstones(), 0);
        assert_eq!(m.len(), 39);
        for k in (0..40).filter(|&k| k != 9) {
            assert_eq!(m.get(&k), Some(&(k * 2)));
        }
        assert_eq!(m.node_key(n), Err(NodeError::Stale));
    }

    #[test]
    fn debug_and_collect() {
        let m: IncHashMap<u32, &str, IntHash> = [(1, "one")].into_iter().collect();
        assert_eq!(format!("{m:?}"), r#"{1: "one"}"#);
    }

    /// Invariant (debug-only): calling into the map from `K: Eq` during a
    /// probe panics, naming both operations.
    #[cfg(debug_assertions)]
    #[test]
    fn reentrancy_from_eq_panics() {
        use core::hash::Hasher;

        struct ReentryKey {
            id: u32,
            map: *const IncHashMap<ReentryKey, i32, IntHash>,
        }
        impl PartialEq for ReentryKey {
            fn eq(&self, other: &Self) -> bool {
                if !other.map.is_null() {
                    // Attempt to re-enter the same map during probing.
                    unsafe {
                        let m = &*other.map;
                        let _ = m.first();
                    }
                }
                self.id == other.id
            }
        }
        impl Eq for ReentryKey {}
        impl Hash for ReentryKey {
            fn hash<H: Hasher>(&self, state: &mut H) {
                state.write_u32(self.id);
            }
        }

        let mut m: IncHashMap<ReentryKey, i32, IntHash> = IncHashMap::with_hasher(IntHash);
        m.insert(
            ReentryKey {
                id: 1,
                map: core::ptr::null(),
            },
            1,
        );
        let query = ReentryKey {
            id: 1,
            map: &m as *const _,
        };
        let res = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _ = m.contains_key(&query);
        }));
        assert!(res.is_err(), "expected reentrancy to panic in debug builds");
    }
}
