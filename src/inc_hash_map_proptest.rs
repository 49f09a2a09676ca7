#![cfg(test)]

// Property tests for IncHashMap kept inside the crate so they can check
// internal table state (tombstone counts, migration progress) directly.

use crate::error::NodeError;
use crate::hashing::IntHash;
use crate::inc_hash_map::IncHashMap;
use crate::node::NodeHandle;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::hash::Hasher;
use std::num::NonZeroUsize;

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Replace(usize, i32),
    Remove(usize),
    Take(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Iterate,
    Walk,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=80).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Replace(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::Take),
            2 => idx.clone().prop_map(OpI::Find),
            1 => prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Walk),
        ];
        proptest::collection::vec(op, 1..200).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Walk the map through first/next and collect the keys visited.
fn walk<K: Clone + Ord, V, S>(sut: &IncHashMap<K, V, S>) -> Result<Vec<K>, NodeError> {
    let mut out = Vec::new();
    let mut cur = sut.first();
    while let Some(n) = cur {
        out.push(sut.node_key(n)?.clone());
        cur = sut.next(n)?;
    }
    Ok(out)
}

// Drives one scenario against a model. Shared by the hasher variants below.
fn run_scenario<S>(
    mut sut: IncHashMap<Key, i32, S>,
    pool: &[String],
    ops: Vec<OpI>,
) -> Result<(), TestCaseError>
where
    S: std::hash::BuildHasher,
{
    let mut model: HashMap<Key, i32> = HashMap::new();
    let mut stale: Vec<NodeHandle> = Vec::new();

    for op in ops {
        let inserting = matches!(op, OpI::Insert(..) | OpI::Replace(..));
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(pool, i);
                sut.insert(k.clone(), v);
                model.insert(k, v);
            }
            OpI::Replace(i, v) => {
                let k = key_from(pool, i);
                let prev = sut.replace(k.clone(), v);
                let mprev = model.insert(k.clone(), v);
                prop_assert_eq!(prev.map(|(_, pv)| pv), mprev);
            }
            OpI::Remove(i) => {
                let k = key_from(pool, i);
                let node = sut.find_node(&k);
                let removed = sut.remove(&k);
                prop_assert_eq!(removed, model.remove(&k).is_some());
                prop_assert_eq!(node.is_some(), removed);
                stale.extend(node);
            }
            OpI::Take(i) => {
                let k = key_from(pool, i);
                let taken = sut.take(k.0.as_str());
                let expected = model.remove(&k).map(|v| (k.clone(), v));
                prop_assert_eq!(taken, expected);
            }
            OpI::Find(i) => {
                let k = key_from(pool, i);
                prop_assert_eq!(sut.get(&k), model.get(&k));
                match sut.find_node(&k) {
                    Some(n) => {
                        prop_assert_eq!(sut.node_key(n), Ok(&k));
                        prop_assert_eq!(Some(sut.node_value(n)?), model.get(&k));
                    }
                    None => prop_assert!(!model.contains_key(&k)),
                }
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.keys().any(|k| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(pool, i);
                if let Some(vr) = sut.get_mut(&k) {
                    *vr = vr.saturating_add(d);
                    let mv = model.get_mut(&k).expect("present in model");
                    *mv = mv.saturating_add(d);
                } else {
                    prop_assert!(!model.contains_key(&k));
                }
            }
            OpI::Iterate => {
                let s_keys: Vec<_> = sut.keys().cloned().collect();
                prop_assert_eq!(s_keys.len(), model.len());
                let s_set: BTreeSet<_> = s_keys.into_iter().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(s_set, m_keys);
            }
            OpI::Walk => {
                let walked = walk(&sut)?;
                prop_assert_eq!(walked.len(), model.len());
                let w_set: BTreeSet<_> = walked.into_iter().collect();
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(w_set, m_keys);
            }
        }

        // Post-conditions after each op
        // 1) Handles to removed entries never resolve
        for &n in &stale {
            prop_assert_eq!(sut.node_key(n), Err(NodeError::Stale));
        }
        // 2) Size parity
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        // 3) Load bound after every insert
        if inserting {
            prop_assert!(
                sut.load_factor() <= 0.5,
                "load {} after insert",
                sut.load_factor()
            );
        }
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - insert upserts; replace hands back exactly what the model held.
// - get/contains_key/find_node parity, across running migrations.
// - remove/take agree with the model and handles to removed entries go stale.
// - iter and first/next each yield every live entry exactly once.
// - len parity after each op; load factor at most 0.5 after each insert.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(IncHashMap::new(), &pool, ops)?;
    }

    #[test]
    fn prop_state_machine_batch_one((pool, ops) in arb_scenario()) {
        let sut = IncHashMap::builder()
            .migration_batch(NonZeroUsize::new(1).unwrap())
            .build();
        run_scenario(sut, &pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl std::hash::BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same state-machine invariants as above, under worst-case
// collision behavior (constant hasher). Every key shares one probe chain,
// so this stresses tombstone handling and migration of long clusters.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(IncHashMap::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}

// Property: dense integer workloads keep every inserted key reachable while
// migrations overlap with removals.
proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn prop_int_keys_survive_growth(
        keys in proptest::collection::vec(0u64..5_000, 1..600),
        removes in proptest::collection::vec(any::<proptest::sample::Index>(), 0..100),
    ) {
        let mut sut: IncHashMap<u64, u64, IntHash> = IncHashMap::with_hasher(IntHash);
        let mut model: HashMap<u64, u64> = HashMap::new();
        for (n, &k) in keys.iter().enumerate() {
            sut.insert(k, n as u64);
            model.insert(k, n as u64);
            prop_assert!(sut.load_factor() <= 0.5);
        }
        for ix in removes {
            let k = *ix.get(&keys);
            prop_assert_eq!(sut.remove(&k), model.remove(&k).is_some());
        }
        prop_assert_eq!(sut.len(), model.len());
        for (k, v) in &model {
            prop_assert_eq!(sut.get(k), Some(v));
        }
    }
}
