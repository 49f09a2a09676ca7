// IncHashMap property tests through the public API.
//
// Property 1: release accounting.
//  - Model: every value ever inserted is either still in the map, handed
//    back by take/replace, or passed to the release callback, exactly once.
//  - Operations: insert (may overwrite), replace, remove, take, clear.
//  - At the end the map is dropped and the three buckets must partition
//    the inserted values.
//
// Property 2: node traversal under mutation.
//  - Model: std HashMap.
//  - Invariant: a first/next walk visits each live key exactly once, and
//    handles captured before a mutation either resolve to the same key or
//    report an error.
use inc_hashmap::{IncHashMap, IntHash, NodeError};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::num::NonZeroUsize;
use std::rc::Rc;

// Property 1: each inserted value leaves the map exactly once.
proptest! {
    #[test]
    fn prop_release_accounting(
        batch in 1usize..=8,
        ops in proptest::collection::vec((0u8..=4u8, 0u64..150u64), 1..400),
    ) {
        let released = Rc::new(RefCell::new(Vec::new()));
        let r = released.clone();
        let mut m: IncHashMap<u64, u64, IntHash> = IncHashMap::builder()
            .hasher(IntHash)
            .migration_batch(NonZeroUsize::new(batch).unwrap())
            .release_value(move |v: u64| r.borrow_mut().push(v))
            .build();
        let mut handed_back: Vec<u64> = Vec::new();
        // Unique value per insert so every value can be tracked.
        let mut next_value = 0u64;
        let mut inserted: Vec<u64> = Vec::new();

        for (op, k) in ops {
            match op {
                0 | 1 => {
                    m.insert(k, next_value);
                    inserted.push(next_value);
                    next_value += 1;
                }
                2 => {
                    if let Some((pk, pv)) = m.replace(k, next_value) {
                        prop_assert_eq!(pk, k);
                        handed_back.push(pv);
                    }
                    inserted.push(next_value);
                    next_value += 1;
                }
                3 => {
                    if k % 2 == 0 {
                        m.remove(&k);
                    } else if let Some((_, v)) = m.take(&k) {
                        handed_back.push(v);
                    }
                }
                _ => {
                    if k == 0 {
                        m.clear();
                        prop_assert!(m.is_empty());
                    }
                }
            }
            prop_assert_eq!(
                m.len() + released.borrow().len() + handed_back.len(),
                inserted.len()
            );
        }

        drop(m);
        let mut exits: Vec<u64> = released.borrow().clone();
        exits.extend(handed_back);
        exits.sort_unstable();
        prop_assert_eq!(exits, inserted);
    }
}

// Property 2: traversal sees each live key once; captured handles never
// resolve to a different key.
proptest! {
    #[test]
    fn prop_walk_and_handles(
        keys in proptest::collection::vec(0u64..300, 1..300),
        removes in proptest::collection::vec(0u64..300, 0..100),
        later in proptest::collection::vec(300u64..600, 0..200),
    ) {
        let mut m: IncHashMap<u64, u64, IntHash> = IncHashMap::with_hasher(IntHash);
        let mut model: HashMap<u64, u64> = HashMap::new();
        for &k in &keys {
            m.insert(k, k);
            model.insert(k, k);
        }
        let captured: Vec<_> = keys.iter().filter_map(|k| m.find_node(k).map(|n| (*k, n))).collect();
        for k in &removes {
            prop_assert_eq!(m.remove(k), model.remove(k).is_some());
        }
        for &k in &later {
            m.insert(k, k);
            model.insert(k, k);
        }

        for (k, n) in captured {
            match m.node_key(n) {
                Ok(found) => prop_assert_eq!(*found, k),
                Err(e) => prop_assert_eq!(e, NodeError::Stale),
            }
        }

        let mut seen = BTreeSet::new();
        let mut cur = m.first();
        while let Some(n) = cur {
            prop_assert!(seen.insert(*m.node_key(n)?));
            cur = m.next(n)?;
        }
        prop_assert_eq!(seen, model.keys().copied().collect::<BTreeSet<_>>());
    }
}
