//! inc-hashmap: an open-addressing hash map that spreads the cost of
//! growth across many inserts instead of paying it in one stop-the-world
//! rehash.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: bounded per-operation latency. No single insert moves more than
//!   a configurable handful of entries, except when the load bound would
//!   otherwise be violated.
//! - Layers:
//!   - `Slot`/`BucketArray`: a fixed-size array of empty, occupied and
//!     deleted (tombstone) slots.
//!   - `probe`: linear probing from `hash % capacity`, wrapping, bounded
//!     by one full cycle.
//!   - `Migration`: an outgrown array plus a cursor; `step` moves the next
//!     batch of occupied slots into the current array.
//!   - `RawTable`: the current array, the optional migration, counts, and
//!     the growth policy. Works on precomputed hashes only.
//!   - `IncHashMap<K, V, S>`: public API; hashes keys, runs release
//!     callbacks, issues node handles, and guards against reentrancy.
//!
//! Growth model
//! - Capacities follow a fixed list of primes (53, 97, 193, ... up to
//!   1610612741), then double.
//! - When an insert pushes `(len + tombstones) / capacity` above 0.5 a
//!   new array at the next capacity becomes current and the previous one
//!   becomes the old array. Every later insert moves a batch of old slots.
//! - If an insert crosses half load again while a migration is running,
//!   the rest of that migration is drained at once before the next one
//!   starts. The load bound therefore holds after every insert.
//! - Migrated old slots become tombstones so probe chains through the old
//!   array stay intact for keys not yet moved.
//!
//! Lookup model
//! - A key lives in exactly one place: the current array, or the old
//!   array at or after the cursor. Lookups probe current first, then old.
//! - Inserting a key that still waits in the old array updates it there.
//!
//! Hasher invariants
//! - Each entry stores its `u64` hash. Migration reuses it; `K: Hash` is
//!   only invoked on the way in, and again by `set_hasher`.
//!
//! Reentrancy
//! - Every map method holds a debug-only exclusive guard while it runs.
//!   User code reachable from inside (`K: Eq`, `K: Hash`, `BuildHasher`)
//!   must not call back into the same map; debug builds panic if it does.
//! - Release callbacks run after the structure is consistent again and
//!   outside the guard.
//!
//! Node handles
//! - `NodeHandle` names a slot of a specific array of a specific map.
//!   Resolving one re-checks all three, so handles outliving a removal,
//!   a finished migration, or a rehash report `NodeError::Stale` instead
//!   of aliasing whatever now occupies the slot.
//!
//! Notes and non-goals
//! - Single-threaded: release callbacks are `!Send` boxed closures.
//! - The map never shrinks.

mod bucket_array;
mod capacity;
mod config;
mod error;
mod exclusive;
pub mod hashing;
mod inc_hash_map;
mod inc_hash_map_proptest;
mod iter;
mod migration;
mod node;
mod probe;
mod raw_table;
mod release;
mod slot;

// Public surface
pub use capacity::{INITIAL_CAPACITY, PRIME_CAPACITIES};
pub use config::{Builder, Config, DEFAULT_MIGRATION_BATCH};
pub use error::NodeError;
pub use hashing::{ByAddress, IntHash, PointerHash, StringHash};
pub use inc_hash_map::IncHashMap;
pub use iter::{Iter, IterMut, Keys, Values, ValuesMut};
pub use node::NodeHandle;
pub use release::Release;
