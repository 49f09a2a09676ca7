//! Construction-time configuration.

use crate::capacity;
use crate::inc_hash_map::IncHashMap;
use crate::release::{Release, Releasers};
use core::hash::{BuildHasher, Hash};
use core::num::NonZeroUsize;
use hashbrown::hash_map::DefaultHashBuilder;

/// Old-array slots visited per insert while migrating.
///
/// At 4 a migration triggered by inserts alone finishes well before the new
/// array reaches half load; smaller batches may need the map to drain the
/// rest of a migration in one go to keep the load bound.
pub const DEFAULT_MIGRATION_BATCH: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(n) => n,
    None => panic!("batch must be non-zero"),
};

/// Tunables fixed for the lifetime of a map.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Config {
    pub(crate) migration_batch: NonZeroUsize,
    pub(crate) initial_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            migration_batch: DEFAULT_MIGRATION_BATCH,
            initial_capacity: capacity::INITIAL_CAPACITY,
        }
    }
}

impl Config {
    pub fn migration_batch(&self) -> usize {
        self.migration_batch.get()
    }

    pub fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }
}

/// Builder for [`IncHashMap`]; obtain one from [`IncHashMap::builder`].
///
/// ```
/// use core::num::NonZeroUsize;
/// use inc_hashmap::{IncHashMap, StringHash};
///
/// let mut m = IncHashMap::builder()
///     .hasher(StringHash)
///     .capacity(100)
///     .migration_batch(NonZeroUsize::new(8).unwrap())
///     .release_value(|v: Vec<u8>| drop(v))
///     .build();
/// m.insert("k".to_string(), vec![1, 2, 3]);
/// assert_eq!(m.capacity(), 389);
/// ```
pub struct Builder<K, V, S = DefaultHashBuilder> {
    hasher: S,
    config: Config,
    release_key: Option<Release<K>>,
    release_value: Option<Release<V>>,
}

impl<K, V> Builder<K, V> {
    pub(crate) fn new() -> Self {
        Self {
            hasher: DefaultHashBuilder::default(),
            config: Config::default(),
            release_key: None,
            release_value: None,
        }
    }
}

impl<K, V, S> Builder<K, V, S> {
    /// Hash strategy for the map.
    pub fn hasher<T>(self, hasher: T) -> Builder<K, V, T> {
        Builder {
            hasher,
            config: self.config,
            release_key: self.release_key,
            release_value: self.release_value,
        }
    }

    pub fn migration_batch(mut self, batch: NonZeroUsize) -> Self {
        self.config.migration_batch = batch;
        self
    }

    /// Start with the smallest capacity that holds `entries` without
    /// exceeding half load.
    pub fn capacity(mut self, entries: usize) -> Self {
        self.config.initial_capacity = capacity::capacity_for(entries);
        self
    }

    pub fn release_key(mut self, f: impl FnMut(K) + 'static) -> Self {
        self.release_key = Some(Box::new(f));
        self
    }

    pub fn release_value(mut self, f: impl FnMut(V) + 'static) -> Self {
        self.release_value = Some(Box::new(f));
        self
    }

    pub fn build(self) -> IncHashMap<K, V, S>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        IncHashMap::from_parts(
            self.hasher,
            self.config,
            Releasers::new(self.release_key, self.release_value),
        )
    }
}

impl<K, V, S: core::fmt::Debug> core::fmt::Debug for Builder<K, V, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Builder")
            .field("hasher", &self.hasher)
            .field("config", &self.config)
            .field("release_key", &self.release_key.is_some())
            .field("release_value", &self.release_value.is_some())
            .finish()
    }
}
