//! Capacity progression for backing arrays.
//!
//! Capacities are primes that sit roughly halfway between powers of two,
//! which keeps `hash % capacity` well distributed even for weak hashes such
//! as the identity hashes in [`crate::hashing`]. Past the last tabulated
//! prime the capacity doubles.

/// Ascending table of capacities. The first entry is the capacity of a
/// freshly created map.
pub const PRIME_CAPACITIES: [usize; 26] = [
    53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317, 196613, 393241, 786433,
    1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319, 201326611, 402653189,
    805306457, 1610612741,
];

pub const INITIAL_CAPACITY: usize = PRIME_CAPACITIES[0];

/// Returns true when `occupied` slots (live entries plus tombstones) exceed
/// half of `capacity`.
#[inline]
pub(crate) fn over_load(occupied: usize, capacity: usize) -> bool {
    occupied.saturating_mul(2) > capacity
}

/// The capacity that follows `current` in the progression.
///
/// Panics on `usize` overflow, which is treated like any other allocation
/// failure.
pub(crate) fn next_capacity(current: usize) -> usize {
    match PRIME_CAPACITIES.iter().copied().find(|&c| c > current) {
        Some(c) => c,
        None => current
            .checked_mul(2)
            .unwrap_or_else(|| panic!("capacity overflow growing past {current} slots")),
    }
}

/// Smallest capacity in the progression that holds `entries` live entries
/// without exceeding the load bound.
pub(crate) fn capacity_for(entries: usize) -> usize {
    let mut cap = INITIAL_CAPACITY;
    while over_load(entries, cap) {
        cap = next_capacity(cap);
    }
    cap
}
