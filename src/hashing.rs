//! Reference hash strategies.
//!
//! The map hashes through any [`BuildHasher`]; the strategies here are the
//! classic table-friendly functions whose weak mixing is compensated by the
//! prime capacities the map uses:
//!
//! - [`StringHash`]: djb2 (`h = h * 33 + byte`, seeded with 5381) over the
//!   bytes the key's `Hash` impl writes. For `str` and `String` that is the
//!   UTF-8 bytes followed by the `0xff` terminator `str` always appends.
//! - [`IntHash`]: identity on integer writes.
//! - [`PointerHash`]: identity on addresses; pair it with [`ByAddress`] keys
//!   to key a map by object identity.

use core::hash::{BuildHasher, Hash, Hasher};

const DJB2_SEED: u64 = 5381;

/// Polynomial string hash with multiplier 33.
///
/// `StringHash.hash_one(s)` for a string `s` is djb2 over `s` plus one
/// trailing `0xff` byte, so it equals classic djb2 of `s` times 33 plus 255.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct StringHash;

#[derive(Copy, Clone, Debug)]
pub struct StringHasher {
    state: u64,
}

impl Default for StringHasher {
    fn default() -> Self {
        Self { state: DJB2_SEED }
    }
}

impl Hasher for StringHasher {
    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            // (h << 5) + h == h * 33
            self.state = (self.state << 5)
                .wrapping_add(self.state)
                .wrapping_add(u64::from(b));
        }
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

impl BuildHasher for StringHash {
    type Hasher = StringHasher;

    fn build_hasher(&self) -> StringHasher {
        StringHasher::default()
    }
}

/// Identity hash for integer keys.
///
/// Integer writes replace the state with the value itself (sign-extended for
/// signed types). Arbitrary byte writes are folded in big-endian order, so a
/// key that hashes as several integers ends up keyed by the last one.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct IntHash;

#[derive(Copy, Clone, Debug, Default)]
pub struct IntHasher {
    state: u64,
}

impl Hasher for IntHasher {
    fn write(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.state = (self.state << 8) | u64::from(b);
        }
    }

    #[inline]
    fn write_u8(&mut self, n: u8) {
        self.state = u64::from(n);
    }
    #[inline]
    fn write_u16(&mut self, n: u16) {
        self.state = u64::from(n);
    }
    #[inline]
    fn write_u32(&mut self, n: u32) {
        self.state = u64::from(n);
    }
    #[inline]
    fn write_u64(&mut self, n: u64) {
        self.state = n;
    }
    #[inline]
    fn write_u128(&mut self, n: u128) {
        self.state = n as u64;
    }
    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.state = n as u64;
    }
    #[inline]
    fn write_i8(&mut self, n: i8) {
        self.state = n as u64;
    }
    #[inline]
    fn write_i16(&mut self, n: i16) {
        self.state = n as u64;
    }
    #[inline]
    fn write_i32(&mut self, n: i32) {
        self.state = n as u64;
    }
    #[inline]
    fn write_i64(&mut self, n: i64) {
        self.state = n as u64;
    }
    #[inline]
    fn write_i128(&mut self, n: i128) {
        self.state = n as u64;
    }
    #[inline]
    fn write_isize(&mut self, n: isize) {
        self.state = n as u64;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

impl BuildHasher for IntHash {
    type Hasher = IntHasher;

    fn build_hasher(&self) -> IntHasher {
        IntHasher::default()
    }
}

/// Identity hash over addresses.
///
/// Raw pointers and [`ByAddress`] keys hash by writing their address as a
/// `usize`, which this hasher keeps as-is.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct PointerHash;

#[derive(Copy, Clone, Debug, Default)]
pub struct PointerHasher {
    state: u64,
}

impl Hasher for PointerHasher {
    fn write(&mut self, bytes: &[u8]) {
        // Only reached for non-address keys; fold like an integer.
        for &b in bytes {
            self.state = (self.state << 8) | u64::from(b);
        }
    }

    #[inline]
    fn write_usize(&mut self, n: usize) {
        self.state = n as u64;
    }

    #[inline]
    fn finish(&self) -> u64 {
        self.state
    }
}

impl BuildHasher for PointerHash {
    type Hasher = PointerHasher;

    fn build_hasher(&self) -> PointerHasher {
        PointerHasher::default()
    }
}

/// Key wrapper that hashes and compares a reference by address rather than
/// by value.
#[derive(Debug)]
pub struct ByAddress<'a, T: ?Sized>(pub &'a T);

impl<T: ?Sized> ByAddress<'_, T> {
    #[inline]
    pub fn addr(&self) -> usize {
        (self.0 as *const T).cast::<()>() as usize
    }
}

impl<T: ?Sized> Clone for ByAddress<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for ByAddress<'_, T> {}

impl<T: ?Sized> PartialEq for ByAddress<'_, T> {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl<T: ?Sized> Eq for ByAddress<'_, T> {}

impl<T: ?Sized> Hash for ByAddress<'_, T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.addr());
    }
}
