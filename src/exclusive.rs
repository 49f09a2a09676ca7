//! Debug-only exclusivity guard.
//!
//! Map operations call back into user code (`K: Eq`, `K: Hash`) while the
//! table is mid-operation. Calling into the same map from there is a bug;
//! in debug builds the guard catches it and names both operations. In
//! release builds it compiles to nothing.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Per-map record of the operation currently in progress. Public entry
/// points start with `let _g = self.exclusive.enter("name");`.
#[derive(Debug)]
pub(crate) struct Exclusive {
    #[cfg(debug_assertions)]
    active: Cell<Option<&'static str>>,
    // Single-threaded: keep the owning map !Send + !Sync.
    _nosend: PhantomData<*mut ()>,
}

impl Exclusive {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            active: Cell::new(None),
            _nosend: PhantomData,
        }
    }

    /// Mark `op` as in progress until the returned guard drops. Panics in
    /// debug builds if another operation is already in progress.
    #[inline]
    pub(crate) fn enter(&self, op: &'static str) -> ExclusiveGuard<'_> {
        #[cfg(debug_assertions)]
        {
            if let Some(outer) = self.active.get() {
                panic!("`{op}` re-entered the map while `{outer}` was in progress");
            }
            self.active.set(Some(op));
            ExclusiveGuard { owner: self }
        }

        #[cfg(not(debug_assertions))]
        {
            let _ = op;
            ExclusiveGuard { _z: PhantomData }
        }
    }

    /// The operation currently in progress, if any. Always `None` in
    /// release builds.
    #[cfg(test)]
    pub(crate) fn active(&self) -> Option<&'static str> {
        #[cfg(debug_assertions)]
        {
            self.active.get()
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    }
}

impl Default for Exclusive {
    fn default() -> Self {
        Self::new()
    }
}

pub(crate) struct ExclusiveGuard<'a> {
    #[cfg(debug_assertions)]
    owner: &'a Exclusive,
    #[cfg(not(debug_assertions))]
    _z: PhantomData<&'a ()>,
}

impl Drop for ExclusiveGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.active.get().is_some());
            self.owner.active.set(None);
        }
    }
}
