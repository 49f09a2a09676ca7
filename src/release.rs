//! Release callbacks for keys and values leaving the map.
//!
//! A stored key or value leaves the map in one of three ways: it is
//! overwritten by an upsert, removed, or torn down with the map. In each
//! case it is handed to the registered callback, or simply dropped when no
//! callback is registered. Callbacks never run for pairs handed back to the
//! caller (`take`, `replace`).

/// Callback receiving ownership of a key or value the map is done with.
pub type Release<T> = Box<dyn FnMut(T)>;

pub(crate) struct Releasers<K, V> {
    key: Option<Release<K>>,
    value: Option<Release<V>>,
}

impl<K, V> Releasers<K, V> {
    pub(crate) fn new(key: Option<Release<K>>, value: Option<Release<V>>) -> Self {
        Self { key, value }
    }

    pub(crate) fn set_key(&mut self, f: Option<Release<K>>) -> Option<Release<K>> {
        core::mem::replace(&mut self.key, f)
    }

    pub(crate) fn set_value(&mut self, f: Option<Release<V>>) -> Option<Release<V>> {
        core::mem::replace(&mut self.value, f)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.key.is_none() && self.value.is_none()
    }

    pub(crate) fn key(&mut self, k: K) {
        match self.key.as_mut() {
            Some(f) => f(k),
            None => drop(k),
        }
    }

    pub(crate) fn value(&mut self, v: V) {
        match self.value.as_mut() {
            Some(f) => f(v),
            None => drop(v),
        }
    }

    pub(crate) fn pair(&mut self, k: K, v: V) {
        self.key(k);
        self.value(v);
    }
}

impl<K, V> core::fmt::Debug for Releasers<K, V> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Releasers")
            .field("key", &self.key.is_some())
            .field("value", &self.value.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn registered_callbacks_receive_ownership() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (sk, sv) = (seen.clone(), seen.clone());
        let mut r: Releasers<String, String> = Releasers::new(
            Some(Box::new(move |k: String| sk.borrow_mut().push(format!("key:{k}")))),
            Some(Box::new(move |v: String| sv.borrow_mut().push(format!("value:{v}")))),
        );
        r.pair("a".into(), "1".into());
        assert_eq!(*seen.borrow(), vec!["key:a", "value:1"]);
    }

    /// Invariant: swapping a callback hands back the previous one intact.
    #[test]
    fn set_returns_previous_callback() {
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        let mut r: Releasers<u32, u32> = Releasers::new(None, None);
        assert!(r.is_empty());
        assert!(r.set_value(Some(Box::new(move |_: u32| *h.borrow_mut() += 1))).is_none());
        assert!(!r.is_empty());
        r.value(1);
        let mut prev = r.set_value(None).expect("previous callback");
        prev(2);
        r.value(3);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn unregistered_release_drops() {
        let tracker = Rc::new(());
        let mut r: Releasers<Rc<()>, ()> = Releasers::new(None, None);
        r.key(tracker.clone());
        assert_eq!(Rc::strong_count(&tracker), 1);
    }
}
