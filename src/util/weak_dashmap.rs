use dashmap::DashMap;
use std::hash::Hash;
use std::sync::{Arc, Weak};

/// A concurrent hash map that only holds weak references to its values, so the values can be
/// freed by whoever owns the last [`Arc`]. Expired entries are pruned whenever an insert would
/// have to grow the map, and on demand through [`WeakValueDashMapPruneOnInsert::prune`].
/// Compare it to https://docs.rs/weak-table/latest/weak_table/, but it additionally is based on
/// DashMap to allow for interior mutability.
pub struct WeakValueDashMapPruneOnInsert<K, V: ?Sized> {
    inner: DashMap<K, Weak<V>>,
}

impl<K: Eq + Hash, V: ?Sized> WeakValueDashMapPruneOnInsert<K, V> {
    pub fn new() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: DashMap::with_capacity(capacity),
        }
    }

    #[inline]
    pub fn insert(&self, key: K, value: &Arc<V>) {
        self.try_prune();
        self.inner.insert(key, Arc::downgrade(value));
    }

    /// `None` if there is no entry or its value has been dropped.
    #[inline]
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        self.inner.get(key).and_then(|weak| weak.upgrade())
    }

    #[inline]
    pub fn remove(&self, key: &K) -> bool {
        self.inner.remove(key).is_some_and(|(_, weak)| weak.strong_count() > 0)
    }

    #[inline]
    pub fn clear(&self) {
        self.inner.clear();
    }

    /// Number of entries, including expired ones that have not been pruned yet.
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drops all expired entries and returns how many there were.
    pub fn prune(&self) -> usize {
        let before = self.inner.len();
        self.inner.retain(|_, weak| weak.strong_count() > 0);
        before.saturating_sub(self.inner.len())
    }

    #[inline]
    fn try_prune(&self) {
        // Would have to allocate after the next insert.
        if self.inner.capacity() == self.inner.len() {
            self.prune();
        }
    }

    #[inline]
    pub fn shrink_to_fit(&self) {
        self.inner.shrink_to_fit()
    }
}

impl<K: Eq + Hash, V: ?Sized> Default for WeakValueDashMapPruneOnInsert<K, V> {
    fn default() -> Self {
        Self::new()
    }
}
