//! Cache policies and the manager that selects them per key.
//!
//! Every [`CachePolicy`] other than `None` maps to one lazily constructed [`AssetCache`]
//! singleton. The clone-tracked policy replaces garbage-collector driven eviction with reference
//! counting: each handed-out clone holds a [`CloneLease`] of its entry, and when the last lease is
//! dropped the key is marked for the next [`AssetCache::reap`]. A key is marked at most once.

use std::fmt;
use std::sync::Arc;

use dashmap::DashSet;

use crate::asset::error::{AssetError, AssetResult};
use crate::asset::handle::{AssetRef, LoadedAsset};
use crate::asset::key::{AssetKey, CachePolicy};
use crate::asset::registry::Singletons;

pub mod clone_tracked;
pub mod simple;
pub mod weak;

pub use clone_tracked::CloneTrackedAssetCache;
pub use simple::SimpleAssetCache;
pub use weak::WeakAssetCache;

pub trait AssetCache: Send + Sync {
    fn policy(&self) -> CachePolicy;

    /// Replaces a previous entry for the key.
    fn store(&self, key: &AssetKey, asset: AssetRef);

    /// The canonical value. Clone-tracked caches attach a lease that keeps the entry alive for as
    /// long as the returned handle lives.
    fn fetch(&self, key: &AssetKey) -> Option<LoadedAsset>;

    fn delete(&self, key: &AssetKey) -> bool;

    fn clear(&self);

    /// Ties a clone of the entry's canonical value to the entry. Caches that don't track clones
    /// hand the clone back as is.
    fn register_clone(&self, _key: &AssetKey, clone: AssetRef) -> LoadedAsset {
        LoadedAsset::shared(clone)
    }

    /// Removes entries that nobody can reach anymore, returns how many.
    fn reap(&self) -> usize {
        0
    }

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Shared by all live clones of one clone-tracked entry.
pub struct CloneLease {
    key: AssetKey,
    released: Arc<DashSet<AssetKey>>,
}

impl CloneLease {
    pub(crate) fn new(key: AssetKey, released: Arc<DashSet<AssetKey>>) -> Self {
        Self { key, released }
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }
}

impl Drop for CloneLease {
    fn drop(&mut self) {
        self.released.insert(self.key.clone());
    }
}

impl fmt::Debug for CloneLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CloneLease({})", self.key)
    }
}

pub struct CacheManager {
    caches: Singletons<CachePolicy, dyn AssetCache>,
}

impl CacheManager {
    /// Registers the default caches for all policies.
    pub fn new() -> Self {
        let manager = Self {
            caches: Singletons::new(),
        };
        manager.register(CachePolicy::Unmanaged, || Arc::new(SimpleAssetCache::new()));
        manager.register(CachePolicy::CloneTracked, || Arc::new(CloneTrackedAssetCache::new()));
        manager.register(CachePolicy::Weak, || Arc::new(WeakAssetCache::new()));
        manager
    }

    pub fn register<F>(&self, policy: CachePolicy, factory: F)
    where
        F: Fn() -> Arc<dyn AssetCache> + Send + Sync + 'static,
    {
        self.caches.register(policy, move || Ok(factory()));
    }

    /// `Ok(None)` if the key declares no cache.
    pub fn cache_for(&self, key: &AssetKey) -> AssetResult<Option<Arc<dyn AssetCache>>> {
        let policy = key.cache_policy();
        if policy == CachePolicy::None {
            return Ok(None);
        }

        match self.caches.get(&policy)? {
            Some(cache) => Ok(Some(cache)),
            None => Err(AssetError::Configuration(format!(
                "Key {} requests the {:?} cache, but none is registered",
                key, policy
            ))),
        }
    }

    fn require(&self, key: &AssetKey) -> AssetResult<Arc<dyn AssetCache>> {
        self.cache_for(key)?
            .ok_or_else(|| AssetError::CacheMisuse { key: key.clone() })
    }

    pub fn fetch(&self, key: &AssetKey) -> AssetResult<Option<LoadedAsset>> {
        Ok(self.require(key)?.fetch(key))
    }

    pub fn store(&self, key: &AssetKey, asset: AssetRef) -> AssetResult<()> {
        self.require(key)?.store(key, asset);
        Ok(())
    }

    pub fn delete(&self, key: &AssetKey) -> AssetResult<bool> {
        Ok(self.require(key)?.delete(key))
    }

    pub fn register_clone(&self, key: &AssetKey, clone: AssetRef) -> AssetResult<LoadedAsset> {
        Ok(self.require(key)?.register_clone(key, clone))
    }

    /// Clears every cache that has been constructed.
    pub fn clear_all(&self) {
        for cache in self.caches.constructed() {
            cache.clear();
        }
    }

    pub fn reap(&self) -> usize {
        self.caches
            .constructed()
            .iter()
            .map(|cache| cache.reap())
            .sum()
    }
}

impl Default for CacheManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_without_cache_are_rejected() {
        let caches = CacheManager::new();
        let key = AssetKey::new("stream.ogg").with_cache(CachePolicy::None);

        assert!(caches.cache_for(&key).unwrap().is_none());
        assert!(matches!(caches.fetch(&key), Err(AssetError::CacheMisuse { .. })));
        assert!(matches!(
            caches.store(&key, Arc::new(String::new())),
            Err(AssetError::CacheMisuse { .. })
        ));
        assert!(matches!(caches.delete(&key), Err(AssetError::CacheMisuse { .. })));
    }

    #[test]
    fn one_instance_per_policy() {
        let caches = CacheManager::new();
        let first = caches.cache_for(&AssetKey::new("a.txt")).unwrap().unwrap();
        let second = caches.cache_for(&AssetKey::new("b.txt")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        let tracked = caches.cache_for(&AssetKey::model("c.obj")).unwrap().unwrap();
        assert_eq!(tracked.policy(), CachePolicy::CloneTracked);
    }

    #[test]
    fn clear_all_reaches_every_constructed_cache() {
        let caches = CacheManager::new();
        let plain = AssetKey::new("a.txt");
        let weak = AssetKey::new("b.txt").with_cache(CachePolicy::Weak);
        let held: AssetRef = Arc::new(String::from("b"));

        caches.store(&plain, Arc::new(String::from("a"))).unwrap();
        caches.store(&weak, held.clone()).unwrap();
        caches.clear_all();

        assert!(caches.fetch(&plain).unwrap().is_none());
        assert!(caches.fetch(&weak).unwrap().is_none());
    }
}
