use crate::asset::cache::AssetCache;
use crate::asset::handle::{Asset, AssetRef, LoadedAsset};
use crate::asset::key::{AssetKey, CachePolicy};
use crate::util::weak_dashmap::WeakValueDashMapPruneOnInsert;

/// Remembers an asset for as long as somebody else holds on to it.
pub struct WeakAssetCache {
    entries: WeakValueDashMapPruneOnInsert<AssetKey, dyn Asset>,
}

impl WeakAssetCache {
    pub fn new() -> Self {
        Self {
            entries: WeakValueDashMapPruneOnInsert::with_capacity(100),
        }
    }
}

impl Default for WeakAssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache for WeakAssetCache {
    fn policy(&self) -> CachePolicy {
        CachePolicy::Weak
    }

    fn store(&self, key: &AssetKey, asset: AssetRef) {
        self.entries.insert(key.clone(), &asset);
    }

    fn fetch(&self, key: &AssetKey) -> Option<LoadedAsset> {
        self.entries.get(key).map(LoadedAsset::shared)
    }

    fn delete(&self, key: &AssetKey) -> bool {
        self.entries.remove(key)
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn reap(&self) -> usize {
        self.entries.prune()
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
