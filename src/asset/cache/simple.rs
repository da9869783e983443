use dashmap::DashMap;

use crate::asset::cache::AssetCache;
use crate::asset::handle::{AssetRef, LoadedAsset};
use crate::asset::key::{AssetKey, CachePolicy};

/// Keeps entries until they are deleted or the cache is cleared.
pub struct SimpleAssetCache {
    entries: DashMap<AssetKey, AssetRef>,
}

impl SimpleAssetCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }
}

impl Default for SimpleAssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache for SimpleAssetCache {
    fn policy(&self) -> CachePolicy {
        CachePolicy::Unmanaged
    }

    fn store(&self, key: &AssetKey, asset: AssetRef) {
        self.entries.insert(key.clone(), asset);
    }

    fn fetch(&self, key: &AssetKey) -> Option<LoadedAsset> {
        self.entries
            .get(key)
            .map(|asset| LoadedAsset::shared(asset.clone()))
    }

    fn delete(&self, key: &AssetKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
