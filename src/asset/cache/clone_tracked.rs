use std::sync::{Arc, Weak};

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use log::trace;

use crate::asset::cache::{AssetCache, CloneLease};
use crate::asset::handle::{AssetRef, LoadedAsset};
use crate::asset::key::{AssetKey, CachePolicy};

struct CloneEntry {
    canonical: AssetRef,
    lease: Weak<CloneLease>,
}

impl CloneEntry {
    fn has_live_clones(&self) -> bool {
        self.lease.strong_count() > 0
    }

    /// Somebody besides the cache holds the canonical value.
    fn is_held_externally(&self) -> bool {
        Arc::strong_count(&self.canonical) > 1
    }
}

/// Keeps one canonical value per key and hands out leases to the clones made from it.
///
/// All clones of an entry share one [`CloneLease`]. Dropping the last of them marks the key as
/// pending, and the next [`AssetCache::reap`] removes the entry unless it has been cloned again in
/// the meantime or the canonical value is still held outside of the cache. Entries held that way
/// stay pending. The pending set never holds more keys than there are entries.
pub struct CloneTrackedAssetCache {
    entries: DashMap<AssetKey, CloneEntry>,
    pending: Arc<DashSet<AssetKey>>,
}

impl CloneTrackedAssetCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            pending: Arc::new(DashSet::new()),
        }
    }

    fn lease(&self, key: &AssetKey) -> Option<(AssetRef, Arc<CloneLease>)> {
        let mut entry = self.entries.get_mut(key)?;
        let lease = match entry.lease.upgrade() {
            Some(lease) => lease,
            None => {
                let lease = Arc::new(CloneLease::new(key.clone(), self.pending.clone()));
                entry.lease = Arc::downgrade(&lease);
                lease
            }
        };

        Some((entry.canonical.clone(), lease))
    }
}

impl Default for CloneTrackedAssetCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetCache for CloneTrackedAssetCache {
    fn policy(&self) -> CachePolicy {
        CachePolicy::CloneTracked
    }

    /// Replacing an entry keeps its lease, clones of the previous value still pin the key.
    fn store(&self, key: &AssetKey, asset: AssetRef) {
        self.reap();
        match self.entries.entry(key.clone()) {
            Entry::Occupied(mut occupied) => occupied.get_mut().canonical = asset,
            Entry::Vacant(vacant) => {
                vacant.insert(CloneEntry {
                    canonical: asset,
                    lease: Weak::new(),
                });
            }
        }
        // an entry that never gets cloned is reclaimable as well
        self.pending.insert(key.clone());
    }

    fn fetch(&self, key: &AssetKey) -> Option<LoadedAsset> {
        self.lease(key)
            .map(|(canonical, lease)| LoadedAsset::leased(canonical, lease))
    }

    fn delete(&self, key: &AssetKey) -> bool {
        self.entries.remove(key).is_some()
    }

    fn clear(&self) {
        self.entries.clear();
    }

    fn register_clone(&self, key: &AssetKey, clone: AssetRef) -> LoadedAsset {
        match self.lease(key) {
            Some((_, lease)) => LoadedAsset::leased(clone, lease),
            None => {
                trace!("{} left the cache before its clone was registered", key);
                LoadedAsset::shared(clone)
            }
        }
    }

    fn reap(&self) -> usize {
        let candidates: Vec<AssetKey> = self.pending.iter().map(|key| key.key().clone()).collect();

        let mut reaped = 0;
        for key in candidates {
            // unmark first, a lease dropped from here on marks the key again
            self.pending.remove(&key);

            let mut held = false;
            let removed = self.entries.remove_if(&key, |_, entry| {
                held = !entry.has_live_clones() && entry.is_held_externally();
                !entry.has_live_clones() && !entry.is_held_externally()
            });

            if removed.is_some() {
                trace!("Reaped {} from the clone cache", key);
                reaped += 1;
            } else if held {
                self.pending.insert(key);
            }
        }

        reaped
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}
