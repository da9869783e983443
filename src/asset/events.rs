use std::sync::Arc;

use arc_swap::ArcSwap;
use itertools::Itertools;

use crate::asset::key::AssetKey;

/// Observer for the asset manager. All methods default to doing nothing.
pub trait AssetEventListener: Send + Sync {
    /// A resolution missed the cache and is about to locate the asset.
    fn asset_requested(&self, _key: &AssetKey) {}

    fn asset_loaded(&self, _key: &AssetKey) {}

    /// A dependency of `parent` could not be located. The loader of `parent` may swallow the
    /// error, so this can be the only trace of the missing asset.
    fn asset_dependency_not_found(&self, _parent: &AssetKey, _dependency: &AssetKey) {}
}

/// Copy on write listener list, notifying never waits on registration.
pub struct EventListeners {
    listeners: ArcSwap<Vec<Arc<dyn AssetEventListener>>>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self {
            listeners: ArcSwap::from_pointee(Vec::new()),
        }
    }

    pub fn add(&self, listener: Arc<dyn AssetEventListener>) {
        self.listeners.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(listener.clone());
            next
        });
    }

    /// Removes by identity.
    pub fn remove(&self, listener: &Arc<dyn AssetEventListener>) {
        self.listeners.rcu(|current| {
            current
                .iter()
                .filter(|candidate| !Arc::ptr_eq(candidate, listener))
                .cloned()
                .collect_vec()
        });
    }

    pub fn clear(&self) {
        self.listeners.store(Arc::new(Vec::new()));
    }

    /// Replaces all listeners with `listener`.
    pub fn set(&self, listener: Arc<dyn AssetEventListener>) {
        self.listeners.store(Arc::new(vec![listener]));
    }

    pub fn len(&self) -> usize {
        self.listeners.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn asset_requested(&self, key: &AssetKey) {
        for listener in self.listeners.load().iter() {
            listener.asset_requested(key);
        }
    }

    pub fn asset_loaded(&self, key: &AssetKey) {
        for listener in self.listeners.load().iter() {
            listener.asset_loaded(key);
        }
    }

    pub fn asset_dependency_not_found(&self, parent: &AssetKey, dependency: &AssetKey) {
        for listener in self.listeners.load().iter() {
            listener.asset_dependency_not_found(parent, dependency);
        }
    }
}

impl Default for EventListeners {
    fn default() -> Self {
        Self::new()
    }
}
