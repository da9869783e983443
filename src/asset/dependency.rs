use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::asset::key::AssetKey;

static NEXT_TRACKER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static PARENT_KEYS: RefCell<HashMap<u64, AssetKey>> = RefCell::new(HashMap::new());
}

/// Remembers, per thread, the outermost asset that is being loaded. A resolution that starts
/// while the slot is occupied is loading a dependency of that asset.
pub struct DependencyTracker {
    id: u64,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self {
            id: NEXT_TRACKER_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn parent(&self) -> Option<AssetKey> {
        PARENT_KEYS.with(|keys| keys.borrow().get(&self.id).cloned())
    }

    /// Claims the slot for `key` if it is free. Only the returned scope that claimed it releases
    /// it again, nested scopes leave it alone.
    pub fn establish(&self, key: &AssetKey) -> DependencyScope<'_> {
        let claimed = PARENT_KEYS.with(|keys| {
            let mut keys = keys.borrow_mut();
            if keys.contains_key(&self.id) {
                false
            } else {
                keys.insert(self.id, key.clone());
                true
            }
        });

        DependencyScope {
            tracker: self,
            key: claimed.then(|| key.clone()),
        }
    }

    fn release(&self, key: &AssetKey) {
        let _ = PARENT_KEYS.try_with(|keys| {
            let mut keys = keys.borrow_mut();
            if keys.get(&self.id) == Some(key) {
                keys.remove(&self.id);
            }
        });
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for DependencyTracker {
    fn drop(&mut self) {
        let _ = PARENT_KEYS.try_with(|keys| keys.borrow_mut().remove(&self.id));
    }
}

pub struct DependencyScope<'a> {
    tracker: &'a DependencyTracker,
    key: Option<AssetKey>,
}

impl DependencyScope<'_> {
    #[cfg(test)]
    fn is_outermost(&self) -> bool {
        self.key.is_some()
    }
}

impl Drop for DependencyScope<'_> {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.tracker.release(&key);
        }
    }
}
