use std::sync::Arc;

use dashmap::DashMap;

use crate::asset::info::AssetInfo;
use crate::asset::key::{AssetKey, reduce_path};
use crate::asset::manager::AssetManager;
use crate::asset::plugin::{AssetLocator, LocatorFactory};
use crate::io::common::source::BytesSource;

/// Named blobs shared between a [`MemoryLocator`] factory and whoever fills it.
#[derive(Clone, Default)]
pub struct MemoryStore {
    blobs: Arc<DashMap<String, Arc<[u8]>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names are normalized the same way asset keys are.
    pub fn insert(&self, name: &str, bytes: impl Into<Arc<[u8]>>) {
        self.blobs.insert(reduce_path(name), bytes.into());
    }

    pub fn remove(&self, name: &str) -> bool {
        self.blobs.remove(&reduce_path(name)).is_some()
    }

    pub fn get(&self, name: &str) -> Option<Arc<[u8]>> {
        self.blobs.get(name).map(|blob| blob.clone())
    }

    pub fn len(&self) -> usize {
        self.blobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.is_empty()
    }
}

/// Locates assets in a [`MemoryStore`]. The registration root is used as a name prefix, an empty
/// root or `/` matches every name.
pub struct MemoryLocator {
    prefix: String,
    store: MemoryStore,
}

impl MemoryLocator {
    pub const NAME: &'static str = "MemoryLocator";

    pub fn new(root: &str, store: MemoryStore) -> Self {
        Self {
            prefix: reduce_path(root),
            store,
        }
    }

    pub fn factory(store: MemoryStore) -> LocatorFactory {
        LocatorFactory::new(Self::NAME, move |root| {
            Ok(Box::new(MemoryLocator::new(root, store.clone())))
        })
    }

    fn blob_name(&self, key: &AssetKey) -> String {
        if self.prefix.is_empty() {
            key.name().to_string()
        } else {
            format!("{}/{}", self.prefix, key.name())
        }
    }
}

impl AssetLocator for MemoryLocator {
    fn locate(&mut self, _manager: &AssetManager, key: &AssetKey) -> Option<AssetInfo> {
        let name = self.blob_name(key);
        let bytes = self.store.get(&name)?;
        Some(AssetInfo::new(
            key.clone(),
            BytesSource::new(format!("memory:{}", name), bytes),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_and_normalization() {
        let store = MemoryStore::new();
        store.insert("/packs/base/./Sounds/Click.txt", b"click".to_vec());

        let manager = AssetManager::new();
        let key = AssetKey::new("Sounds/Click.txt");

        let mut scoped = MemoryLocator::new("packs/base", store.clone());
        let info = scoped.locate(&manager, &key).unwrap();
        assert_eq!(info.read_owned().unwrap(), b"click");
        assert_eq!(info.origin(), "memory:packs/base/Sounds/Click.txt");

        let mut unscoped = MemoryLocator::new("/", store.clone());
        assert!(unscoped.locate(&manager, &key).is_none());

        assert!(store.remove("packs/base/Sounds/Click.txt"));
        assert!(scoped.locate(&manager, &key).is_none());
    }
}
