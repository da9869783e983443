use std::any::type_name;
use std::io::Read;
use std::sync::Arc;

use log::{trace, warn};

use crate::asset::cache::{AssetCache, CacheManager};
use crate::asset::dependency::DependencyTracker;
use crate::asset::error::{AssetError, AssetResult};
use crate::asset::events::{AssetEventListener, EventListeners};
use crate::asset::handle::{Asset, AssetRef, LoadedAsset, TypedAsset};
use crate::asset::info::AssetInfo;
use crate::asset::key::{AssetKey, CachePolicy, ProcessorKind};
use crate::asset::plugin::{AssetProcessor, CloneableProcessor, LoaderFactory, LocatorFactory};
use crate::asset::registry::PluginRegistry;
use crate::io::common::source::ReaderSource;

/// Turns [`AssetKey`]s into assets: cache lookup, locate, load, post-process, cache store and
/// cloning for smart assets. One manager owns its plugins, caches and listeners, nothing is
/// shared between managers.
///
/// All methods take `&self` and may be called from any thread. Two threads resolving the same
/// uncached key concurrently may both decode it, the last store wins.
pub struct AssetManager {
    registry: PluginRegistry,
    caches: CacheManager,
    listeners: EventListeners,
    dependencies: DependencyTracker,
}

impl AssetManager {
    /// A manager with the default caches and the cloneable processor, but without any loaders or
    /// locators.
    pub fn new() -> Self {
        let manager = Self {
            registry: PluginRegistry::new(),
            caches: CacheManager::new(),
            listeners: EventListeners::new(),
            dependencies: DependencyTracker::new(),
        };
        manager.register_processor(ProcessorKind::Cloneable, || Ok(Arc::new(CloneableProcessor)));
        manager
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    pub fn caches(&self) -> &CacheManager {
        &self.caches
    }

    pub fn register_loader(&self, extensions: &[&str], factory: LoaderFactory) {
        self.registry.register_loader(extensions, factory);
    }

    pub fn unregister_loader(&self, extensions: &[&str]) {
        self.registry.unregister_loader(extensions);
    }

    pub fn register_locator(&self, root: &str, factory: LocatorFactory) {
        self.registry.register_locator(root, factory);
    }

    pub fn unregister_locator(&self, root: &str, factory_name: &str) {
        self.registry.unregister_locator(root, factory_name);
    }

    pub fn register_processor<F>(&self, kind: ProcessorKind, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn AssetProcessor>> + Send + Sync + 'static,
    {
        self.registry.register_processor(kind, factory);
    }

    pub fn register_cache<F>(&self, policy: CachePolicy, factory: F)
    where
        F: Fn() -> Arc<dyn AssetCache> + Send + Sync + 'static,
    {
        self.caches.register(policy, factory);
    }

    pub fn add_event_listener(&self, listener: Arc<dyn AssetEventListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_event_listener(&self, listener: &Arc<dyn AssetEventListener>) {
        self.listeners.remove(listener);
    }

    pub fn clear_event_listeners(&self) {
        self.listeners.clear();
    }

    pub fn set_event_listener(&self, listener: Arc<dyn AssetEventListener>) {
        self.listeners.set(listener);
    }

    /// Locates without loading.
    pub fn locate_asset(&self, key: &AssetKey) -> AssetResult<Option<AssetInfo>> {
        let info = self.registry.locate(self, key)?;
        if info.is_none() {
            warn!("Cannot locate resource: {}", key);
        }
        Ok(info)
    }

    /// Resolves `key` to an asset.
    ///
    /// - unmanaged cache hits return the cached reference itself, callers must not mutate it
    /// - clone-tracked keys and smart assets always yield a fresh clone of the canonical value,
    ///   smart assets resolved through a key without cache are a configuration error
    /// - an asset that can't be located fails with [`AssetError::NotFound`]. When this happens
    ///   while another asset is being loaded on this thread, listeners additionally get
    ///   [`AssetEventListener::asset_dependency_not_found`], and the loader of that asset decides
    ///   whether the outer load fails.
    pub fn resolve(&self, key: &AssetKey) -> AssetResult<LoadedAsset> {
        let cache = self.caches.cache_for(key)?;

        if let Some(cache) = &cache {
            if let Some(cached) = cache.fetch(key) {
                trace!("Cache hit for {}", key);
                return self.hand_out(key, Some(&**cache), cached);
            }
        }

        self.listeners.asset_requested(key);

        let Some(info) = self.registry.locate(self, key)? else {
            if let Some(parent) = self.dependencies.parent() {
                self.listeners.asset_dependency_not_found(&parent, key);
            }
            return Err(AssetError::NotFound { key: key.clone() });
        };

        let processed = self.load_located(key, &info)?;

        if let Some(cache) = &cache {
            cache.store(key, processed.clone());
        }

        self.listeners.asset_loaded(key);

        match &cache {
            Some(cache) => {
                let canonical = cache
                    .fetch(key)
                    .unwrap_or_else(|| LoadedAsset::shared(processed));
                self.hand_out(key, Some(&**cache), canonical)
            }
            // clones of smart assets have to be tied to a cache entry
            None if processed.is_smart_clone() => Err(AssetError::Configuration(format!(
                "Asset {} has to be cloned, but its key declares no cache",
                key
            ))),
            None => Ok(LoadedAsset::shared(processed)),
        }
    }

    pub fn resolve_by_name(&self, name: &str) -> AssetResult<LoadedAsset> {
        self.resolve(&AssetKey::new(name))
    }

    /// [`AssetManager::resolve`] followed by a downcast to `T`.
    pub fn resolve_as<T: Asset>(&self, key: &AssetKey) -> AssetResult<TypedAsset<T>> {
        self.resolve(key)?.downcast::<T>().map_err(|asset| {
            AssetError::Configuration(format!(
                "Asset {} is a {:?}, not a {}",
                key,
                asset.value(),
                type_name::<T>()
            ))
        })
    }

    /// Decodes `reader` with the loader for the key's extension. Nothing is located and the
    /// result is never cached, smart assets are still cloned.
    pub fn load_from_reader(&self, key: &AssetKey, reader: impl Read + 'static) -> AssetResult<LoadedAsset> {
        let info = AssetInfo::new(key.clone(), ReaderSource::new(Box::new(reader)));
        let processed = self.load_located(key, &info)?;
        self.hand_out(key, None, LoadedAsset::shared(processed))
    }

    /// For clone-tracked keys, a fresh clone of the cached value.
    pub fn fetch_from_cache(&self, key: &AssetKey) -> AssetResult<Option<LoadedAsset>> {
        let Some(cached) = self.caches.fetch(key)? else {
            return Ok(None);
        };

        if key.cache_policy() == CachePolicy::CloneTracked {
            let cache = self.caches.cache_for(key)?;
            return self.mint_clone(key, cache.as_deref(), cached.value()).map(Some);
        }

        Ok(Some(cached))
    }

    pub fn store_to_cache(&self, key: &AssetKey, asset: AssetRef) -> AssetResult<()> {
        self.caches.store(key, asset)
    }

    pub fn delete_from_cache(&self, key: &AssetKey) -> AssetResult<bool> {
        self.caches.delete(key)
    }

    pub fn clear_cache(&self) {
        self.caches.clear_all();
        trace!("All asset caches cleared.");
    }

    /// Runs a reap cycle on every cache, returns the number of evicted entries.
    pub fn reap(&self) -> usize {
        self.caches.reap()
    }

    /// Load and post-process, the part shared by located and streamed assets.
    fn load_located(&self, key: &AssetKey, info: &AssetInfo) -> AssetResult<AssetRef> {
        let decoded = {
            let _scope = self.dependencies.establish(key);
            self.decode(key, info)?
        };

        match self.registry.processor(key.processor())? {
            Some(processor) => processor
                .post_process(key, decoded)
                .map_err(|source| AssetError::Load {
                    key: key.clone(),
                    source,
                }),
            None => Ok(decoded),
        }
    }

    fn decode(&self, key: &AssetKey, info: &AssetInfo) -> AssetResult<AssetRef> {
        let Some(loader) = self.registry.loader(key.extension()) else {
            return Err(AssetError::NoLoader {
                extension: key.extension().to_string(),
            });
        };

        let decoded = loader
            .with(|instance| instance.load(self, info))?
            .map_err(|source| AssetError::Load {
                key: key.clone(),
                source,
            })?;

        match decoded {
            Some(asset) => {
                trace!("Loaded {} with {} from {}", key, loader.name(), info.origin());
                Ok(asset)
            }
            None => Err(AssetError::Load {
                key: key.clone(),
                source: anyhow::anyhow!("{} produced no object", loader.name()),
            }),
        }
    }

    /// Decides between handing out the canonical value and a clone of it.
    fn hand_out(&self, key: &AssetKey, cache: Option<&dyn AssetCache>, canonical: LoadedAsset) -> AssetResult<LoadedAsset> {
        let clone_tracked = cache.is_some_and(|cache| cache.policy() == CachePolicy::CloneTracked);
        if clone_tracked || canonical.is_smart_clone() {
            return self.mint_clone(key, cache, canonical.value());
        }

        Ok(canonical)
    }

    fn mint_clone(&self, key: &AssetKey, cache: Option<&dyn AssetCache>, canonical: &AssetRef) -> AssetResult<LoadedAsset> {
        let Some(processor) = self.registry.processor(key.processor())? else {
            return Err(AssetError::Configuration(format!(
                "Asset {} has to be cloned, but its key declares no processor",
                key
            )));
        };

        let clone = processor
            .create_clone(canonical)
            .map_err(|source| AssetError::Load {
                key: key.clone(),
                source,
            })?;

        if Arc::ptr_eq(&clone, canonical) {
            return Err(AssetError::Configuration(format!(
                "The processor for {} returned the original instead of a clone",
                key
            )));
        }

        Ok(match cache {
            Some(cache) => cache.register_clone(key, clone),
            None => LoadedAsset::shared(clone),
        })
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new()
    }
}
