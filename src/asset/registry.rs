use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;
use dashmap::DashMap;
use itertools::Itertools;
use log::{debug, trace};

use crate::asset::error::{AssetError, AssetResult};
use crate::asset::info::AssetInfo;
use crate::asset::key::{AssetKey, ProcessorKind};
use crate::asset::manager::AssetManager;
use crate::asset::plugin::{AssetLoader, AssetLocator, AssetProcessor, LoaderFactory, LocatorFactory};
use crate::asset::thread_owned::ThreadOwned;

type BuildSingleton<V> = dyn Fn() -> anyhow::Result<Arc<V>> + Send + Sync;

/// Lazily constructed, shared instances, at most one per tag.
pub struct Singletons<K, V: ?Sized> {
    factories: DashMap<K, Arc<BuildSingleton<V>>>,
    instances: DashMap<K, Arc<V>>,
    construction: Mutex<()>,
}

impl<K: Eq + Hash + Clone + std::fmt::Debug, V: ?Sized> Singletons<K, V> {
    pub fn new() -> Self {
        Self {
            factories: DashMap::new(),
            instances: DashMap::new(),
            construction: Mutex::new(()),
        }
    }

    /// Replaces both the factory and an already constructed instance.
    pub fn register<F>(&self, tag: K, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<V>> + Send + Sync + 'static,
    {
        let _guard = self.construction.lock().unwrap_or_else(PoisonError::into_inner);
        self.instances.remove(&tag);
        self.factories.insert(tag, Arc::new(factory));
    }

    pub fn is_registered(&self, tag: &K) -> bool {
        self.factories.contains_key(tag)
    }

    /// `Ok(None)` if nothing is registered for `tag`.
    pub fn get(&self, tag: &K) -> AssetResult<Option<Arc<V>>> {
        if let Some(instance) = self.instances.get(tag) {
            return Ok(Some(instance.clone()));
        }

        let _guard = self.construction.lock().unwrap_or_else(PoisonError::into_inner);
        // somebody else may have won the race for the lock
        if let Some(instance) = self.instances.get(tag) {
            return Ok(Some(instance.clone()));
        }

        let Some(factory) = self.factories.get(tag).map(|factory| factory.clone()) else {
            return Ok(None);
        };

        let instance = factory()
            .map_err(|err| AssetError::Configuration(format!("Failed to construct {:?}: {:#}", tag, err)))?;
        trace!("Constructed singleton for {:?}", tag);
        self.instances.insert(tag.clone(), instance.clone());
        Ok(Some(instance))
    }

    /// Instances that have been constructed so far.
    pub fn constructed(&self) -> Vec<Arc<V>> {
        self.instances
            .iter()
            .map(|entry| entry.value().clone())
            .collect_vec()
    }
}

impl<K: Eq + Hash + Clone + std::fmt::Debug, V: ?Sized> Default for Singletons<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

struct LocatorRegistration {
    root: String,
    factory_name: String,
    instances: ThreadOwned<dyn AssetLocator>,
}

/// Loader-by-extension table, ordered locator list and processor singletons.
///
/// Reads never wait for more than a map shard lock: the locator list is copy on write
/// (a lookup iterates a snapshot), the loader table is a [`DashMap`]. Writers are serialized.
pub struct PluginRegistry {
    loaders: DashMap<String, Arc<ThreadOwned<dyn AssetLoader>>>,
    locators: ArcSwap<Vec<Arc<LocatorRegistration>>>,
    processors: Singletons<ProcessorKind, dyn AssetProcessor>,
    registration: Mutex<()>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self {
            loaders: DashMap::new(),
            locators: ArcSwap::from_pointee(Vec::new()),
            processors: Singletons::new(),
            registration: Mutex::new(()),
        }
    }

    /// Binds the extensions to one shared per-thread pool. An extension that is already bound is
    /// silently taken over.
    pub fn register_loader(&self, extensions: &[&str], factory: LoaderFactory) {
        let _guard = self.registration.lock().unwrap_or_else(PoisonError::into_inner);
        let name = factory.name().to_string();
        let pool: Arc<ThreadOwned<dyn AssetLoader>> = Arc::new(ThreadOwned::new(&name, move || factory.build()));

        for extension in extensions {
            let extension = extension.to_ascii_lowercase();
            if let Some(previous) = self.loaders.insert(extension.clone(), pool.clone()) {
                debug!(
                    "Loader {} replaces {} for extension {}",
                    name,
                    previous.name(),
                    extension
                );
            }
        }

        debug!("Registered loader: {} for extensions {:?}", name, extensions);
    }

    pub fn unregister_loader(&self, extensions: &[&str]) {
        let _guard = self.registration.lock().unwrap_or_else(PoisonError::into_inner);
        for extension in extensions {
            if let Some((extension, pool)) = self.loaders.remove(&extension.to_ascii_lowercase()) {
                debug!("Unregistered loader: {} for extension {}", pool.name(), extension);
            }
        }
    }

    /// Appends a locator, lookups query locators in registration order.
    pub fn register_locator(&self, root: &str, factory: LocatorFactory) {
        let _guard = self.registration.lock().unwrap_or_else(PoisonError::into_inner);
        let factory_name = factory.name().to_string();
        let root_path = root.to_string();
        let registration = Arc::new(LocatorRegistration {
            root: root.to_string(),
            factory_name: factory_name.clone(),
            instances: ThreadOwned::new(&factory_name, move || factory.build(&root_path)),
        });

        self.locators.rcu(|current| {
            let mut next = Vec::clone(current);
            next.push(registration.clone());
            next
        });
        debug!("Registered locator: {} at {}", factory_name, root);
    }

    /// Removes every registration of `factory_name` with the given root.
    pub fn unregister_locator(&self, root: &str, factory_name: &str) {
        let _guard = self.registration.lock().unwrap_or_else(PoisonError::into_inner);
        self.locators.rcu(|current| {
            current
                .iter()
                .filter(|registration| registration.root != root || registration.factory_name != factory_name)
                .cloned()
                .collect_vec()
        });
        debug!("Unregistered locator: {} at {}", factory_name, root);
    }

    pub fn register_processor<F>(&self, kind: ProcessorKind, factory: F)
    where
        F: Fn() -> anyhow::Result<Arc<dyn AssetProcessor>> + Send + Sync + 'static,
    {
        self.processors.register(kind, factory);
    }

    /// `Ok(None)` for [`ProcessorKind::None`], a configuration error for kinds nobody registered.
    pub fn processor(&self, kind: &ProcessorKind) -> AssetResult<Option<Arc<dyn AssetProcessor>>> {
        if *kind == ProcessorKind::None {
            return Ok(None);
        }

        match self.processors.get(kind)? {
            Some(processor) => Ok(Some(processor)),
            None => Err(AssetError::Configuration(format!(
                "No processor registered for {:?}",
                kind
            ))),
        }
    }

    pub fn loader(&self, extension: &str) -> Option<Arc<ThreadOwned<dyn AssetLoader>>> {
        self.loaders.get(extension).map(|pool| pool.clone())
    }

    pub fn locator_count(&self) -> usize {
        self.locators.load().len()
    }

    /// Queries the calling thread's locator instances in registration order.
    pub fn locate(&self, manager: &AssetManager, key: &AssetKey) -> AssetResult<Option<AssetInfo>> {
        let locators = self.locators.load_full();
        for registration in locators.iter() {
            if let Some(info) = registration
                .instances
                .with(|locator| locator.locate(manager, key))?
            {
                trace!("{} located {} at {}", registration.factory_name, key, registration.root);
                return Ok(Some(info));
            }
        }

        Ok(None)
    }
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}
