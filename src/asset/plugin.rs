//! Contracts for the pluggable parts of asset resolution and the factories they are registered
//! with. Locator and loader instances are created per thread and may keep mutable state, so
//! they get `&mut self` and need neither `Send` nor `Sync`. Processors are shared between all
//! threads.

use std::fmt;
use std::sync::Arc;

use crate::asset::handle::AssetRef;
use crate::asset::info::AssetInfo;
use crate::asset::key::AssetKey;
use crate::asset::manager::AssetManager;

pub trait AssetLocator {
    /// `None` if this locator doesn't know the asset.
    fn locate(&mut self, manager: &AssetManager, key: &AssetKey) -> Option<AssetInfo>;
}

pub trait AssetLoader {
    /// Decodes the located resource. Dependencies can be resolved through `manager`; a missing
    /// dependency surfaces as [`crate::asset::AssetError::NotFound`] and it's up to the loader
    /// whether to substitute it or to propagate. Returning `Ok(None)` is treated as a failure.
    fn load(&mut self, manager: &AssetManager, info: &AssetInfo) -> anyhow::Result<Option<AssetRef>>;
}

pub trait AssetProcessor: Send + Sync {
    /// Runs once per decode, before the result is cached. May return a different object.
    fn post_process(&self, key: &AssetKey, asset: AssetRef) -> anyhow::Result<AssetRef>;

    /// Must return a new reference, handing back `asset` itself is a configuration error.
    fn create_clone(&self, asset: &AssetRef) -> anyhow::Result<AssetRef>;
}

type BuildLoader = dyn Fn() -> anyhow::Result<Box<dyn AssetLoader>> + Send + Sync;
type BuildLocator = dyn Fn(&str) -> anyhow::Result<Box<dyn AssetLocator>> + Send + Sync;

/// Named constructor for loader instances. The name is the identity used in logs and configs.
#[derive(Clone)]
pub struct LoaderFactory {
    name: Arc<str>,
    build: Arc<BuildLoader>,
}

impl LoaderFactory {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn AssetLoader>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self) -> anyhow::Result<Box<dyn AssetLoader>> {
        (self.build)()
    }
}

impl fmt::Debug for LoaderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LoaderFactory({})", self.name)
    }
}

/// Named constructor for locator instances, receiving the root path of the registration.
#[derive(Clone)]
pub struct LocatorFactory {
    name: Arc<str>,
    build: Arc<BuildLocator>,
}

impl LocatorFactory {
    pub fn new<F>(name: &str, build: F) -> Self
    where
        F: Fn(&str) -> anyhow::Result<Box<dyn AssetLocator>> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            build: Arc::new(build),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn build(&self, root: &str) -> anyhow::Result<Box<dyn AssetLocator>> {
        (self.build)(root)
    }
}

impl fmt::Debug for LocatorFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocatorFactory({})", self.name)
    }
}

/// Clones through [`crate::asset::Asset::clone_asset`] and leaves decoded assets untouched.
pub struct CloneableProcessor;

impl AssetProcessor for CloneableProcessor {
    fn post_process(&self, _key: &AssetKey, asset: AssetRef) -> anyhow::Result<AssetRef> {
        Ok(asset)
    }

    fn create_clone(&self, asset: &AssetRef) -> anyhow::Result<AssetRef> {
        asset
            .clone_asset()
            .ok_or_else(|| anyhow::anyhow!("{:?} cannot be cloned", asset))
    }
}
