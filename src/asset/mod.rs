//! The asset core: keys, the plugin registry, caches and the [`AssetManager`] that ties them
//! together.

pub mod async_loader;
pub mod cache;
pub mod dependency;
pub mod error;
pub mod events;
pub mod handle;
pub mod info;
pub mod key;
pub mod manager;
pub mod plugin;
pub mod registry;
pub mod thread_owned;

pub use async_loader::{AssetFuture, AsyncLoadExecutor};
pub use cache::{AssetCache, CacheManager, CloneLease};
pub use error::{AssetError, AssetResult};
pub use events::AssetEventListener;
pub use handle::{AsAny, Asset, AssetRef, LoadedAsset, TypedAsset};
pub use info::AssetInfo;
pub use key::{AssetKey, CachePolicy, KeyFlavor, ProcessorKind};
pub use manager::AssetManager;
pub use plugin::{AssetLoader, AssetLocator, AssetProcessor, CloneableProcessor, LoaderFactory, LocatorFactory};
