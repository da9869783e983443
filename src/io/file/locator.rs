use std::path::{Component, Path, PathBuf};

use log::{trace, warn};

use crate::asset::info::AssetInfo;
use crate::asset::key::AssetKey;
use crate::asset::manager::AssetManager;
use crate::asset::plugin::{AssetLocator, LocatorFactory};
use crate::io::common::source::FileSource;

/// Finds assets below a directory on the local file system. Key names are interpreted relative
/// to that directory, names leaving it are never resolved.
pub struct FileLocator {
    root: PathBuf,
}

impl FileLocator {
    pub const NAME: &'static str = "FileLocator";

    pub fn new(root: impl AsRef<Path>) -> anyhow::Result<Self> {
        let root = root.as_ref();
        if !root.is_dir() {
            anyhow::bail!("{} is not a directory", root.display());
        }

        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    pub fn factory() -> LocatorFactory {
        LocatorFactory::new(Self::NAME, |root| Ok(Box::new(FileLocator::new(root)?)))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve_path(&self, name: &str) -> Option<PathBuf> {
        let relative = Path::new(name);
        let escapes = relative
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir));
        if escapes {
            warn!("{} refuses to resolve {} outside of {}", Self::NAME, name, self.root.display());
            return None;
        }

        Some(self.root.join(relative))
    }
}

impl AssetLocator for FileLocator {
    fn locate(&mut self, _manager: &AssetManager, key: &AssetKey) -> Option<AssetInfo> {
        let path = self.resolve_path(key.name())?;
        if !path.is_file() {
            trace!("{} not found at {}", key, path.display());
            return None;
        }

        Some(AssetInfo::new(key.clone(), FileSource::new(path)))
    }
}
