//! Applies configuration files to an [`AssetManager`].
//!
//! Plugin names in a config file are looked up in a [`PluginCatalog`]. Names the catalog doesn't
//! know are skipped with a warning, so one config can serve builds with different plugin sets.

use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use log::{debug, error, warn};
use lodestone_config::{ConfigCommand, ConfigError, ConfigFile};

use crate::asset::manager::AssetManager;
use crate::asset::plugin::{LoaderFactory, LocatorFactory};
use crate::io::file::FileLocator;
use crate::loader::TextLoader;

#[derive(Default)]
pub struct PluginCatalog {
    loaders: HashMap<String, LoaderFactory>,
    locators: HashMap<String, LocatorFactory>,
}

impl PluginCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// [`TextLoader`] and [`FileLocator`] under their names.
    pub fn with_builtins() -> Self {
        let mut catalog = Self::new();
        catalog.add_loader(TextLoader::factory());
        catalog.add_locator(FileLocator::factory());
        catalog
    }

    /// Registers the factory under its own name.
    pub fn add_loader(&mut self, factory: LoaderFactory) -> &mut Self {
        self.loaders.insert(factory.name().to_string(), factory);
        self
    }

    pub fn add_locator(&mut self, factory: LocatorFactory) -> &mut Self {
        self.locators.insert(factory.name().to_string(), factory);
        self
    }

    pub fn loader(&self, name: &str) -> Option<&LoaderFactory> {
        self.loaders.get(name)
    }

    pub fn locator(&self, name: &str) -> Option<&LocatorFactory> {
        self.locators.get(name)
    }
}

/// What applying a config did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ConfigReport {
    pub loaders: usize,
    pub locators: usize,
    pub skipped: usize,
}

pub struct AssetConfig<'a> {
    catalog: &'a PluginCatalog,
}

impl<'a> AssetConfig<'a> {
    pub fn new(catalog: &'a PluginCatalog) -> Self {
        Self { catalog }
    }

    /// Applies the file at `path`. Includes are resolved relative to the including file.
    pub fn load_file(&self, manager: &AssetManager, path: impl AsRef<Path>) -> Result<ConfigReport, ConfigError> {
        let mut report = ConfigReport::default();
        let mut visiting = HashSet::new();
        self.apply_file(manager, path.as_ref(), &mut visiting, &mut report)?;
        Ok(report)
    }

    /// Applies config text, includes are resolved relative to `base_dir`.
    pub fn load_text(&self, manager: &AssetManager, text: &str, base_dir: &Path) -> Result<ConfigReport, ConfigError> {
        let mut report = ConfigReport::default();
        let mut visiting = HashSet::new();
        let config = ConfigFile::parse_str(text)?;
        self.apply(manager, config, base_dir, &mut visiting, &mut report)?;
        Ok(report)
    }

    fn apply_file(
        &self,
        manager: &AssetManager,
        path: &Path,
        visiting: &mut HashSet<PathBuf>,
        report: &mut ConfigReport,
    ) -> Result<(), ConfigError> {
        let identity = path.canonicalize()?;
        if !visiting.insert(identity.clone()) {
            warn!("{} includes itself, skipping", path.display());
            return Ok(());
        }

        debug!("Applying asset config {}", path.display());
        let config = ConfigFile::parse_file(BufReader::new(File::open(path)?))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        self.apply(manager, config, base_dir, visiting, report)?;

        visiting.remove(&identity);
        Ok(())
    }

    fn apply(
        &self,
        manager: &AssetManager,
        config: ConfigFile,
        base_dir: &Path,
        visiting: &mut HashSet<PathBuf>,
        report: &mut ConfigReport,
    ) -> Result<(), ConfigError> {
        for command in config.commands {
            match command {
                ConfigCommand::Loader { name, extensions } => match self.catalog.loader(&name) {
                    Some(factory) => {
                        let extensions: Vec<&str> = extensions.iter().map(String::as_str).collect();
                        manager.register_loader(&extensions, factory.clone());
                        report.loaders += 1;
                    }
                    None => {
                        warn!("Unknown loader {}, skipping", name);
                        report.skipped += 1;
                    }
                },
                ConfigCommand::Locator { root, name } => match self.catalog.locator(&name) {
                    Some(factory) => {
                        manager.register_locator(&root, factory.clone());
                        report.locators += 1;
                    }
                    None => {
                        warn!("Unknown locator {}, skipping", name);
                        report.skipped += 1;
                    }
                },
                ConfigCommand::Include { path } => {
                    let include = base_dir.join(&path);
                    if !include.is_file() {
                        error!("Cannot find config file to include: {}", include.display());
                        report.skipped += 1;
                        continue;
                    }

                    self.apply_file(manager, &include, visiting, report)?;
                }
            }
        }

        Ok(())
    }
}
