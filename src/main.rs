use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use itertools::Itertools;
use lodestone::asset::{AssetKey, AssetManager, AssetResult, AsyncLoadExecutor, LoadedAsset};
use lodestone::config::{AssetConfig, PluginCatalog};
use lodestone::io::file::FileLocator;
use lodestone::loader::TextLoader;

use crate::settings::CliArgs;

mod settings;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args = CliArgs::parse();
    log::trace!("Starting with args: {:?}", args);

    let manager = Arc::new(AssetManager::new());
    let catalog = PluginCatalog::with_builtins();

    match &args.config {
        Some(config) => {
            let report = AssetConfig::new(&catalog)
                .load_file(&manager, config)
                .with_context(|| format!("Failed to apply config {}", config))?;
            log::debug!("Applied {}: {:?}", config, report);
        }
        None => manager.register_loader(&["txt"], TextLoader::factory()),
    }

    for root in &args.roots {
        manager.register_locator(root, FileLocator::factory());
    }

    let keys = args.assets.iter().map(|name| AssetKey::new(name)).collect_vec();
    let results: Vec<(AssetKey, AssetResult<LoadedAsset>)> = if args.use_async {
        let executor = match args.workers {
            Some(workers) => AsyncLoadExecutor::with_workers(manager.clone(), workers)?,
            None => AsyncLoadExecutor::new(manager.clone())?,
        };
        let futures = keys.into_iter().map(|key| executor.submit(key)).collect_vec();
        futures
            .into_iter()
            .map(|future| (future.key().clone(), future.wait()))
            .collect()
    } else {
        keys.into_iter()
            .map(|key| {
                let result = manager.resolve(&key);
                (key, result)
            })
            .collect()
    };

    let mut failures = 0;
    for (key, result) in results {
        match result {
            Ok(asset) => println!("{}: {}", key, describe(&asset)),
            Err(err) => {
                failures += 1;
                log::error!("{:#}", anyhow::Error::from(err));
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} assets could not be resolved", failures, args.assets.len());
    }

    Ok(())
}

fn describe(asset: &LoadedAsset) -> String {
    if let Some(text) = asset.downcast_ref::<String>() {
        let first_line = text.lines().next().unwrap_or_default();
        return format!("text, {} bytes, \"{}\"", text.len(), first_line);
    }

    if let Some(bytes) = asset.downcast_ref::<Vec<u8>>() {
        return format!("binary, {} bytes", bytes.len());
    }

    format!("{:?}", asset.value())
}
