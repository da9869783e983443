use std::fs;

use lodestone::asset::AssetManager;
use lodestone::config::{AssetConfig, ConfigReport, PluginCatalog};
use lodestone_config::ConfigError;

#[test_log::test]
fn config_files_set_up_a_working_manager() {
    let dir = tempfile::tempdir().unwrap();
    let assets = dir.path().join("assets");
    fs::create_dir_all(assets.join("Notes")).unwrap();
    fs::write(assets.join("Notes/hello.txt"), "hello from disk").unwrap();
    fs::create_dir(dir.path().join("extra")).unwrap();

    fs::write(
        dir.path().join("main.cfg"),
        "# base setup\nLOADER TextLoader : txt\nINCLUDE extra/locators.cfg\nINCLUDE missing.cfg\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("extra/locators.cfg"),
        format!(
            "LOCATOR {} FileLocator\nLOCATOR /nowhere com.example.ZipLocator\nINCLUDE ../main.cfg\n",
            assets.display()
        ),
    )
    .unwrap();

    let manager = AssetManager::new();
    let catalog = PluginCatalog::with_builtins();
    let report = AssetConfig::new(&catalog)
        .load_file(&manager, dir.path().join("main.cfg"))
        .unwrap();

    assert_eq!(
        report,
        ConfigReport {
            loaders: 1,
            locators: 1,
            skipped: 2
        }
    );
    let hello = manager.resolve_by_name("Notes/hello.txt").unwrap();
    assert_eq!(hello.downcast_ref::<String>().unwrap(), "hello from disk");
    assert!(manager.resolve_by_name("../main.cfg").unwrap_err().is_not_found());
}

#[test]
fn parse_errors_stop_the_config() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("bad.cfg"), "LOADER TextLoader : txt\nBOGUS xyz\n").unwrap();

    let manager = AssetManager::new();
    let catalog = PluginCatalog::with_builtins();
    let err = AssetConfig::new(&catalog)
        .load_file(&manager, dir.path().join("bad.cfg"))
        .unwrap_err();

    assert!(matches!(err, ConfigError::UnknownCommand { line: 2, .. }));
    assert!(manager.registry().loader("txt").is_none());
}

#[test]
fn missing_root_config_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let manager = AssetManager::new();
    let catalog = PluginCatalog::new();

    let err = AssetConfig::new(&catalog)
        .load_file(&manager, dir.path().join("absent.cfg"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::IOError(_)));
}
