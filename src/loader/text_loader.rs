use std::sync::Arc;

use anyhow::Context;

use crate::asset::handle::AssetRef;
use crate::asset::info::AssetInfo;
use crate::asset::manager::AssetManager;
use crate::asset::plugin::{AssetLoader, LoaderFactory};

/// Decodes UTF-8 text into a [`String`] asset. A leading byte order mark is dropped.
#[derive(Default)]
pub struct TextLoader;

impl TextLoader {
    pub const NAME: &'static str = "TextLoader";

    pub fn factory() -> LoaderFactory {
        LoaderFactory::new(Self::NAME, || Ok(Box::new(TextLoader)))
    }
}

impl AssetLoader for TextLoader {
    fn load(&mut self, _manager: &AssetManager, info: &AssetInfo) -> anyhow::Result<Option<AssetRef>> {
        let bytes = info
            .read_owned()
            .with_context(|| format!("Failed to read {}", info.origin()))?;
        let text = String::from_utf8(bytes).with_context(|| format!("{} is not valid UTF-8", info.key()))?;
        let text = text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text);

        Ok(Some(Arc::new(text)))
    }
}
