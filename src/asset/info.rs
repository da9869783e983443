use std::fmt;
use std::io::Read;

use crate::asset::key::AssetKey;
use crate::io::common::source::AssetSource;

/// The resource handle a locator hands to a loader.
pub struct AssetInfo {
    key: AssetKey,
    source: Box<dyn AssetSource>,
}

impl AssetInfo {
    pub fn new(key: AssetKey, source: impl AssetSource + 'static) -> Self {
        Self {
            key,
            source: Box::new(source),
        }
    }

    pub fn key(&self) -> &AssetKey {
        &self.key
    }

    pub fn open_stream(&self) -> std::io::Result<Box<dyn Read + '_>> {
        self.source.open()
    }

    pub fn read_owned(&self) -> std::io::Result<Vec<u8>> {
        self.source.read_owned()
    }

    pub fn origin(&self) -> String {
        self.source.describe()
    }
}

impl fmt::Debug for AssetInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetInfo")
            .field("key", &self.key)
            .field("origin", &self.source.describe())
            .finish()
    }
}
