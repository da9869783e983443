use thiserror::Error;

use crate::asset::key::AssetKey;

pub type AssetResult<T> = Result<T, AssetError>;

#[derive(Error, Debug)]
pub enum AssetError {
    /// No locator could produce a resource for the key.
    #[error("Asset {key} could not be located")]
    NotFound { key: AssetKey },

    /// The loader (or processor) failed, or produced no object.
    #[error("An error occurred while loading asset {key}")]
    Load {
        key: AssetKey,
        #[source]
        source: anyhow::Error,
    },

    #[error("No loader registered for extension \"{extension}\"")]
    NoLoader { extension: String },

    /// Setup defects: missing factories, broken clone contracts, unknown cache policies.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Key {key} declares no cache")]
    CacheMisuse { key: AssetKey },

    #[error("Loading of {key} has been cancelled before it started")]
    Cancelled { key: AssetKey },

    #[error("The worker loading {key} died: {reason}")]
    Worker { key: AssetKey, reason: String },
}

impl AssetError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }

    /// Load failures in the broader sense, including a missing loader.
    pub fn is_load_error(&self) -> bool {
        matches!(self, AssetError::Load { .. } | AssetError::NoLoader { .. })
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, AssetError::Configuration(_))
    }
}
