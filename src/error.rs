//! Error types for asset_stage

use thiserror::Error;

use crate::assets::AssetName;

/// Errors answered synchronously by `AssetStage::create_instance`.
///
/// The caller gets one of these instead of a handle, so a batch of requests
/// keeps going when a single entry is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("request `{id}` has no asset name")]
    MissingAsset { id: String },

    #[error("request for `{asset}` has no id")]
    MissingId { asset: AssetName },

    #[error("request `{id}` has a non-finite transform")]
    InvalidTransform { id: String },

    /// The disambiguated name collided as well. Not expected in normal operation.
    #[error("name `{requested}` still collides after renaming to `{candidate}`")]
    Naming { requested: String, candidate: String },
}

impl RequestError {
    /// True for malformed requests, false for naming logic errors
    #[must_use]
    pub fn is_validation(&self) -> bool {
        !matches!(self, Self::Naming { .. })
    }
}

/// Errors produced while fetching or parsing an asset.
///
/// Cloned to every request that joined the failed fetch, so causes are kept as text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("asset `{0}` not found")]
    NotFound(AssetName),

    #[error("failed to read `{asset}`: {message}")]
    Io { asset: AssetName, message: String },

    #[error("failed to parse `{asset}`: {message}")]
    Parse { asset: AssetName, message: String },

    #[error("fetch of `{0}` was aborted")]
    Aborted(AssetName),
}

impl FetchError {
    /// The asset this error belongs to
    #[must_use]
    pub fn asset(&self) -> &AssetName {
        match self {
            Self::NotFound(asset) | Self::Aborted(asset) => asset,
            Self::Io { asset, .. } | Self::Parse { asset, .. } => asset,
        }
    }
}

/// Template cache write errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("a template for `{0}` is already cached")]
    AlreadyCached(AssetName),
}

/// Errors that can occur while loading a `StageConfig`
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(#[from] ron::error::SpannedError),

    #[error("RON serialization error: {0}")]
    RonSerialize(#[from] ron::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_classification() {
        let missing = RequestError::MissingId {
            asset: AssetName::new("tree.glb"),
        };
        assert!(missing.is_validation());

        let naming = RequestError::Naming {
            requested: "t1".to_string(),
            candidate: "t1_4".to_string(),
        };
        assert!(!naming.is_validation());
    }

    #[test]
    fn test_fetch_error_asset() {
        let err = FetchError::Parse {
            asset: AssetName::new("rock.glb"),
            message: "bad header".to_string(),
        };
        assert_eq!(err.asset().as_str(), "rock.glb");
        assert!(err.to_string().contains("bad header"));
    }
}
