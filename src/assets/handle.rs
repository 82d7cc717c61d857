//! Asset names and instance handles
//!
//! `AssetName` keys everything that is fetched once and cached. `Handle` is
//! what callers hold on to for an instance, or for one of the symbolic
//! entities the scene always knows about.

use std::fmt;

/// Identifies a loadable source asset (for example a model file).
///
/// Stable across requests and used as the key of the load registry and the
/// template cache.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetName(String);

impl AssetName {
    /// Create an asset name
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the name as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if the name is empty or whitespace only
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for AssetName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for AssetName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for AssetName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// Caller-visible identifier for something that can become ready.
///
/// Symbolic handles never go through the load registry; they are resolved
/// against the scene directly or through a readiness entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Handle {
    /// A named instance created through the stage
    Named(String),
    /// Whatever camera is currently active
    ActiveCamera,
    /// The scene's main light
    MainLight,
    /// The whole scene; always ready
    Everywhere,
}

impl Handle {
    pub const ACTIVE_CAMERA: &'static str = "active-camera";
    pub const MAIN_LIGHT: &'static str = "main-light";
    pub const EVERYWHERE: &'static str = "everywhere";

    /// Create a named handle without interpreting symbolic names
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Get the instance name, if this is a named handle
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Named(name) => Some(name),
            _ => None,
        }
    }

    /// Check if this handle is one of the symbolic handles
    #[must_use]
    pub fn is_symbolic(&self) -> bool {
        !matches!(self, Self::Named(_))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::ActiveCamera => f.write_str(Self::ACTIVE_CAMERA),
            Self::MainLight => f.write_str(Self::MAIN_LIGHT),
            Self::Everywhere => f.write_str(Self::EVERYWHERE),
        }
    }
}

impl From<&str> for Handle {
    fn from(name: &str) -> Self {
        match name {
            Self::ACTIVE_CAMERA => Self::ActiveCamera,
            Self::MAIN_LIGHT => Self::MainLight,
            Self::EVERYWHERE => Self::Everywhere,
            other => Self::Named(other.to_string()),
        }
    }
}

impl From<String> for Handle {
    fn from(name: String) -> Self {
        match name.as_str() {
            Self::ACTIVE_CAMERA | Self::MAIN_LIGHT | Self::EVERYWHERE => Self::from(name.as_str()),
            _ => Self::Named(name),
        }
    }
}

impl From<&Handle> for Handle {
    fn from(handle: &Handle) -> Self {
        handle.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbolic_parsing() {
        assert_eq!(Handle::from("active-camera"), Handle::ActiveCamera);
        assert_eq!(Handle::from("main-light"), Handle::MainLight);
        assert_eq!(Handle::from("everywhere".to_string()), Handle::Everywhere);
        assert_eq!(Handle::from("tree"), Handle::named("tree"));
    }

    #[test]
    fn test_display_matches_parse() {
        for handle in [
            Handle::ActiveCamera,
            Handle::MainLight,
            Handle::Everywhere,
            Handle::named("rock_3"),
        ] {
            assert_eq!(Handle::from(handle.to_string()), handle);
        }
    }

    #[test]
    fn test_blank_asset_name() {
        assert!(AssetName::new("  ").is_blank());
        assert!(!AssetName::from("tree.glb").is_blank());
    }
}
