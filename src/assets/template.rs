//! Template cache
//!
//! One inert prototype per asset, written once by whoever settles the first
//! fetch and cloned for every later instance. Templates live as long as the
//! stage; there is no eviction.

use hecs::Entity;
use rustc_hash::FxHashMap;

use crate::assets::AssetName;
use crate::error::TemplateError;

/// Maps asset names to their template root in the scene
#[derive(Debug, Default)]
pub struct TemplateCache {
    templates: FxHashMap<AssetName, Entity>,
}

impl TemplateCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the template root for `asset`
    #[must_use]
    pub fn get(&self, asset: &AssetName) -> Option<Entity> {
        self.templates.get(asset).copied()
    }

    /// Check if `asset` has a template
    #[must_use]
    pub fn contains(&self, asset: &AssetName) -> bool {
        self.templates.contains_key(asset)
    }

    /// Store the template for `asset`. The first writer wins.
    ///
    /// # Errors
    ///
    /// Returns `TemplateError::AlreadyCached` if a template is already
    /// stored; the existing one is left untouched.
    pub fn insert(&mut self, asset: AssetName, template: Entity) -> Result<(), TemplateError> {
        if self.templates.contains_key(&asset) {
            return Err(TemplateError::AlreadyCached(asset));
        }
        self.templates.insert(asset, template);
        Ok(())
    }

    /// Number of cached templates
    #[must_use]
    pub fn len(&self) -> usize {
        self.templates.len()
    }

    /// Check if nothing is cached
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_writer_wins() {
        let mut world = hecs::World::new();
        let first = world.spawn(());
        let second = world.spawn(());

        let mut cache = TemplateCache::new();
        let tree = AssetName::from("tree.glb");

        assert!(cache.insert(tree.clone(), first).is_ok());
        assert_eq!(
            cache.insert(tree.clone(), second),
            Err(TemplateError::AlreadyCached(tree.clone()))
        );
        assert_eq!(cache.get(&tree), Some(first));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_template() {
        let cache = TemplateCache::new();
        assert!(cache.is_empty());
        assert_eq!(cache.get(&AssetName::from("rock.glb")), None);
    }
}
