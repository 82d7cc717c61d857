//! Node links inside a model
//!
//! Subtrees are walked, cloned and despawned through these. Child order is
//! the order nodes were loaded in, so a clone lists its children in the same
//! order as its template.

use hecs::Entity;
use smallvec::SmallVec;

/// Link from a node to the node it hangs under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parent(pub Entity);

impl Parent {
    #[must_use]
    pub const fn new(entity: Entity) -> Self {
        Self(entity)
    }

    #[must_use]
    pub const fn entity(&self) -> Entity {
        self.0
    }
}

/// Ordered child list of a node. Most model nodes have only a few children.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Children(SmallVec<[Entity; 4]>);

impl Children {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a child, keeping load order. Ignores a child already listed.
    pub fn add(&mut self, child: Entity) {
        if !self.0.contains(&child) {
            self.0.push(child);
        }
    }

    /// Unlink a child while keeping the order of the rest
    pub fn remove(&mut self, child: Entity) -> bool {
        let before = self.0.len();
        self.0.retain(|e| *e != child);
        self.0.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Children in load order
    #[must_use]
    pub fn as_slice(&self) -> &[Entity] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_order_kept_across_removal() {
        let mut world = hecs::World::new();
        let [trunk, branch, leaf] = [world.spawn(()), world.spawn(()), world.spawn(())];

        let mut children = Children::new();
        children.add(trunk);
        children.add(branch);
        children.add(leaf);
        children.add(trunk);
        assert_eq!(children.as_slice(), &[trunk, branch, leaf]);

        assert!(children.remove(branch));
        assert!(!children.remove(branch));
        assert_eq!(children.as_slice(), &[trunk, leaf]);
    }

    #[test]
    fn test_parent_link() {
        let mut world = hecs::World::new();
        let root = world.spawn(());
        let node = world.spawn((Parent::new(root),));
        assert_eq!(world.get::<&Parent>(node).unwrap().entity(), root);
    }
}
