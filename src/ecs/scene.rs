//! Scene wrapper around hecs
//!
//! Holds every node the stage creates: live instances, cached templates,
//! and whatever the host spawns itself (cameras, lights). Live instance
//! roots are indexed by name; templates never are.

use hecs::{Entity, EntityBuilder};
use rustc_hash::FxHashMap;

use super::components::{GroupKey, Live, Name, NodeFlags, Part, Tint, Transform};
use super::hierarchy::{Children, Parent};
use crate::assets::Container;

/// Scene containing all nodes and the live-name index
pub struct Scene {
    /// The underlying hecs world
    world: hecs::World,
    /// Live instance roots by name
    names: FxHashMap<String, Entity>,
    active_camera: Option<Entity>,
    main_light: Option<Entity>,
}

impl Scene {
    /// Create a new empty scene
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            names: FxHashMap::default(),
            active_camera: None,
            main_light: None,
        }
    }

    /// Get the underlying world
    pub fn world(&self) -> &hecs::World {
        &self.world
    }

    /// Get a reference to a component
    pub fn get<T: hecs::Component>(
        &self,
        entity: Entity,
    ) -> Result<hecs::Ref<'_, T>, hecs::ComponentError> {
        self.world.get::<&T>(entity)
    }

    /// Add or replace components on an entity
    pub fn insert(
        &mut self,
        entity: Entity,
        components: impl hecs::DynamicBundle,
    ) -> Result<(), hecs::NoSuchEntity> {
        self.world.insert(entity, components)
    }

    /// Check if an entity exists
    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    /// Get the number of entities, templates included
    pub fn len(&self) -> u32 {
        self.world.len()
    }

    /// Check if the scene is empty
    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    // ------------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------------

    /// Spawn a standalone node, e.g. a camera or a light
    pub fn spawn_node(&mut self, name: impl Into<String>, transform: Transform) -> Entity {
        self.world.spawn((Name::new(name), transform, NodeFlags::ACTIVE))
    }

    /// Place a loaded container in the scene and return its root.
    ///
    /// A container with exactly one root node uses that node as the root;
    /// otherwise a new root named after the asset parents all of them.
    pub fn spawn_container(&mut self, container: &Container) -> Entity {
        let single_root = {
            let mut roots = container.roots();
            match (roots.next(), roots.next()) {
                (Some(root), None) => Some(root),
                _ => None,
            }
        };
        let synthetic_root = match single_root {
            Some(_) => None,
            None => Some(self.spawn_node(container.asset().as_str(), Transform::default())),
        };

        let mut spawned = Vec::with_capacity(container.nodes().len());
        for node in container.nodes() {
            let entity = self.world.spawn((
                Name::new(node.name.as_str()),
                node.transform,
                Part {
                    mesh: node.mesh.clone(),
                },
                NodeFlags::ACTIVE,
            ));
            spawned.push(entity);

            let parent = node
                .parent
                .and_then(|index| spawned.get(index).copied())
                .or(synthetic_root);
            if let Some(parent) = parent {
                self.attach(parent, entity);
            }
        }

        synthetic_root
            .or_else(|| single_root.and_then(|index| spawned.get(index).copied()))
            .unwrap_or_else(|| self.spawn_node(container.asset().as_str(), Transform::default()))
    }

    /// Deep-copy a subtree and return the new root.
    ///
    /// Copies names, transforms, parts, flags and tints. Instance bookkeeping
    /// (group, source asset, template marker, readiness) is not copied, and the
    /// new root has no parent.
    ///
    /// # Errors
    ///
    /// Returns an error if `source` does not exist.
    pub fn clone_subtree(&mut self, source: Entity) -> Result<Entity, hecs::NoSuchEntity> {
        if !self.world.contains(source) {
            return Err(hecs::NoSuchEntity);
        }
        Ok(self.clone_node(source, None))
    }

    fn clone_node(&mut self, source: Entity, parent: Option<Entity>) -> Entity {
        let mut builder = EntityBuilder::new();
        let transform = self
            .world
            .get::<&Transform>(source)
            .map_or_else(|_| Transform::default(), |t| *t);
        let flags = self
            .world
            .get::<&NodeFlags>(source)
            .map_or(NodeFlags::ACTIVE, |f| *f);
        builder.add(transform).add(flags);
        if let Ok(name) = self.world.get::<&Name>(source) {
            builder.add((*name).clone());
        }
        if let Ok(part) = self.world.get::<&Part>(source) {
            builder.add((*part).clone());
        }
        if let Ok(tint) = self.world.get::<&Tint>(source) {
            builder.add(*tint);
        }

        let entity = self.world.spawn(builder.build());
        if let Some(parent) = parent {
            self.attach(parent, entity);
        }

        for child in self.children_of(source) {
            self.clone_node(child, Some(entity));
        }
        entity
    }

    /// Make `child` a child of `parent`
    pub fn attach(&mut self, parent: Entity, child: Entity) {
        if self.world.insert_one(child, Parent::new(parent)).is_err() {
            return;
        }
        let has_children = self.world.get::<&Children>(parent).is_ok();
        if has_children {
            if let Ok(mut children) = self.world.get::<&mut Children>(parent) {
                children.add(child);
            }
        } else {
            let mut children = Children::new();
            children.add(child);
            let _ = self.world.insert_one(parent, children);
        }
    }

    /// Direct children of `entity`
    pub fn children_of(&self, entity: Entity) -> Vec<Entity> {
        self.world
            .get::<&Children>(entity)
            .map(|children| children.iter().copied().collect())
            .unwrap_or_default()
    }

    /// `root` and all of its descendants, depth first
    pub fn descendants(&self, root: Entity) -> Vec<Entity> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(entity) = stack.pop() {
            if !self.world.contains(entity) {
                continue;
            }
            out.push(entity);
            let mut children = self.children_of(entity);
            children.reverse();
            stack.extend(children);
        }
        out
    }

    /// Despawn `root` and all of its descendants.
    ///
    /// Also drops the root from the name index and clears the active camera or
    /// main light if they pointed into the subtree. Returns false if `root`
    /// does not exist.
    pub fn despawn_subtree(&mut self, root: Entity) -> bool {
        if !self.world.contains(root) {
            return false;
        }

        if let Ok(parent) = self.world.get::<&Parent>(root).map(|p| p.entity())
            && let Ok(mut siblings) = self.world.get::<&mut Children>(parent)
        {
            siblings.remove(root);
        }

        for entity in self.descendants(root) {
            let _ = self.world.despawn(entity);
            if self.active_camera == Some(entity) {
                self.active_camera = None;
            }
            if self.main_light == Some(entity) {
                self.main_light = None;
            }
        }
        self.names.retain(|_, entity| *entity != root);
        true
    }

    // ------------------------------------------------------------------------
    // Node state
    // ------------------------------------------------------------------------

    fn update_flags(&mut self, root: Entity, update: impl Fn(&mut NodeFlags)) {
        for entity in self.descendants(root) {
            if let Ok(mut flags) = self.world.get::<&mut NodeFlags>(entity) {
                update(&mut flags);
                continue;
            }
            let mut flags = NodeFlags::ACTIVE;
            update(&mut flags);
            let _ = self.world.insert_one(entity, flags);
        }
    }

    /// Enable or disable a whole subtree
    pub fn set_enabled(&mut self, root: Entity, enabled: bool) {
        self.update_flags(root, |flags| flags.enabled = enabled);
    }

    /// Make a whole subtree pickable or not
    pub fn set_pickable(&mut self, root: Entity, pickable: bool) {
        self.update_flags(root, |flags| flags.pickable = pickable);
    }

    /// Check if a node is enabled
    pub fn is_enabled(&self, entity: Entity) -> bool {
        self.world
            .get::<&NodeFlags>(entity)
            .is_ok_and(|flags| flags.enabled)
    }

    /// Mark an instance root as ready
    pub fn mark_live(&mut self, entity: Entity) {
        let _ = self.world.insert_one(entity, Live);
    }

    /// Check if an instance root has been signalled ready
    pub fn is_live(&self, entity: Entity) -> bool {
        self.world.get::<&Live>(entity).is_ok()
    }

    // ------------------------------------------------------------------------
    // Names and groups
    // ------------------------------------------------------------------------

    /// Index a live instance root under `name`
    pub fn register_name(&mut self, name: impl Into<String>, entity: Entity) {
        self.names.insert(name.into(), entity);
    }

    /// Look up a live instance root by name
    pub fn lookup(&self, name: &str) -> Option<Entity> {
        self.names
            .get(name)
            .copied()
            .filter(|entity| self.world.contains(*entity))
    }

    /// Check if a live instance already uses `name`
    pub fn contains_name(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Iterate over indexed names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.keys().map(String::as_str)
    }

    /// Named instance roots tagged with `key`, sorted by name
    pub fn group(&self, key: &str) -> Vec<(String, Entity)> {
        let mut members: Vec<(String, Entity)> = self
            .names
            .iter()
            .filter(|(_, entity)| {
                self.world
                    .get::<&GroupKey>(**entity)
                    .is_ok_and(|group| group.0 == key)
            })
            .map(|(name, entity)| (name.clone(), *entity))
            .collect();
        members.sort_by(|a, b| a.0.cmp(&b.0));
        members
    }

    // ------------------------------------------------------------------------
    // Camera and light
    // ------------------------------------------------------------------------

    /// Set the active camera node
    pub fn set_active_camera(&mut self, camera: Option<Entity>) {
        self.active_camera = camera;
    }

    /// Get the active camera, if it still exists
    pub fn active_camera(&self) -> Option<Entity> {
        self.active_camera.filter(|e| self.world.contains(*e))
    }

    /// Set the main light node
    pub fn set_main_light(&mut self, light: Option<Entity>) {
        self.main_light = light;
    }

    /// Get the main light, if it still exists
    pub fn main_light(&self) -> Option<Entity> {
        self.main_light.filter(|e| self.world.contains(*e))
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::NodeData;
    use glam::Vec3;

    fn cart() -> Container {
        let mut container = Container::new("cart.glb");
        let body = container.push(NodeData::mesh("body", "body_mesh"));
        container.push(NodeData {
            parent: Some(body),
            transform: Transform::from_position(Vec3::X),
            ..NodeData::mesh("wheel", "wheel_mesh")
        });
        container
    }

    #[test]
    fn test_spawn_single_root() {
        let mut scene = Scene::new();
        let root = scene.spawn_container(&cart());

        assert_eq!(scene.get::<Name>(root).unwrap().0, "body");
        assert_eq!(scene.descendants(root).len(), 2);
    }

    #[test]
    fn test_spawn_multiple_roots_gets_synthetic_root() {
        let mut container = Container::new("pair.glb");
        container.push(NodeData::mesh("left", "m"));
        container.push(NodeData::mesh("right", "m"));

        let mut scene = Scene::new();
        let root = scene.spawn_container(&container);
        assert_eq!(scene.get::<Name>(root).unwrap().0, "pair.glb");
        assert_eq!(scene.children_of(root).len(), 2);
    }

    #[test]
    fn test_clone_subtree_is_independent() {
        let mut scene = Scene::new();
        let original = scene.spawn_container(&cart());
        let copy = scene.clone_subtree(original).unwrap();

        assert_ne!(original, copy);
        assert_eq!(scene.descendants(copy).len(), 2);
        assert!(scene.get::<Parent>(copy).is_err());

        scene.set_enabled(copy, false);
        assert!(scene.is_enabled(original));
        assert!(!scene.is_enabled(copy));

        let wheel = scene.children_of(copy)[0];
        assert_eq!(scene.get::<Transform>(wheel).unwrap().position, Vec3::X);
    }

    #[test]
    fn test_despawn_subtree_updates_index() {
        let mut scene = Scene::new();
        let root = scene.spawn_container(&cart());
        scene.register_name("c1", root);
        assert!(scene.contains_name("c1"));

        assert!(scene.despawn_subtree(root));
        assert!(!scene.contains_name("c1"));
        assert!(scene.is_empty());
        assert!(!scene.despawn_subtree(root));
    }

    #[test]
    fn test_group_lookup() {
        let mut scene = Scene::new();
        for (name, group) in [("b", "fence"), ("a", "fence"), ("c", "house")] {
            let entity = scene.spawn_node(name, Transform::default());
            let _ = scene.world.insert_one(entity, GroupKey(group.to_string()));
            scene.register_name(name, entity);
        }

        let names: Vec<String> = scene.group("fence").into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_camera_cleared_on_despawn() {
        let mut scene = Scene::new();
        let camera = scene.spawn_node("camera", Transform::default());
        scene.set_active_camera(Some(camera));
        assert_eq!(scene.active_camera(), Some(camera));

        scene.despawn_subtree(camera);
        assert_eq!(scene.active_camera(), None);
    }
}
