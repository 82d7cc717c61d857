//! Instantiation routine
//!
//! Turns a node subtree (a template clone or a freshly loaded container)
//! into a configured, named instance and schedules its ready signal for the
//! next frame. Everything here is synchronous; the frame deferral is the only
//! point where the instance is not yet observable as ready.

use glam::{Quat, Vec3, Vec4};
use hecs::Entity;

use crate::assets::{AssetName, Handle};
use crate::core::{FrameQueue, ReadySignal};
use crate::ecs::{GroupKey, InstanceOf, Name, Part, Scene, Tint, Transform};

/// Caller-supplied pose. Unset fields stay at identity, never at whatever
/// the source node carried.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Pose {
    /// Position relative to the scene root
    pub position: Option<Vec3>,
    /// Rotation as a quaternion
    pub rotation: Option<Quat>,
    /// Scale factor
    pub scale: Option<Vec3>,
}

impl Pose {
    /// Check that every set field is finite
    pub fn is_finite(&self) -> bool {
        self.position.is_none_or(Vec3::is_finite)
            && self.rotation.is_none_or(Quat::is_finite)
            && self.scale.is_none_or(Vec3::is_finite)
    }

    /// Transform with this pose applied on top of identity
    pub fn to_transform(&self) -> Transform {
        let mut transform = Transform::default();
        if let Some(position) = self.position {
            transform.position = position;
        }
        if let Some(rotation) = self.rotation {
            transform.rotation = rotation;
        }
        if let Some(scale) = self.scale {
            transform.scale = scale;
        }
        transform
    }
}

/// Caller-supplied look of an instance
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Style {
    /// Color applied to every part that draws a mesh
    pub color: Option<Vec4>,
}

/// Everything the routine needs to know about one instance
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    /// Unique name the instance is registered under
    pub name: String,
    /// Group tag
    pub group: String,
    /// Asset the instance comes from
    pub asset: AssetName,
    /// Caller-supplied pose
    pub pose: Pose,
    /// Caller-supplied look
    pub style: Style,
}

/// Configure `root` as the instance described by `placement`.
///
/// Resets the root pose before applying the caller's, tints mesh parts,
/// enables the whole subtree and makes it pickable, registers the name, and
/// queues the ready signal for the next frame.
pub fn materialize(
    scene: &mut Scene,
    frames: &mut FrameQueue<ReadySignal>,
    root: Entity,
    placement: &Placement,
) -> Entity {
    let nodes = scene.descendants(root);

    if let Some(color) = placement.style.color {
        for &node in &nodes {
            let draws_mesh = scene
                .get::<Part>(node)
                .is_ok_and(|part| part.mesh.is_some());
            if draws_mesh {
                let _ = scene.insert(node, (Tint(color),));
            }
        }
    }

    scene.set_enabled(root, true);
    scene.set_pickable(root, true);

    let _ = scene.insert(
        root,
        (
            placement.pose.to_transform(),
            Name::new(placement.name.as_str()),
            GroupKey(placement.group.clone()),
            InstanceOf(placement.asset.clone()),
        ),
    );
    scene.register_name(placement.name.as_str(), root);

    frames.push(ReadySignal {
        handle: Handle::named(placement.name.as_str()),
        entity: root,
    });

    log::debug!(
        "Materialized {} from {} ({} nodes)",
        placement.name,
        placement.asset,
        nodes.len()
    );
    root
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::{Container, NodeData};
    use crate::ecs::NodeFlags;

    fn placement(name: &str) -> Placement {
        Placement {
            name: name.to_string(),
            group: "props".to_string(),
            asset: AssetName::from("lamp.glb"),
            pose: Pose {
                position: Some(Vec3::new(0.0, 2.0, 0.0)),
                ..Default::default()
            },
            style: Style {
                color: Some(Vec4::new(1.0, 0.0, 0.0, 1.0)),
            },
        }
    }

    fn lamp(scene: &mut Scene) -> Entity {
        let mut container = Container::new("lamp.glb");
        let pole = container.push(NodeData {
            transform: Transform::from_position(Vec3::splat(5.0)),
            mesh: None,
            ..NodeData::mesh("pole", "unused")
        });
        container.push(NodeData {
            parent: Some(pole),
            ..NodeData::mesh("bulb", "bulb_mesh")
        });
        scene.spawn_container(&container)
    }

    #[test]
    fn test_pose_reset_before_apply() {
        let mut scene = Scene::new();
        let mut frames = FrameQueue::new();
        let root = lamp(&mut scene);

        materialize(&mut scene, &mut frames, root, &placement("lamp1"));

        let transform = *scene.get::<Transform>(root).unwrap();
        assert_eq!(transform.position, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(transform.scale, Vec3::ONE);
    }

    #[test]
    fn test_style_and_flags() {
        let mut scene = Scene::new();
        let mut frames = FrameQueue::new();
        let root = lamp(&mut scene);
        scene.set_enabled(root, false);
        scene.set_pickable(root, false);

        materialize(&mut scene, &mut frames, root, &placement("lamp1"));

        let bulb = scene.children_of(root)[0];
        assert!(scene.get::<Tint>(root).is_err(), "pole has no mesh");
        assert!(scene.get::<Tint>(bulb).is_ok());
        for node in scene.descendants(root) {
            assert_eq!(*scene.get::<NodeFlags>(node).unwrap(), NodeFlags::ACTIVE);
        }
    }

    #[test]
    fn test_registers_and_defers_ready() {
        let mut scene = Scene::new();
        let mut frames = FrameQueue::new();
        let root = lamp(&mut scene);

        materialize(&mut scene, &mut frames, root, &placement("lamp1"));

        assert_eq!(scene.lookup("lamp1"), Some(root));
        assert_eq!(scene.get::<GroupKey>(root).unwrap().0, "props");
        assert!(frames.is_empty());
        assert_eq!(frames.pending_count(), 1);

        frames.swap();
        let due: Vec<_> = frames.drain().collect();
        assert_eq!(
            due,
            vec![ReadySignal {
                handle: Handle::named("lamp1"),
                entity: root
            }]
        );
    }

    #[test]
    fn test_pose_finite() {
        let mut pose = Pose::default();
        assert!(pose.is_finite());
        pose.rotation = Some(Quat::from_xyzw(f32::INFINITY, 0.0, 0.0, 1.0));
        assert!(!pose.is_finite());
    }
}
