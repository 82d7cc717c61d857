//! Common scene components

use glam::{Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use crate::assets::AssetName;

/// Transform component for position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position relative to the parent
    pub position: Vec3,
    /// Rotation as a quaternion
    pub rotation: Quat,
    /// Scale factor
    pub scale: Vec3,
}

impl Transform {
    /// Create a transform with just a position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Check that every component is a finite number
    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite() && self.scale.is_finite()
    }

    /// Reset to the identity pose
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

/// Name component. Roots of live instances carry their handle name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// Batch tag for instances created together
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupKey(pub String);

/// One part of a loaded model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Part {
    /// Mesh drawn by this part, if any
    pub mesh: Option<String>,
}

/// Enabled and pickable state of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeFlags {
    /// Whether the node takes part in rendering and simulation
    pub enabled: bool,
    /// Whether the node can be picked by pointer queries
    pub pickable: bool,
}

impl NodeFlags {
    /// Enabled and pickable
    pub const ACTIVE: Self = Self {
        enabled: true,
        pickable: true,
    };

    /// Disabled and not pickable
    pub const INERT: Self = Self {
        enabled: false,
        pickable: false,
    };
}

impl Default for NodeFlags {
    fn default() -> Self {
        Self::ACTIVE
    }
}

/// Color applied to a part by the caller's style
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tint(pub Vec4);

/// Marks the root of a cached template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prototype(pub AssetName);

/// Asset an instance root was created from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceOf(pub AssetName);

/// Set on an instance root once its ready signal has fired
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Live;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transform_finite() {
        let mut transform = Transform::from_position(Vec3::new(1.0, 2.0, 3.0));
        assert!(transform.is_finite());

        transform.scale = Vec3::new(f32::NAN, 1.0, 1.0);
        assert!(!transform.is_finite());

        transform.reset();
        assert_eq!(transform, Transform::default());
    }

    #[test]
    fn test_node_flags_default_active() {
        assert_eq!(NodeFlags::default(), NodeFlags::ACTIVE);
        assert_ne!(NodeFlags::ACTIVE, NodeFlags::INERT);
    }
}
