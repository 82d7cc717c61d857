//! Entity Component System module
//!
//! The scene graph instances live in, built on top of the hecs ECS library

mod components;
mod hierarchy;
mod scene;

pub use components::{GroupKey, InstanceOf, Live, Name, NodeFlags, Part, Prototype, Tint, Transform};
pub use hierarchy::{Children, Parent};
pub use scene::Scene;
