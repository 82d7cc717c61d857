//! Asset stage: instancing external models into a scene graph
//!
//! This crate provides:
//! - Non-blocking instance creation from named assets (glTF or in-memory)
//! - One fetch per asset no matter how many requests arrive while it loads
//! - Template caching so later instances are cloned synchronously
//! - Per-handle readiness callbacks and futures, fired one frame after placement
//! - A hecs-backed scene with hierarchy, names and groups

pub mod assets;
pub mod core;
pub mod ecs;
mod error;

pub use error::{ConfigError, FetchError, RequestError, TemplateError};

// Re-exports for convenience
pub use glam;
pub use hecs;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::assets::{AssetName, AssetSource, Container, GltfSource, Handle, MemorySource, Ready};
    pub use crate::core::{AssetStage, InstanceRequest, LoadStats, RequestState, StageConfig};
    pub use crate::ecs::{Name, Scene, Transform};
    pub use crate::error::{FetchError, RequestError};
    pub use glam::{Quat, Vec3, Vec4};
}
