//! Asset loading, caching and readiness
//!
//! Provides:
//! - Asset names and instance handles
//! - Unique instance names with optional groups
//! - One in-flight fetch per asset, shared by every request for it
//! - A template per asset, cloned for later instances
//! - Broadcast-once readiness signals

mod handle;
mod identity;
mod instantiate;
mod loads;
mod readiness;
mod signal;
mod template;
pub mod source;

pub use handle::{AssetName, Handle};
pub use identity::{IdentityResolver, ResolvedId};
pub use instantiate::{Placement, Pose, Style, materialize};
pub use loads::{Joined, LoadRegistry, LoadResult};
pub use readiness::{ReadinessRegistry, Ready};
pub use signal::{Dropped, Listen, Signal};
pub use source::{AssetSource, Container, FetchResult, GltfSource, MemorySource, NodeData};
pub use template::TemplateCache;
