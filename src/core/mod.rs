//! Core stage module
//!
//! Contains the `AssetStage` coordinator, its configuration and the frame
//! machinery it runs on

mod config;
mod frame;
mod stage;
mod stats;

pub use config::StageConfig;
pub use frame::{FrameQueue, ReadySignal};
pub use stage::{AssetStage, InstanceRequest, RequestState};
pub use stats::LoadStats;
