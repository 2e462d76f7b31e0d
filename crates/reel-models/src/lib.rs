//! Shared data models for the ShotReel pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Shots, dialogue and the 16-term mood vocabulary
//! - Takes and take chains produced by planning
//! - Generation jobs persisted by the job store
//! - Assembly inputs (assembly shots, audio layers, text overlays)
//! - Encoding configuration

pub mod assembly;
pub mod encoding;
pub mod error;
pub mod intensity;
pub mod job;
pub mod mood;
pub mod shot;
pub mod take;

// Re-export common types
pub use assembly::{
    AssemblyShot, AudioLayer, AudioLayerType, AudioSource, OverlayPosition, SpeechDelivery,
    TextOverlay, TransitionDecision,
};
pub use encoding::EncodingConfig;
pub use error::{ModelError, ModelResult};
pub use intensity::IntensityLevel;
pub use job::{GenerationJob, JobId, JobInput, JobResult, JobStatus, JobType};
pub use mood::Mood;
pub use shot::{DialogueLine, Shot, ShotJobs};
pub use take::{GenerationDuration, Take, TakeChain};
