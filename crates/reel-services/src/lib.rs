//! Clients for the external services the pipeline depends on.
//!
//! This crate provides:
//! - [`VideoGenerator`]: long-running text/image-to-video generation
//! - [`SpeechSynthesizer`]: text-to-speech for voice-over layers
//! - Voice parameter derivation from mood, tension and energy

pub mod config;
pub mod error;
pub mod speech;
pub mod video;
pub mod voice;

pub use config::ServiceConfig;
pub use error::{ServiceError, ServiceResult};
pub use speech::{HttpSpeechSynthesizer, SpeechRequest, SpeechSynthesizer};
pub use video::{
    GeneratedVideo, GenerationRequest, HttpVideoGenerator, OperationHandle, OperationStatus,
    VideoGenerator,
};
pub use voice::{voice_parameters, VoiceParameters};
