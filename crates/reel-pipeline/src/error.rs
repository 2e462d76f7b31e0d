//! Pipeline error types.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use reel_media::MediaError;
use reel_models::{JobId, ModelError};
use reel_services::ServiceError;
use reel_store::StoreError;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid input: {0}")]
    InputValidation(String),

    #[error("External service error: {0}")]
    ExternalService(#[from] ServiceError),

    #[error("Media tool error: {0}")]
    MediaTool(#[from] MediaError),

    #[error("Timed out after {}s waiting for job {job_id}", .waited.as_secs())]
    Timeout { job_id: JobId, waited: Duration },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("State error: {0}")]
    State(String),

    #[error("Job store error: {0}")]
    Store(StoreError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn input_validation(msg: impl Into<String>) -> Self {
        Self::InputValidation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }

    /// Short label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InputValidation(_) => "input_validation",
            PipelineError::ExternalService(_) => "external_service",
            PipelineError::MediaTool(_) => "media_tool",
            PipelineError::Timeout { .. } => "timeout",
            PipelineError::NotFound(_) => "not_found",
            PipelineError::State(_) => "state",
            PipelineError::Store(_) => "store",
            PipelineError::Assembly(_) => "assembly",
            PipelineError::Io(_) => "io",
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::InvalidTransition { .. } => PipelineError::State(err.to_string()),
            other => PipelineError::InputValidation(other.to_string()),
        }
    }
}

impl From<StoreError> for PipelineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => PipelineError::NotFound(format!("job {id}")),
            StoreError::State(model) => PipelineError::from(model),
            other => PipelineError::Store(other),
        }
    }
}

/// Assembly stage in which a failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssemblyStage {
    Normalize,
    Transition,
    Overlay,
    Mix,
}

impl AssemblyStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssemblyStage::Normalize => "normalize",
            AssemblyStage::Transition => "transition",
            AssemblyStage::Overlay => "overlay",
            AssemblyStage::Mix => "mix",
        }
    }
}

impl fmt::Display for AssemblyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A failed assembly run: the stage, the clip being processed (if any) and
/// the underlying cause.
#[derive(Debug, Error)]
#[error(
    "Assembly failed in {stage} stage{}: {source}",
    .shot_index.map(|i| format!(" at shot {i}")).unwrap_or_default()
)]
pub struct AssemblyError {
    pub stage: AssemblyStage,
    pub shot_index: Option<usize>,
    pub source: Box<PipelineError>,
}

impl AssemblyError {
    pub fn new(stage: AssemblyStage, shot_index: Option<usize>, source: impl Into<PipelineError>) -> Self {
        Self {
            stage,
            shot_index,
            source: Box::new(source.into()),
        }
    }

    /// Stderr tail of the media tool that caused the failure, if any.
    pub fn tool_stderr(&self) -> Option<&str> {
        match self.source.as_ref() {
            PipelineError::MediaTool(e) => e.stderr(),
            _ => None,
        }
    }
}
