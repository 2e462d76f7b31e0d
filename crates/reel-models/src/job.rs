//! Generation job definitions persisted by the job store.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::{ModelError, ModelResult};
use crate::take::GenerationDuration;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, not yet accepted by the generation service
    #[default]
    Pending,
    /// Accepted by the generation service, being polled
    Processing,
    /// Artifact downloaded and measured
    Complete,
    /// Generation or download failed
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Error => "error",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }

    /// Whether `self -> next` is a legal lifecycle step.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Pending, JobStatus::Processing)
                | (JobStatus::Pending, JobStatus::Error)
                | (JobStatus::Processing, JobStatus::Complete)
                | (JobStatus::Processing, JobStatus::Error)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Type of job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    /// Whole shot generated as one unit
    ShotGeneration,
    /// One take of a split shot
    TakeGeneration,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::ShotGeneration => "shot_generation",
            JobType::TakeGeneration => "take_generation",
        }
    }
}

/// What was submitted to the generation service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobInput {
    pub prompt: String,
    pub duration: GenerationDuration,
    pub aspect_ratio: String,
    #[serde(default)]
    pub reference_image: Option<PathBuf>,
    /// Shot this job belongs to
    #[serde(default)]
    pub shot_id: Option<String>,
    /// Take index within the shot's chain
    #[serde(default)]
    pub take_index: Option<usize>,
}

/// Finished artifact of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct JobResult {
    /// Local path of the downloaded video
    pub path: PathBuf,
    /// Measured duration in seconds
    pub duration: f64,
}

/// A generation job as persisted by the job store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GenerationJob {
    pub id: JobId,

    #[serde(rename = "type")]
    pub job_type: JobType,

    pub status: JobStatus,

    pub input: JobInput,

    pub result: Option<JobResult>,

    pub error: Option<String>,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl GenerationJob {
    /// Create a new pending job.
    pub fn new(job_type: JobType, input: JobInput) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            job_type,
            status: JobStatus::Pending,
            input,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, next: JobStatus) -> ModelResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(ModelError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark the job as accepted by the generation service.
    pub fn start(&mut self) -> ModelResult<()> {
        self.transition(JobStatus::Processing)
    }

    /// Mark job as complete with its artifact.
    pub fn complete(&mut self, result: JobResult) -> ModelResult<()> {
        self.transition(JobStatus::Complete)?;
        self.result = Some(result);
        Ok(())
    }

    /// Mark job as failed.
    pub fn fail(&mut self, error: impl Into<String>) -> ModelResult<()> {
        self.transition(JobStatus::Error)?;
        self.error = Some(error.into());
        Ok(())
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Artifact path, only when the job completed.
    pub fn artifact_path(&self) -> Option<&PathBuf> {
        match self.status {
            JobStatus::Complete => self.result.as_ref().map(|r| &r.path),
            _ => None,
        }
    }
}
