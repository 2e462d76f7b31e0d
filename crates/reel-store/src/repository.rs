//! Repository abstraction over persisted generation jobs.

use async_trait::async_trait;

use reel_models::{GenerationJob, JobId, JobResult, ModelResult};

use crate::error::StoreResult;

/// A lifecycle step applied to one job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Accepted by the generation service
    Start,
    /// Artifact downloaded and measured
    Complete(JobResult),
    /// Generation, download or measurement failed
    Fail(String),
}

impl JobUpdate {
    /// Apply to `job`, enforcing legal status transitions.
    pub fn apply(self, job: &mut GenerationJob) -> ModelResult<()> {
        match self {
            JobUpdate::Start => job.start(),
            JobUpdate::Complete(result) => job.complete(result),
            JobUpdate::Fail(message) => job.fail(message),
        }
    }
}

/// Storage for generation jobs.
///
/// Implementations must make each call atomic with respect to every other
/// call: an update reads, modifies and persists the job as one step.
#[async_trait]
pub trait JobRepository: Send + Sync {
    /// Store a new job. Fails if the id is already present.
    async fn insert(&self, job: GenerationJob) -> StoreResult<()>;

    /// Fetch a job by id.
    async fn get(&self, id: &JobId) -> StoreResult<Option<GenerationJob>>;

    /// Apply `update` and return the job as persisted.
    async fn update(&self, id: &JobId, update: JobUpdate) -> StoreResult<GenerationJob>;

    /// All jobs, oldest first.
    async fn list(&self) -> StoreResult<Vec<GenerationJob>>;
}
