//! Submission and completion tracking for generation jobs.
//!
//! Every accepted job gets a background task that polls the generation
//! service at a coarse interval, downloads the finished video and records
//! the terminal state through the job store. Terminal states are also
//! announced on a broadcast channel. Callers that need to block use
//! [`wait_for_terminal`], which polls the store at a finer interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::{warn, Instrument};

use reel_media::get_duration;
use reel_models::{GenerationDuration, GenerationJob, JobId, JobInput, JobResult, JobStatus, JobType};
use reel_services::{
    GeneratedVideo, GenerationRequest, OperationHandle, OperationStatus, ServiceError,
    VideoGenerator,
};
use reel_store::{JobRepository, JobUpdate};

use crate::error::{PipelineError, PipelineResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::retry::{retry_async, FailureTracker, RetryConfig};

const COMPLETION_BUFFER: usize = 64;

/// Poll rounds that may fail in a row (each already retried) before the job
/// is failed.
const MAX_POLL_FAILURES: u32 = 5;

/// A job reaching a terminal state.
#[derive(Debug, Clone, PartialEq)]
pub struct JobCompletion {
    pub job_id: JobId,
    pub status: JobStatus,
}

/// Bounds for a blocking wait on one job.
#[derive(Debug, Clone, Copy)]
pub struct WaitPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl WaitPolicy {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }
}

/// Submits generation jobs and drives them to completion in the background.
#[derive(Clone)]
pub struct JobScheduler {
    store: Arc<dyn JobRepository>,
    generator: Arc<dyn VideoGenerator>,
    output_dir: PathBuf,
    poll_interval: Duration,
    retry: RetryConfig,
    completions: broadcast::Sender<JobCompletion>,
}

impl JobScheduler {
    /// Finished videos are written to `output_dir` as `<job id>.mp4`.
    pub fn new(
        store: Arc<dyn JobRepository>,
        generator: Arc<dyn VideoGenerator>,
        output_dir: impl Into<PathBuf>,
        poll_interval: Duration,
    ) -> Self {
        let (completions, _) = broadcast::channel(COMPLETION_BUFFER);
        Self {
            store,
            generator,
            output_dir: output_dir.into(),
            poll_interval,
            retry: RetryConfig::default(),
            completions,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn store(&self) -> &Arc<dyn JobRepository> {
        &self.store
    }

    /// Receive every terminal state reached after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<JobCompletion> {
        self.completions.subscribe()
    }

    /// Create a job for `input` and submit it.
    ///
    /// A submission the service rejects is recorded on the job (status
    /// `error`) rather than returned, so callers always get an id. Only
    /// job-store failures are returned as errors.
    pub async fn submit(&self, job_type: JobType, input: JobInput) -> PipelineResult<JobId> {
        let job = GenerationJob::new(job_type, input);
        let job_id = job.id.clone();
        let duration = job.input.duration;
        let logger = JobLogger::new(&job_id, job_type.as_str())
            .for_shot(job.input.shot_id.as_deref(), job.input.take_index);
        let request = GenerationRequest {
            prompt: job.input.prompt.clone(),
            duration,
            aspect_ratio: job.input.aspect_ratio.clone(),
            first_frame: job.input.reference_image.clone(),
            last_frame: None,
        };

        self.store.insert(job).await?;

        let retry = self.retry.named("video_submit");
        match retry_async(&retry, || self.generator.submit(&request)).await {
            Ok(handle) => {
                self.store.update(&job_id, JobUpdate::Start).await?;
                metrics::record_job_submitted(job_type.as_str());
                logger.log_start(&format!("operation {handle}, {duration}"));

                let span = logger.create_span();
                let scheduler = self.clone();
                let id = job_id.clone();
                tokio::spawn(
                    async move { scheduler.drive(id, handle, duration, logger).await }
                        .instrument(span),
                );
            }
            Err(e) => {
                logger.log_error(&format!("submission rejected: {e}"));
                self.finish(&job_id, JobUpdate::Fail(format!("submission failed: {e}")))
                    .await?;
            }
        }

        Ok(job_id)
    }

    /// Block until `job_id` is terminal, per `policy`.
    pub async fn wait(&self, job_id: &JobId, policy: WaitPolicy) -> PipelineResult<GenerationJob> {
        wait_for_terminal(self.store.as_ref(), job_id, policy).await
    }

    async fn drive(
        self,
        job_id: JobId,
        handle: OperationHandle,
        nominal: GenerationDuration,
        logger: JobLogger,
    ) {
        let update = match self.await_operation(&handle, &logger).await {
            Ok(video) => match self.materialize(&job_id, video, nominal).await {
                Ok(result) => {
                    logger.log_completion(&format!(
                        "{} ({:.2}s)",
                        result.path.display(),
                        result.duration
                    ));
                    JobUpdate::Complete(result)
                }
                Err(e) => {
                    logger.log_error(&format!("download failed: {e}"));
                    JobUpdate::Fail(format!("download failed: {e}"))
                }
            },
            Err(message) => {
                logger.log_error(&message);
                JobUpdate::Fail(message)
            }
        };

        if let Err(e) = self.finish(&job_id, update).await {
            logger.log_error(&format!("could not record terminal state: {e}"));
        }
    }

    /// Poll until the operation is done. `Err` carries the failure message.
    async fn await_operation(
        &self,
        handle: &OperationHandle,
        logger: &JobLogger,
    ) -> Result<GeneratedVideo, String> {
        let retry = self.retry.named("video_poll");
        let mut failures = FailureTracker::new(retry.operation, MAX_POLL_FAILURES, 3);

        loop {
            match retry_async(&retry, || self.generator.poll(handle)).await {
                Ok(OperationStatus::Running) => {
                    failures.record_success();
                    logger.log_progress(&format!("operation {handle} still running"));
                }
                Ok(OperationStatus::Done(video)) => return Ok(video),
                Ok(OperationStatus::Failed(message)) => {
                    return Err(ServiceError::OperationFailed(message).to_string())
                }
                Err(e) if e.is_retryable() && !failures.exhausted() => {
                    if failures.record_failure() {
                        logger.log_warning(&format!("poll failed: {e}"));
                    }
                }
                Err(e) => return Err(format!("polling failed: {e}")),
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Write the finished video to the output directory and measure it.
    async fn materialize(
        &self,
        job_id: &JobId,
        video: GeneratedVideo,
        nominal: GenerationDuration,
    ) -> PipelineResult<JobResult> {
        let bytes = match video {
            GeneratedVideo::Inline(bytes) => bytes,
            GeneratedVideo::Remote(uri) => {
                let retry = self.retry.named("video_fetch");
                retry_async(&retry, || self.generator.fetch(&uri)).await?
            }
        };
        if bytes.is_empty() {
            return Err(ServiceError::invalid_response("generated video is empty").into());
        }

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(format!("{job_id}.mp4"));
        tokio::fs::write(&path, &bytes).await?;

        // Assembly re-probes every clip, so an unreadable file is caught there.
        let duration = match get_duration(&path).await {
            Ok(d) if d > 0.0 => d,
            Ok(_) => nominal.as_secs_f64(),
            Err(e) => {
                warn!(job_id = %job_id, "Could not measure video, using requested duration: {}", e);
                nominal.as_secs_f64()
            }
        };

        Ok(JobResult { path, duration })
    }

    async fn finish(&self, job_id: &JobId, update: JobUpdate) -> PipelineResult<GenerationJob> {
        let job = self.store.update(job_id, update).await?;
        metrics::record_job_completed(job.status.as_str());
        // Nobody listening is fine.
        let _ = self.completions.send(JobCompletion {
            job_id: job.id.clone(),
            status: job.status,
        });
        Ok(job)
    }
}

async fn poll_store(
    store: &dyn JobRepository,
    job_id: &JobId,
    interval: Duration,
) -> PipelineResult<GenerationJob> {
    loop {
        match store.get(job_id).await? {
            None => return Err(PipelineError::not_found(format!("job {job_id}"))),
            Some(job) if job.is_terminal() => return Ok(job),
            Some(_) => tokio::time::sleep(interval).await,
        }
    }
}

/// Re-read `job_id` from `store` every `policy.interval` until it is terminal.
///
/// Fails with `Timeout` after `policy.timeout`; the job itself keeps running
/// and may still finish later.
pub async fn wait_for_terminal(
    store: &dyn JobRepository,
    job_id: &JobId,
    policy: WaitPolicy,
) -> PipelineResult<GenerationJob> {
    tokio::time::timeout(policy.timeout, poll_store(store, job_id, policy.interval))
        .await
        .map_err(|_| PipelineError::Timeout {
            job_id: job_id.clone(),
            waited: policy.timeout,
        })?
}
