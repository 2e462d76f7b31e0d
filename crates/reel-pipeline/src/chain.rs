//! Sequential execution of take chains.
//!
//! Takes of one shot run strictly in order. Before each take after the
//! first, the previous take is awaited and its last frame captured so the
//! next generation opens where the previous one ended. Any failure on that
//! path degrades to the shot's reference image; the chain never stops.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{info, warn};

use reel_media::{extract_last_frame, FfmpegRunner};
use reel_models::{JobId, JobInput, JobType, Shot, ShotJobs, TakeChain};
use reel_planner::select_allowed_duration;

use crate::error::{PipelineError, PipelineResult};
use crate::metrics;
use crate::scheduler::{JobScheduler, WaitPolicy};

/// Outcome of capturing the opening frame for the next take.
#[derive(Debug, Clone, PartialEq)]
pub enum ContinuityFrame {
    /// Last frame of the previous take
    Available(PathBuf),
    /// No frame; the next take falls back to the shot reference image
    Unavailable { reason: String },
}

impl ContinuityFrame {
    pub fn is_available(&self) -> bool {
        matches!(self, ContinuityFrame::Available(_))
    }

    /// The captured frame, or `fallback` when none was captured.
    pub fn or_fallback(self, fallback: Option<&PathBuf>) -> Option<PathBuf> {
        match self {
            ContinuityFrame::Available(path) => Some(path),
            ContinuityFrame::Unavailable { .. } => fallback.cloned(),
        }
    }
}

/// Jobs created for one chained shot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChainExecution {
    /// One job per take, in playback order
    pub job_ids: Vec<JobId>,
    /// Job of the first take
    pub primary: JobId,
}

/// Submits shots and take chains through a [`JobScheduler`].
#[derive(Clone)]
pub struct ChainExecutor {
    scheduler: JobScheduler,
    runner: FfmpegRunner,
    frames_dir: PathBuf,
    aspect_ratio: String,
    wait: WaitPolicy,
}

impl ChainExecutor {
    pub fn new(
        scheduler: JobScheduler,
        runner: FfmpegRunner,
        frames_dir: impl Into<PathBuf>,
        aspect_ratio: impl Into<String>,
        wait: WaitPolicy,
    ) -> Self {
        Self {
            scheduler,
            runner,
            frames_dir: frames_dir.into(),
            aspect_ratio: aspect_ratio.into(),
            wait,
        }
    }

    pub fn scheduler(&self) -> &JobScheduler {
        &self.scheduler
    }

    /// Submit every take of `chain` in order and attach the jobs to `shot`.
    pub async fn execute_chain(
        &self,
        shot: &mut Shot,
        chain: &TakeChain,
    ) -> PipelineResult<ChainExecution> {
        if chain.shot_id != shot.id {
            return Err(PipelineError::input_validation(format!(
                "take chain for shot {} applied to shot {}",
                chain.shot_id, shot.id
            )));
        }
        if chain.len() < 2 {
            return Err(PipelineError::input_validation(format!(
                "take chain for shot {} has {} takes",
                shot.id,
                chain.len()
            )));
        }

        let mut job_ids: Vec<JobId> = Vec::with_capacity(chain.len());
        for take in &chain.takes {
            let first_frame = match job_ids.last() {
                None => shot.reference_image.clone(),
                Some(previous) => {
                    let frame = self.continuity_frame(previous).await?;
                    if let ContinuityFrame::Unavailable { reason } = &frame {
                        warn!(
                            shot_id = %shot.id,
                            take = take.index,
                            "Continuity frame unavailable, using shot reference: {}", reason
                        );
                        metrics::record_continuity_fallback();
                    }
                    frame.or_fallback(shot.reference_image.as_ref())
                }
            };

            let input = JobInput {
                prompt: take.action_hint.clone(),
                duration: take.duration,
                aspect_ratio: self.aspect_ratio.clone(),
                reference_image: first_frame,
                shot_id: Some(shot.id.clone()),
                take_index: Some(take.index),
            };
            let job_id = self.scheduler.submit(JobType::TakeGeneration, input).await?;
            job_ids.push(job_id);
        }

        let primary = job_ids[0].clone();
        shot.jobs = Some(ShotJobs {
            primary: primary.clone(),
            job_ids: job_ids.clone(),
        });
        info!(
            shot_id = %shot.id,
            takes = job_ids.len(),
            generation_secs = chain.total_generation_seconds(),
            "Submitted take chain"
        );

        Ok(ChainExecution { job_ids, primary })
    }

    /// Submit an unsplit shot as a single job.
    pub async fn execute_single(&self, shot: &mut Shot) -> PipelineResult<JobId> {
        let input = JobInput {
            prompt: shot.description.clone(),
            duration: select_allowed_duration(shot.duration_target),
            aspect_ratio: self.aspect_ratio.clone(),
            reference_image: shot.reference_image.clone(),
            shot_id: Some(shot.id.clone()),
            take_index: None,
        };
        let job_id = self.scheduler.submit(JobType::ShotGeneration, input).await?;
        shot.jobs = Some(ShotJobs::single(job_id.clone()));
        Ok(job_id)
    }

    /// Wait for `previous` and capture its last frame.
    ///
    /// Timeouts, failed jobs and extraction failures all yield
    /// `Unavailable`; only job-store errors are returned.
    async fn continuity_frame(&self, previous: &JobId) -> PipelineResult<ContinuityFrame> {
        let job = match self.scheduler.wait(previous, self.wait).await {
            Ok(job) => job,
            Err(e @ PipelineError::Timeout { .. }) => {
                return Ok(ContinuityFrame::Unavailable {
                    reason: e.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        let Some(video) = job.artifact_path().cloned() else {
            let cause = job.error.clone().unwrap_or_else(|| job.status.to_string());
            return Ok(ContinuityFrame::Unavailable {
                reason: format!("previous take failed: {cause}"),
            });
        };

        let frame = self.frame_path(previous);
        match extract_last_frame(&self.runner, &video, &frame).await {
            Ok(()) => Ok(ContinuityFrame::Available(frame)),
            Err(e) => Ok(ContinuityFrame::Unavailable {
                reason: format!("frame extraction failed: {e}"),
            }),
        }
    }

    fn frame_path(&self, job_id: &JobId) -> PathBuf {
        self.frames_dir.join(format!("{job_id}_last.jpg"))
    }

    pub fn frames_dir(&self) -> &Path {
        &self.frames_dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::RetryConfig;
    use crate::testing::{Outcome, ScriptedGenerator};
    use reel_models::{DialogueLine, GenerationDuration, JobStatus, Mood, Take};
    use reel_store::JobStore;
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    fn executor(generator: Arc<ScriptedGenerator>, dir: &TempDir, timeout: Duration) -> ChainExecutor {
        let scheduler = JobScheduler::new(
            Arc::new(JobStore::in_memory()),
            generator,
            dir.path().join("takes"),
            Duration::from_millis(5),
        )
        .with_retry(RetryConfig::new("test").with_base_delay(Duration::from_millis(1)));
        ChainExecutor::new(
            scheduler,
            FfmpegRunner::new().with_timeout(30),
            dir.path().join("frames"),
            "16:9",
            WaitPolicy::new(Duration::from_millis(5), timeout),
        )
    }

    fn take(index: usize, count: usize, speaker: &str) -> Take {
        Take {
            index,
            lines: vec![DialogueLine::new(speaker, "one two three four five six seven eight")],
            estimated_duration: 3.2,
            duration: GenerationDuration::Six,
            action_hint: format!("Two keepers argue. take {index}"),
            is_first: index == 0,
            is_last: index + 1 == count,
            over_capacity: false,
        }
    }

    fn chained_shot() -> (Shot, TakeChain) {
        let shot = Shot::new("s3", Mood::Tense, 8.0)
            .with_description("Two keepers argue.")
            .with_reference_image("/refs/keepers.png");
        let chain = TakeChain::new(
            "s3",
            vec![take(0, 3, "A"), take(1, 3, "B"), take(2, 3, "A")],
        );
        (shot, chain)
    }

    #[tokio::test]
    async fn test_chain_submits_in_order_and_attaches_jobs() {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::default());
        let executor = executor(generator.clone(), &dir, Duration::from_secs(5));
        let (mut shot, chain) = chained_shot();

        let execution = executor.execute_chain(&mut shot, &chain).await.unwrap();

        assert_eq!(execution.job_ids.len(), 3);
        assert_eq!(execution.primary, execution.job_ids[0]);
        let jobs = shot.jobs.as_ref().unwrap();
        assert_eq!(jobs.job_ids, execution.job_ids);
        assert!(jobs.is_chain());

        let submitted = generator.submissions();
        let prompts: Vec<_> = submitted.iter().map(|r| r.prompt.as_str()).collect();
        assert_eq!(
            prompts,
            vec![
                "Two keepers argue. take 0",
                "Two keepers argue. take 1",
                "Two keepers argue. take 2"
            ]
        );
        assert_eq!(submitted[0].first_frame, Some(PathBuf::from("/refs/keepers.png")));

        let store = executor.scheduler().store();
        for (i, id) in execution.job_ids.iter().enumerate() {
            let job = store.get(id).await.unwrap().unwrap();
            assert_eq!(job.input.take_index, Some(i));
            assert_eq!(job.input.shot_id.as_deref(), Some("s3"));
        }
    }

    #[tokio::test]
    async fn test_unreadable_take_falls_back_to_reference() {
        // Scripted bytes are not a decodable video, so frame capture fails
        // whether or not FFmpeg is installed.
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::default());
        let executor = executor(generator.clone(), &dir, Duration::from_secs(5));
        let (mut shot, chain) = chained_shot();

        executor.execute_chain(&mut shot, &chain).await.unwrap();

        for request in generator.submissions() {
            assert_eq!(request.first_frame, Some(PathBuf::from("/refs/keepers.png")));
        }
    }

    #[tokio::test]
    async fn test_failed_take_does_not_stop_chain() {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::new(vec![
            Outcome::Fail("content policy".to_string()),
            Outcome::Reject(400),
        ]));
        let executor = executor(generator.clone(), &dir, Duration::from_secs(5));
        let (mut shot, chain) = chained_shot();

        let execution = executor.execute_chain(&mut shot, &chain).await.unwrap();

        assert_eq!(execution.job_ids.len(), 3);
        assert_eq!(generator.submissions().len(), 3);
        let store = executor.scheduler().store();
        let first = store.get(&execution.job_ids[0]).await.unwrap().unwrap();
        let second = store.get(&execution.job_ids[1]).await.unwrap().unwrap();
        assert_eq!(first.status, JobStatus::Error);
        assert_eq!(second.status, JobStatus::Error);
    }

    #[tokio::test]
    async fn test_timed_out_take_falls_back() {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::new(vec![Outcome::Hang]));
        let executor = executor(generator.clone(), &dir, Duration::from_millis(40));
        let (mut shot, chain) = chained_shot();

        let execution = executor.execute_chain(&mut shot, &chain).await.unwrap();

        assert_eq!(execution.job_ids.len(), 3);
        assert_eq!(
            generator.submissions()[1].first_frame,
            Some(PathBuf::from("/refs/keepers.png"))
        );
    }

    #[tokio::test]
    async fn test_chain_must_match_shot() {
        let dir = TempDir::new().unwrap();
        let executor = executor(Arc::new(ScriptedGenerator::default()), &dir, Duration::from_secs(1));
        let (_, chain) = chained_shot();
        let mut other = Shot::new("s9", Mood::Calm, 6.0);

        let err = executor.execute_chain(&mut other, &chain).await.unwrap_err();
        assert!(matches!(err, PipelineError::InputValidation(_)));
        assert!(other.jobs.is_none());
    }

    #[tokio::test]
    async fn test_single_shot_submission() {
        let dir = TempDir::new().unwrap();
        let generator = Arc::new(ScriptedGenerator::default());
        let executor = executor(generator.clone(), &dir, Duration::from_secs(1));
        let mut shot = Shot::new("s1", Mood::Serene, 5.0).with_description("Waves roll in.");

        let id = executor.execute_single(&mut shot).await.unwrap();

        let request = &generator.submissions()[0];
        assert_eq!(request.prompt, "Waves roll in.");
        assert_eq!(request.duration, GenerationDuration::Six);
        assert!(request.first_frame.is_none());
        assert_eq!(shot.jobs, Some(ShotJobs::single(id)));
    }

    #[test]
    fn test_continuity_fallback() {
        let reference = PathBuf::from("ref.png");
        let frame = ContinuityFrame::Available(PathBuf::from("last.jpg"));
        assert!(frame.is_available());
        assert_eq!(frame.or_fallback(Some(&reference)), Some(PathBuf::from("last.jpg")));

        let missing = ContinuityFrame::Unavailable {
            reason: "timeout".to_string(),
        };
        assert_eq!(missing.or_fallback(Some(&reference)), Some(reference));
        let missing = ContinuityFrame::Unavailable {
            reason: "timeout".to_string(),
        };
        assert_eq!(missing.or_fallback(None), None);
    }
}
