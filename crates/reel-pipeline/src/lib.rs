//! Generation and assembly pipeline for ShotReel.
//!
//! This crate provides:
//! - Job submission with background polling and completion broadcast
//! - Sequential take-chain execution with continuity frames
//! - Four-stage FFmpeg assembly (normalize, transitions, overlays, mix)
//! - The [`Pipeline`] facade tying planning, execution and assembly together

pub mod assembly;
pub mod chain;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod resolve;
pub mod retry;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod testing;

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, TryStreamExt};
use tokio::sync::broadcast;
use tracing::info;

use reel_media::FfmpegRunner;
use reel_models::{AssemblyShot, AudioLayer, Shot, ShotJobs, TakeChain, TextOverlay, TransitionDecision};
use reel_planner::TransitionInput;
use reel_services::{SpeechSynthesizer, VideoGenerator};
use reel_store::JobRepository;

pub use assembly::{AssemblyEngine, AssemblyOutput, AssemblyRequest};
pub use chain::{ChainExecution, ChainExecutor, ContinuityFrame};
pub use config::PipelineConfig;
pub use error::{AssemblyError, AssemblyStage, PipelineError, PipelineResult};
pub use logging::JobLogger;
pub use resolve::resolve_assembly_shots;
pub use retry::{retry_async, FailureTracker, RetryConfig};
pub use scheduler::{wait_for_terminal, JobCompletion, JobScheduler, WaitPolicy};

/// Planning, execution and assembly behind one handle.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    chains: ChainExecutor,
    assembler: AssemblyEngine,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        store: Arc<dyn JobRepository>,
        generator: Arc<dyn VideoGenerator>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Self {
        let runner = FfmpegRunner::new().with_timeout(config.ffmpeg_timeout.as_secs());
        let scheduler = JobScheduler::new(store, generator, config.takes_dir(), config.poll_interval);
        let chains = ChainExecutor::new(
            scheduler,
            runner.clone(),
            config.frames_dir(),
            config.aspect_ratio.clone(),
            WaitPolicy::new(config.wait_interval, config.wait_timeout),
        );
        let mut assembler = AssemblyEngine::new(runner, config.encoding.clone(), &config.work_dir);
        if let Some(speech) = speech {
            assembler = assembler.with_speech(speech);
        }

        Self {
            config,
            chains,
            assembler,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn scheduler(&self) -> &JobScheduler {
        self.chains.scheduler()
    }

    /// Receive every job completion from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<JobCompletion> {
        self.scheduler().subscribe()
    }

    fn wait_policy(&self) -> WaitPolicy {
        WaitPolicy::new(self.config.wait_interval, self.config.wait_timeout)
    }

    /// Split `shot` into takes, or `None` when it fits one generation.
    pub fn plan_takes(&self, shot: &Shot) -> Option<TakeChain> {
        reel_planner::plan_takes(shot)
    }

    /// Submit every take of `chain` in order and attach the jobs to `shot`.
    pub async fn execute_chain(
        &self,
        shot: &mut Shot,
        chain: &TakeChain,
    ) -> PipelineResult<ChainExecution> {
        self.chains.execute_chain(shot, chain).await
    }

    /// Validate, plan and submit one shot.
    pub async fn execute_shot(&self, shot: &mut Shot) -> PipelineResult<ShotJobs> {
        shot.validated()?;
        match self.plan_takes(shot) {
            Some(chain) => {
                let execution = self.chains.execute_chain(shot, &chain).await?;
                Ok(ShotJobs {
                    primary: execution.primary,
                    job_ids: execution.job_ids,
                })
            }
            None => {
                let job_id = self.chains.execute_single(shot).await?;
                Ok(ShotJobs::single(job_id))
            }
        }
    }

    /// Submit every shot. Takes within a shot run in order; up to
    /// `max_parallel_shots` shots run at once.
    pub async fn execute_shots(&self, shots: &mut [Shot]) -> PipelineResult<()> {
        stream::iter(shots.iter_mut().map(Ok::<_, PipelineError>))
            .try_for_each_concurrent(self.config.max_parallel_shots, |shot| async move {
                self.execute_shot(shot).await.map(|_| ())
            })
            .await?;
        info!(shots = shots.len(), "Submitted all shots");
        Ok(())
    }

    /// Transition from `prev` into `curr`.
    pub fn select_transition(&self, prev: Option<&Shot>, curr: &Shot) -> TransitionDecision {
        reel_planner::select_transition(prev.map(TransitionInput::from), TransitionInput::from(curr))
    }

    /// Wait for the jobs of executed shots and list their clips.
    pub async fn resolve(&self, shots: &[Shot]) -> PipelineResult<Vec<AssemblyShot>> {
        resolve_assembly_shots(self.scheduler(), shots, self.wait_policy()).await
    }

    /// Assemble resolved clips into `output`.
    pub async fn assemble(
        &self,
        shots: Vec<AssemblyShot>,
        overlays: Vec<TextOverlay>,
        audio_layers: Vec<AudioLayer>,
        volume: f64,
        output: impl Into<PathBuf>,
    ) -> PipelineResult<AssemblyOutput> {
        let request = AssemblyRequest {
            shots,
            overlays,
            audio_layers,
            volume,
            output: output.into(),
        };
        self.assembler.assemble(&request).await
    }
}
