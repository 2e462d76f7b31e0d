//! Final assembly: normalize, join, title and mix.
//!
//! Every run works inside its own temporary directory, which is removed
//! when the run ends however it ends. Only the finished file is moved to
//! the requested output path.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use reel_media::ops::{
    black_clip_command, burn_text_command, concat_command, concat_list, crossfade_command,
    mix_audio_command, normalize_command, tempo_command, trim_command,
};
use reel_media::overlay::overlay_filter_chain;
use reel_media::{
    get_duration, move_file, probe_video, FfmpegCommand, FfmpegRunner, MediaError, MixInput,
    NormalizeTarget, ProgressMilestones, TextStyle,
};
use reel_models::{
    AssemblyShot, AudioLayer, AudioLayerType, AudioSource, EncodingConfig, SpeechDelivery,
    TextOverlay, TransitionDecision,
};
use reel_planner::transition::{
    BLACK_GAP_SECS, CROSSFADE_LONG_SECS, CROSSFADE_SECS, HARD_CUT_TRIM_SECS,
};
use reel_planner::plan_transitions;
use reel_services::{voice_parameters, SpeechRequest, SpeechSynthesizer};

use crate::error::{AssemblyError, AssemblyStage, PipelineError, PipelineResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};

/// Everything one assembly run needs.
#[derive(Debug, Clone)]
pub struct AssemblyRequest {
    /// Clips in playback order
    pub shots: Vec<AssemblyShot>,
    pub overlays: Vec<TextOverlay>,
    pub audio_layers: Vec<AudioLayer>,
    /// Gain applied to the clips' own audio
    pub volume: f64,
    pub output: PathBuf,
}

/// The finished video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssemblyOutput {
    pub path: PathBuf,
    /// Measured duration in seconds
    pub duration: f64,
    pub shot_count: usize,
}

/// An intermediate file and its measured duration.
#[derive(Debug, Clone)]
struct Clip {
    path: PathBuf,
    duration: f64,
}

/// Runs assembly requests with FFmpeg.
#[derive(Clone)]
pub struct AssemblyEngine {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
    style: TextStyle,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    scratch_root: PathBuf,
    retry: RetryConfig,
}

impl AssemblyEngine {
    /// Per-run temporary directories are created under `scratch_root`.
    pub fn new(runner: FfmpegRunner, encoding: EncodingConfig, scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            encoding,
            style: TextStyle::default(),
            speech: None,
            scratch_root: scratch_root.into(),
            retry: RetryConfig::default(),
        }
    }

    /// Synthesizer for speech audio layers. Without one, speech layers fail
    /// the mix stage.
    pub fn with_speech(mut self, speech: Arc<dyn SpeechSynthesizer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn with_text_style(mut self, style: TextStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Assemble `request` into `request.output`.
    pub async fn assemble(&self, request: &AssemblyRequest) -> PipelineResult<AssemblyOutput> {
        let started = Instant::now();
        let result = self.run(request).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(output) => {
                metrics::record_assembly("success", elapsed);
                info!(
                    output = %output.path.display(),
                    duration = output.duration,
                    shots = output.shot_count,
                    elapsed_secs = elapsed,
                    "Assembly finished"
                );
            }
            Err(PipelineError::Assembly(e)) => {
                metrics::record_assembly("failure", elapsed);
                warn!(
                    stage = %e.stage,
                    shot_index = ?e.shot_index,
                    stderr = e.tool_stderr().unwrap_or(""),
                    "{}",
                    e
                );
            }
            Err(e) => {
                metrics::record_assembly("failure", elapsed);
                warn!(error_kind = e.kind(), "Assembly failed: {}", e);
            }
        }
        result
    }

    async fn run(&self, request: &AssemblyRequest) -> PipelineResult<AssemblyOutput> {
        validate(request)?;

        tokio::fs::create_dir_all(&self.scratch_root).await?;
        let scratch = tempfile::Builder::new()
            .prefix("assembly-")
            .tempdir_in(&self.scratch_root)?;
        let dir = scratch.path();
        debug!(dir = %dir.display(), shots = request.shots.len(), "Starting assembly");

        let (clips, target) = self.normalize(&request.shots, dir).await?;
        let decisions = plan_transitions(&request.shots);
        let joined = self.join(clips, &decisions, target, dir).await?;
        let titled = self.burn_overlays(joined, &request.overlays, dir).await?;
        let mixed = self
            .mix(titled, &request.audio_layers, request.volume, dir)
            .await?;

        let finish = |e: MediaError| AssemblyError::new(AssemblyStage::Mix, None, e);
        move_file(&mixed.path, &request.output).await.map_err(finish)?;
        let duration = get_duration(&request.output).await.map_err(finish)?;

        Ok(AssemblyOutput {
            path: request.output.clone(),
            duration,
            shot_count: request.shots.len(),
        })
    }

    /// Stage 1: re-encode every clip to one format. The first clip's
    /// orientation picks the resolution.
    async fn normalize(
        &self,
        shots: &[AssemblyShot],
        dir: &Path,
    ) -> Result<(Vec<Clip>, NormalizeTarget), AssemblyError> {
        let mut target = NormalizeTarget::landscape();
        let mut clips = Vec::with_capacity(shots.len());

        for (i, shot) in shots.iter().enumerate() {
            let at = |e: MediaError| AssemblyError::new(AssemblyStage::Normalize, Some(i), e);

            let info = probe_video(&shot.path).await.map_err(at)?;
            if i == 0 {
                target = NormalizeTarget::for_reference(&info);
                debug!(size = %target.size(), "Normalization target");
            }

            let output = dir.join(format!("norm_{i:03}.mp4"));
            let cmd = normalize_command(&shot.path, &output, target, info.has_audio, &self.encoding);
            self.encode(AssemblyStage::Normalize, &cmd, info.duration)
                .await
                .map_err(at)?;
            let duration = get_duration(&output).await.map_err(at)?;

            debug!(stage = "normalize", shot = i, duration, has_audio = info.has_audio, "Normalized clip");
            clips.push(Clip {
                path: output,
                duration,
            });
        }

        Ok((clips, target))
    }

    /// Stage 2: left fold over the clips, joining each to the accumulated
    /// result with its transition.
    async fn join(
        &self,
        clips: Vec<Clip>,
        decisions: &[TransitionDecision],
        target: NormalizeTarget,
        dir: &Path,
    ) -> Result<Clip, AssemblyError> {
        let mut clips = clips.into_iter();
        let mut acc = clips.next().ok_or_else(|| {
            AssemblyError::new(
                AssemblyStage::Transition,
                None,
                PipelineError::input_validation("no clips to join"),
            )
        })?;
        let mut black: Option<PathBuf> = None;

        for (offset, (clip, &decision)) in clips.zip(decisions).enumerate() {
            let index = offset + 1;
            let at = |e: MediaError| AssemblyError::new(AssemblyStage::Transition, Some(index), e);
            let output = dir.join(format!("join_{index:03}.mp4"));

            let decision = effective_decision(decision, &acc, &clip);
            debug!(stage = "transition", shot = index, transition = %decision, "Joining clip");

            match decision {
                TransitionDecision::Cut => {
                    let parts = [acc.path.clone(), clip.path.clone()];
                    self.concat(&parts, acc.duration + clip.duration, &output, dir, index)
                        .await
                        .map_err(at)?;
                }
                TransitionDecision::HardCut => {
                    let trimmed = dir.join(format!("trim_{index:03}.mp4"));
                    let keep = acc.duration - HARD_CUT_TRIM_SECS;
                    let cmd = trim_command(&acc.path, keep, &trimmed, &self.encoding);
                    self.encode(AssemblyStage::Transition, &cmd, keep)
                        .await
                        .map_err(at)?;
                    let parts = [trimmed, clip.path.clone()];
                    self.concat(&parts, keep + clip.duration, &output, dir, index)
                        .await
                        .map_err(at)?;
                }
                TransitionDecision::Crossfade | TransitionDecision::CrossfadeLong => {
                    let cmd = crossfade_command(
                        &acc.path,
                        acc.duration,
                        &clip.path,
                        fade_secs(decision),
                        &output,
                        &self.encoding,
                    );
                    let expected = acc.duration + clip.duration - fade_secs(decision);
                    self.encode(AssemblyStage::Transition, &cmd, expected)
                        .await
                        .map_err(at)?;
                }
                TransitionDecision::Black => {
                    let gap = match &black {
                        Some(path) => path.clone(),
                        None => {
                            let path = dir.join("black.mp4");
                            let cmd =
                                black_clip_command(&path, target, BLACK_GAP_SECS, &self.encoding);
                            self.runner.run(&cmd).await.map_err(at)?;
                            black = Some(path.clone());
                            path
                        }
                    };
                    let parts = [acc.path.clone(), gap, clip.path.clone()];
                    let expected = acc.duration + BLACK_GAP_SECS + clip.duration;
                    self.concat(&parts, expected, &output, dir, index)
                        .await
                        .map_err(at)?;
                }
            }

            let duration = get_duration(&output).await.map_err(at)?;
            acc = Clip {
                path: output,
                duration,
            };
        }

        Ok(acc)
    }

    async fn concat(
        &self,
        parts: &[PathBuf],
        expected_secs: f64,
        output: &Path,
        dir: &Path,
        index: usize,
    ) -> Result<(), MediaError> {
        let list = dir.join(format!("concat_{index:03}.txt"));
        tokio::fs::write(&list, concat_list(parts)).await?;
        self.encode(AssemblyStage::Transition, &concat_command(&list, output), expected_secs)
            .await
    }

    /// Run a full-length encode, logging each quarter of `expected_secs`
    /// of output as it is written.
    async fn encode(
        &self,
        stage: AssemblyStage,
        cmd: &FfmpegCommand,
        expected_secs: f64,
    ) -> Result<(), MediaError> {
        let milestones = ProgressMilestones::quarters(expected_secs);
        let output = cmd.output_path().display().to_string();
        self.runner
            .run_with_progress(cmd, move |progress| {
                if let Some(percent) = milestones.crossed(&progress) {
                    debug!(%stage, output = %output, percent, speed = progress.speed, "Encoding");
                }
            })
            .await
    }

    /// Stage 3: burn timed text overlays.
    async fn burn_overlays(
        &self,
        clip: Clip,
        overlays: &[TextOverlay],
        dir: &Path,
    ) -> Result<Clip, AssemblyError> {
        let at = |e: PipelineError| AssemblyError::new(AssemblyStage::Overlay, None, e);

        let mut text_files = Vec::with_capacity(overlays.len());
        for (i, overlay) in overlays.iter().enumerate() {
            let file = dir.join(format!("overlay_{i:02}.txt"));
            tokio::fs::write(&file, &overlay.text)
                .await
                .map_err(|e| at(e.into()))?;
            text_files.push(file);
        }

        let Some(chain) = overlay_filter_chain(overlays, &text_files, &self.style) else {
            return Ok(clip);
        };

        let output = dir.join("titled.mp4");
        let cmd = burn_text_command(&clip.path, &chain, &output, &self.encoding);
        self.encode(AssemblyStage::Overlay, &cmd, clip.duration)
            .await
            .map_err(|e| at(e.into()))?;
        debug!(stage = "overlay", overlays = overlays.len(), "Burned text overlays");

        Ok(Clip {
            path: output,
            duration: clip.duration,
        })
    }

    /// Stage 4: synthesize speech layers, then mix every layer over the
    /// video's own audio.
    async fn mix(
        &self,
        clip: Clip,
        layers: &[AudioLayer],
        volume: f64,
        dir: &Path,
    ) -> Result<Clip, AssemblyError> {
        if layers.is_empty() && (volume - 1.0).abs() < 1e-9 {
            return Ok(clip);
        }
        let at = |e: PipelineError| AssemblyError::new(AssemblyStage::Mix, None, e);

        let mut inputs = Vec::with_capacity(layers.len());
        for (i, layer) in layers.iter().enumerate() {
            let path = match &layer.source {
                AudioSource::File { path } => {
                    if !path.exists() {
                        return Err(at(MediaError::FileNotFound(path.clone()).into()));
                    }
                    path.clone()
                }
                AudioSource::Speech {
                    text,
                    voice_id,
                    delivery,
                } => self
                    .synthesize(i, text, voice_id, delivery, dir)
                    .await
                    .map_err(at)?,
            };
            inputs.push(MixInput {
                path,
                delay: layer.start,
                volume: layer.volume,
                fade_out: layer.layer_type == AudioLayerType::Music,
            });
        }

        let output = dir.join("mixed.mp4");
        let cmd = mix_audio_command(&clip.path, &inputs, volume, clip.duration, &output, &self.encoding);
        self.encode(AssemblyStage::Mix, &cmd, clip.duration)
            .await
            .map_err(|e| at(e.into()))?;
        debug!(stage = "mix", layers = inputs.len(), volume, "Mixed audio layers");

        Ok(Clip {
            path: output,
            duration: clip.duration,
        })
    }

    /// Render one speech layer and apply its speaking rate.
    async fn synthesize(
        &self,
        index: usize,
        text: &str,
        voice_id: &str,
        delivery: &SpeechDelivery,
        dir: &Path,
    ) -> PipelineResult<PathBuf> {
        let speech = self.speech.as_ref().ok_or_else(|| {
            PipelineError::input_validation("speech layer requires a speech synthesizer")
        })?;

        let params = voice_parameters(delivery);
        let request = SpeechRequest::new(voice_id, text, &params, speech.default_model());
        let retry = self.retry.named("speech_synthesize");
        let audio = retry_async(&retry, || speech.synthesize(&request)).await?;

        let raw = dir.join(format!("speech_{index:02}.mp3"));
        tokio::fs::write(&raw, &audio).await?;
        debug!(
            layer = index,
            stability = params.stability,
            speed = params.speed,
            bytes = audio.len(),
            "Synthesized speech"
        );

        let paced = dir.join(format!("speech_{index:02}_paced.wav"));
        match tempo_command(&raw, params.speed, &paced) {
            Some(cmd) => {
                self.run_media(&cmd).await?;
                Ok(paced)
            }
            None => Ok(raw),
        }
    }

    async fn run_media(&self, cmd: &FfmpegCommand) -> PipelineResult<()> {
        Ok(self.runner.run(cmd).await?)
    }
}

/// Crossfades need both clips to be longer than the fade; shorter pairs are
/// joined with a plain cut instead.
fn effective_decision(decision: TransitionDecision, prev: &Clip, curr: &Clip) -> TransitionDecision {
    match decision {
        TransitionDecision::Crossfade | TransitionDecision::CrossfadeLong => {
            let fade = fade_secs(decision);
            if prev.duration <= fade || curr.duration <= fade {
                warn!(
                    transition = %decision,
                    prev = prev.duration,
                    curr = curr.duration,
                    "Clip shorter than fade, using cut"
                );
                TransitionDecision::Cut
            } else {
                decision
            }
        }
        TransitionDecision::HardCut if prev.duration <= HARD_CUT_TRIM_SECS => TransitionDecision::Cut,
        other => other,
    }
}

fn fade_secs(decision: TransitionDecision) -> f64 {
    match decision {
        TransitionDecision::CrossfadeLong => CROSSFADE_LONG_SECS,
        _ => CROSSFADE_SECS,
    }
}

fn validate(request: &AssemblyRequest) -> PipelineResult<()> {
    if request.shots.is_empty() {
        return Err(PipelineError::input_validation("assembly needs at least one shot"));
    }
    if !request.volume.is_finite() || request.volume < 0.0 {
        return Err(PipelineError::input_validation(format!(
            "volume must be a non-negative number, got {}",
            request.volume
        )));
    }
    for (i, overlay) in request.overlays.iter().enumerate() {
        if !overlay.start.is_finite()
            || !overlay.duration.is_finite()
            || overlay.start < 0.0
            || overlay.duration <= 0.0
        {
            return Err(PipelineError::input_validation(format!(
                "overlay {i} has start {} and duration {}",
                overlay.start, overlay.duration
            )));
        }
    }
    for (i, layer) in request.audio_layers.iter().enumerate() {
        if !layer.start.is_finite()
            || !layer.volume.is_finite()
            || layer.start < 0.0
            || layer.volume < 0.0
        {
            return Err(PipelineError::input_validation(format!(
                "audio layer {i} has start {} and volume {}",
                layer.start, layer.volume
            )));
        }
        if let AudioSource::Speech { text, voice_id, .. } = &layer.source {
            if text.trim().is_empty() || voice_id.is_empty() {
                return Err(PipelineError::input_validation(format!(
                    "audio layer {i} needs text and a voice id"
                )));
            }
        }
    }
    Ok(())
}
