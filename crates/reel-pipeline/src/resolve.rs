//! Turning executed shots into assembly clips.

use tracing::debug;

use reel_models::{AssemblyShot, Shot};

use crate::error::{PipelineError, PipelineResult};
use crate::scheduler::{JobScheduler, WaitPolicy};

/// Wait for every job of every shot and list the resulting clips in
/// playback order.
///
/// Each clip carries its shot's energy, tension and mood. Takes after the
/// first in a chain are marked `skip_transition` so they join with a plain
/// cut. A job that ended in error fails the whole resolution.
pub async fn resolve_assembly_shots(
    scheduler: &JobScheduler,
    shots: &[Shot],
    wait: WaitPolicy,
) -> PipelineResult<Vec<AssemblyShot>> {
    let mut clips = Vec::new();

    for shot in shots {
        let jobs = shot.jobs.as_ref().ok_or_else(|| {
            PipelineError::input_validation(format!("shot {} has no generation jobs", shot.id))
        })?;

        for (take, job_id) in jobs.job_ids.iter().enumerate() {
            let job = scheduler.wait(job_id, wait).await?;
            let Some(path) = job.artifact_path().cloned() else {
                return Err(PipelineError::State(format!(
                    "job {job_id} of shot {} ended as {}: {}",
                    shot.id,
                    job.status,
                    job.error.as_deref().unwrap_or("no artifact")
                )));
            };
            debug!(shot_id = %shot.id, take, path = %path.display(), "Resolved clip");

            clips.push(AssemblyShot {
                path,
                energy: shot.energy,
                tension: shot.tension,
                mood: Some(shot.mood),
                skip_transition: take > 0,
            });
        }
    }

    Ok(clips)
}
