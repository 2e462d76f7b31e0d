//! ShotReel command-line entry point.
//!
//! ```text
//! shotreel <manifest.json>        plan, generate, wait and assemble
//! shotreel plan <manifest.json>   print the take plan only
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use reel_models::{AudioLayer, JobId, JobStatus, Shot, TakeChain, TextOverlay, TransitionDecision};
use reel_pipeline::{metrics, AssemblyOutput, Pipeline, PipelineConfig};
use reel_services::{HttpSpeechSynthesizer, HttpVideoGenerator, ServiceConfig};
use reel_store::JobStore;

/// Input file for one run.
#[derive(Debug, Deserialize)]
struct Manifest {
    shots: Vec<Shot>,
    #[serde(default)]
    overlays: Vec<TextOverlay>,
    #[serde(default)]
    audio_layers: Vec<AudioLayer>,
    #[serde(default = "default_volume")]
    volume: f64,
    output: PathBuf,
}

fn default_volume() -> f64 {
    1.0
}

#[derive(Debug, Serialize)]
struct PlanEntry<'a> {
    shot_id: &'a str,
    /// Transition into this shot from the previous one
    transition: TransitionDecision,
    takes: Option<TakeChain>,
}

#[derive(Debug, Serialize)]
struct ShotSummary {
    shot_id: String,
    job_ids: Vec<JobId>,
}

#[derive(Debug, Serialize)]
struct RunSummary {
    #[serde(flatten)]
    output: AssemblyOutput,
    shots: Vec<ShotSummary>,
}

enum Mode {
    Run(PathBuf),
    Plan(PathBuf),
}

fn parse_args() -> anyhow::Result<Mode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.as_slice() {
        [cmd, manifest] if cmd == "plan" => Ok(Mode::Plan(PathBuf::from(manifest))),
        [manifest] => Ok(Mode::Run(PathBuf::from(manifest))),
        _ => bail!("usage: shotreel [plan] <manifest.json>"),
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("shotreel=info,reel_pipeline=info,reel_store=info"));

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn init_metrics() -> anyhow::Result<()> {
    let Ok(addr) = std::env::var("METRICS_ADDR") else {
        return Ok(());
    };
    let addr: SocketAddr = addr
        .parse()
        .with_context(|| format!("invalid METRICS_ADDR {addr}"))?;
    metrics::init_metrics(addr).context("failed to install Prometheus recorder")?;
    info!(%addr, "Serving Prometheus metrics");
    Ok(())
}

async fn read_manifest(path: &Path) -> anyhow::Result<Manifest> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("invalid manifest {}", path.display()))
}

fn plan(manifest: &Manifest) -> Vec<PlanEntry<'_>> {
    manifest
        .shots
        .iter()
        .enumerate()
        .map(|(i, shot)| {
            let prev = i.checked_sub(1).map(|p| &manifest.shots[p]);
            PlanEntry {
                shot_id: &shot.id,
                transition: reel_planner::select_transition(
                    prev.map(Into::into),
                    shot.into(),
                ),
                takes: reel_planner::plan_takes(shot),
            }
        })
        .collect()
}

async fn run(mut manifest: Manifest) -> anyhow::Result<RunSummary> {
    let config = PipelineConfig::from_env();
    info!("Pipeline config: {:?}", config);
    let services = ServiceConfig::from_env();

    let store = JobStore::open(&config.job_store_path)
        .await
        .context("failed to open job store")?;
    let generator = HttpVideoGenerator::new(&services).context("failed to build video client")?;
    let speech = HttpSpeechSynthesizer::new(&services).context("failed to build speech client")?;

    let pipeline = Pipeline::new(
        config,
        Arc::new(store),
        Arc::new(generator),
        Some(Arc::new(speech)),
    );

    let mut completions = pipeline.subscribe();
    tokio::spawn(async move {
        while let Ok(done) = completions.recv().await {
            match done.status {
                JobStatus::Complete => info!(job_id = %done.job_id, "Job complete"),
                status => warn!(job_id = %done.job_id, %status, "Job finished without video"),
            }
        }
    });

    pipeline.execute_shots(&mut manifest.shots).await?;
    let clips = pipeline.resolve(&manifest.shots).await?;
    let output = pipeline
        .assemble(
            clips,
            manifest.overlays,
            manifest.audio_layers,
            manifest.volume,
            manifest.output,
        )
        .await?;

    let shots = manifest
        .shots
        .iter()
        .map(|shot| ShotSummary {
            shot_id: shot.id.clone(),
            job_ids: shot.jobs.as_ref().map(|j| j.job_ids.clone()).unwrap_or_default(),
        })
        .collect();

    Ok(RunSummary { output, shots })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    init_metrics()?;

    let mode = parse_args()?;
    match mode {
        Mode::Plan(path) => {
            let manifest = read_manifest(&path).await?;
            println!("{}", serde_json::to_string_pretty(&plan(&manifest))?);
        }
        Mode::Run(path) => {
            let manifest = read_manifest(&path).await?;
            info!(shots = manifest.shots.len(), "Starting shotreel run");
            match run(manifest).await {
                Ok(summary) => println!("{}", serde_json::to_string_pretty(&summary)?),
                Err(e) => {
                    error!("Run failed: {:#}", e);
                    return Err(e);
                }
            }
        }
    }

    Ok(())
}
