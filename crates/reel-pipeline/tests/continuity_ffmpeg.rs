//! Take chaining against a real FFmpeg install.
//!
//! Run with `cargo test -p reel-pipeline -- --ignored`.

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;

use reel_media::{FfmpegCommand, FfmpegRunner};
use reel_models::{DialogueLine, GenerationDuration, Mood, Shot, Take, TakeChain};
use reel_pipeline::{ChainExecutor, JobScheduler, WaitPolicy};
use reel_services::{
    GeneratedVideo, GenerationRequest, OperationHandle, OperationStatus, ServiceResult,
    VideoGenerator,
};
use reel_store::JobStore;

async fn render_clip(dir: &Path, secs: f64) -> Vec<u8> {
    let path = dir.join("rendered.mp4");
    let cmd = FfmpegCommand::new(&path)
        .lavfi(format!("testsrc2=size=320x180:rate=24:duration={secs}"))
        .video_codec("libx264")
        .output_args(["-pix_fmt", "yuv420p"]);
    FfmpegRunner::new().with_timeout(60).run(&cmd).await.unwrap();
    tokio::fs::read(&path).await.unwrap()
}

/// Answers every submission with the same decodable mp4.
struct RenderedGenerator {
    video: Vec<u8>,
    submissions: Mutex<Vec<GenerationRequest>>,
}

impl RenderedGenerator {
    fn submissions(&self) -> Vec<GenerationRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoGenerator for RenderedGenerator {
    async fn submit(&self, request: &GenerationRequest) -> ServiceResult<OperationHandle> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(request.clone());
        Ok(OperationHandle(format!("operations/{}", submissions.len())))
    }

    async fn poll(&self, _handle: &OperationHandle) -> ServiceResult<OperationStatus> {
        Ok(OperationStatus::Done(GeneratedVideo::Inline(self.video.clone())))
    }

    async fn fetch(&self, uri: &str) -> ServiceResult<Vec<u8>> {
        panic!("inline videos are never fetched, got {uri}");
    }
}

fn take(index: usize, count: usize, speaker: &str) -> Take {
    Take {
        index,
        lines: vec![DialogueLine::new(speaker, "one two three four five six seven eight")],
        estimated_duration: 3.2,
        duration: GenerationDuration::Four,
        action_hint: format!("The keeper climbs the stairs. take {index}"),
        is_first: index == 0,
        is_last: index + 1 == count,
        over_capacity: false,
    }
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_second_take_opens_on_last_frame_of_first() {
    let dir = TempDir::new().unwrap();
    let generator = Arc::new(RenderedGenerator {
        video: render_clip(dir.path(), 2.0).await,
        submissions: Mutex::new(Vec::new()),
    });

    let frames_dir = dir.path().join("frames");
    let scheduler = JobScheduler::new(
        Arc::new(JobStore::in_memory()),
        generator.clone(),
        dir.path().join("takes"),
        Duration::from_millis(10),
    );
    let executor = ChainExecutor::new(
        scheduler,
        FfmpegRunner::new().with_timeout(60),
        &frames_dir,
        "16:9",
        WaitPolicy::new(Duration::from_millis(10), Duration::from_secs(30)),
    );

    let mut shot = Shot::new("s7", Mood::Tense, 8.0)
        .with_description("The keeper climbs the stairs.")
        .with_reference_image("/refs/keeper.png");
    let chain = TakeChain::new("s7", vec![take(0, 2, "A"), take(1, 2, "B")]);

    let execution = executor.execute_chain(&mut shot, &chain).await.unwrap();

    let submissions = generator.submissions();
    assert_eq!(submissions.len(), 2);
    assert_eq!(
        submissions[0].first_frame.as_deref(),
        Some(Path::new("/refs/keeper.png"))
    );

    let expected = frames_dir.join(format!("{}_last.jpg", execution.job_ids[0]));
    assert_eq!(submissions[1].first_frame.as_ref(), Some(&expected));
    let frame = tokio::fs::metadata(&expected).await.unwrap();
    assert!(frame.is_file());
    assert!(frame.len() > 0);
}
