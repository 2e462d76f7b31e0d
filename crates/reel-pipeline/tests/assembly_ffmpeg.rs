//! End-to-end assembly against a real FFmpeg install.
//!
//! Run with `cargo test -p reel-pipeline -- --ignored`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use reel_media::{probe_video, FfmpegCommand, FfmpegRunner, TextStyle};
use reel_models::{
    AssemblyShot, AudioLayer, AudioLayerType, AudioSource, EncodingConfig, Mood, OverlayPosition,
    SpeechDelivery, TextOverlay, TransitionDecision,
};
use reel_pipeline::{AssemblyEngine, AssemblyRequest};
use reel_planner::{expected_duration, plan_transitions};
use reel_services::{ServiceResult, SpeechRequest, SpeechSynthesizer};

const TOLERANCE_SECS: f64 = 0.25;

async fn make_clip(dir: &Path, name: &str, size: &str, secs: f64, with_audio: bool) -> PathBuf {
    let path = dir.join(name);
    let mut cmd = FfmpegCommand::new(&path).lavfi(format!(
        "testsrc2=size={size}:rate=24:duration={secs}"
    ));
    if with_audio {
        cmd = cmd
            .lavfi(format!("sine=frequency=330:sample_rate=44100:duration={secs}"))
            .map("0:v:0")
            .map("1:a:0")
            .audio_codec("aac");
    }
    let cmd = cmd
        .video_codec("libx264")
        .output_args(["-pix_fmt", "yuv420p"]);
    FfmpegRunner::new().with_timeout(60).run(&cmd).await.unwrap();
    path
}

async fn make_tone(dir: &Path, name: &str, secs: f64) -> PathBuf {
    let path = dir.join(name);
    let cmd = FfmpegCommand::new(&path)
        .lavfi(format!("sine=frequency=220:sample_rate=48000:duration={secs}"));
    FfmpegRunner::new().with_timeout(60).run(&cmd).await.unwrap();
    path
}

/// Returns the same pre-rendered audio for every request.
struct CannedSpeech {
    audio: Vec<u8>,
}

#[async_trait]
impl SpeechSynthesizer for CannedSpeech {
    async fn synthesize(&self, request: &SpeechRequest) -> ServiceResult<Vec<u8>> {
        assert!(!request.text.is_empty());
        Ok(self.audio.clone())
    }

    fn default_model(&self) -> &str {
        "canned"
    }
}

fn shot(path: PathBuf, tension: Option<f64>, energy: Option<f64>) -> AssemblyShot {
    AssemblyShot::new(path).with_levels(energy, tension)
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_assembly_duration_matches_transition_arithmetic() {
    let dir = TempDir::new().unwrap();
    let src = dir.path();

    let a = make_clip(src, "a.mp4", "640x360", 4.0, true).await;
    let b = make_clip(src, "b.mp4", "640x360", 4.0, true).await;
    let c = make_clip(src, "c.mp4", "480x480", 4.0, true).await;
    let d = make_clip(src, "d.mp4", "640x360", 4.0, true).await;
    let e = make_clip(src, "e.mp4", "640x360", 4.0, false).await;
    let music = make_tone(src, "music.wav", 30.0).await;
    let voice = make_tone(src, "voice.wav", 2.0).await;

    let mut continuation = shot(e, Some(0.75), Some(0.5));
    continuation.skip_transition = true;
    let shots = vec![
        shot(a, Some(0.8), Some(0.5)),
        shot(b, Some(0.2), Some(0.5)),
        shot(c, Some(0.7), Some(0.5)),
        shot(d, Some(0.75), Some(0.5)),
        continuation,
    ];

    let decisions = plan_transitions(&shots);
    assert_eq!(
        decisions,
        vec![
            TransitionDecision::CrossfadeLong,
            TransitionDecision::Black,
            TransitionDecision::HardCut,
            TransitionDecision::Cut,
        ]
    );

    let mut speech = AudioLayer::speech("Hold the light steady.", "keeper").starting_at(1.5);
    if let AudioSource::Speech { delivery, .. } = &mut speech.source {
        *delivery = SpeechDelivery {
            mood: Some(Mood::Angry),
            tension: Some(0.9),
            energy: Some(0.8),
        };
    }

    let request = AssemblyRequest {
        shots,
        overlays: vec![TextOverlay {
            text: "Chapter One: The Keeper's Night".to_string(),
            start: 0.5,
            duration: 3.0,
            position: OverlayPosition::Bottom,
        }],
        audio_layers: vec![
            AudioLayer::file(AudioLayerType::Music, &music).with_volume(0.3),
            speech,
        ],
        volume: 0.8,
        output: src.join("out").join("reel.mp4"),
    };

    let engine = AssemblyEngine::new(
        FfmpegRunner::new().with_timeout(300),
        EncodingConfig::default().with_crf(28),
        src.join("scratch"),
    )
    .with_text_style(TextStyle::default().with_font_size(48))
    .with_speech(Arc::new(CannedSpeech {
        audio: std::fs::read(&voice).unwrap(),
    }));

    let output = engine.assemble(&request).await.unwrap();

    let expected = expected_duration(&[4.0; 5], &decisions);
    assert!((expected - 19.9).abs() < 1e-9);
    assert!(
        (output.duration - expected).abs() < TOLERANCE_SECS,
        "got {}, expected {}",
        output.duration,
        expected
    );
    assert_eq!(output.shot_count, 5);

    let info = probe_video(&output.path).await.unwrap();
    assert_eq!((info.width, info.height), (1920, 1080));
    assert!(info.has_audio);
    assert!((info.fps - 30.0).abs() < 0.01);

    let leftovers = std::fs::read_dir(src.join("scratch")).unwrap().count();
    assert_eq!(leftovers, 0);
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_portrait_first_clip_sets_orientation() {
    let dir = TempDir::new().unwrap();
    let src = dir.path();

    let tall = make_clip(src, "tall.mp4", "360x640", 4.0, false).await;
    let wide = make_clip(src, "wide.mp4", "640x360", 4.0, true).await;
    let shots = vec![
        shot(tall, None, Some(0.5)),
        shot(wide, None, Some(0.55)),
    ];
    assert_eq!(plan_transitions(&shots), vec![TransitionDecision::Crossfade]);

    let request = AssemblyRequest {
        shots,
        overlays: Vec::new(),
        audio_layers: Vec::new(),
        volume: 1.0,
        output: src.join("portrait.mp4"),
    };
    let engine = AssemblyEngine::new(
        FfmpegRunner::new().with_timeout(300),
        EncodingConfig::default().with_crf(28),
        src.join("scratch"),
    );

    let output = engine.assemble(&request).await.unwrap();

    assert!((output.duration - 7.75).abs() < TOLERANCE_SECS, "{}", output.duration);
    let info = probe_video(&output.path).await.unwrap();
    assert_eq!((info.width, info.height), (1080, 1920));
}
