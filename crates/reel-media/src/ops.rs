//! Typed FFmpeg invocations used by assembly.
//!
//! Every function here only builds a command; running it is up to the caller's
//! [`FfmpegRunner`](crate::FfmpegRunner), which owns timeout and diagnostics.

use std::path::{Path, PathBuf};

use reel_models::encoding::{
    LANDSCAPE_HEIGHT, LANDSCAPE_WIDTH, NORMALIZED_CHANNELS, NORMALIZED_FPS,
    NORMALIZED_PIXEL_FORMAT, NORMALIZED_SAMPLE_RATE,
};
use reel_models::EncodingConfig;

use crate::audio::{atempo_filter, mix_filter_graph, MixInput};
use crate::command::FfmpegCommand;
use crate::probe::VideoInfo;

/// Resolution every clip is scaled and padded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeTarget {
    pub width: u32,
    pub height: u32,
}

impl NormalizeTarget {
    pub fn landscape() -> Self {
        Self {
            width: LANDSCAPE_WIDTH,
            height: LANDSCAPE_HEIGHT,
        }
    }

    pub fn portrait() -> Self {
        Self {
            width: LANDSCAPE_HEIGHT,
            height: LANDSCAPE_WIDTH,
        }
    }

    /// Orientation follows the reference clip (the first clip of a sequence).
    pub fn for_reference(info: &VideoInfo) -> Self {
        if info.is_portrait() {
            Self::portrait()
        } else {
            Self::landscape()
        }
    }

    pub fn size(&self) -> String {
        format!("{}x{}", self.width, self.height)
    }
}

fn silent_audio_source() -> String {
    let layout = if NORMALIZED_CHANNELS == 1 { "mono" } else { "stereo" };
    format!("anullsrc=channel_layout={layout}:sample_rate={NORMALIZED_SAMPLE_RATE}")
}

fn audio_format_args() -> [String; 4] {
    [
        "-ar".to_string(),
        NORMALIZED_SAMPLE_RATE.to_string(),
        "-ac".to_string(),
        NORMALIZED_CHANNELS.to_string(),
    ]
}

/// Video filter scaling into `target` with letterboxing and a fixed frame rate.
pub fn normalize_video_filter(target: NormalizeTarget) -> String {
    let (w, h) = (target.width, target.height);
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,\
         pad={w}:{h}:(ow-iw)/2:(oh-ih)/2:color=black,\
         setsar=1,fps={NORMALIZED_FPS},format={NORMALIZED_PIXEL_FORMAT}"
    )
}

/// Re-encode `input` to the common format. Clips without audio get a silent
/// track so every normalized clip has exactly one video and one audio stream.
pub fn normalize_command(
    input: &Path,
    output: &Path,
    target: NormalizeTarget,
    has_audio: bool,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(output).input(input);
    cmd = if has_audio {
        cmd.map("0:v:0").map("0:a:0")
    } else {
        cmd.lavfi(silent_audio_source())
            .map("0:v:0")
            .map("1:a:0")
            .shortest()
    };
    cmd.video_filter(normalize_video_filter(target))
        .output_args(audio_format_args())
        .encoding(encoding)
}

/// A black, silent clip in the common format.
pub fn black_clip_command(
    output: &Path,
    target: NormalizeTarget,
    seconds: f64,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .lavfi(format!(
            "color=c=black:s={}:r={}:d={:.3}",
            target.size(),
            NORMALIZED_FPS,
            seconds
        ))
        .lavfi(silent_audio_source())
        .map("0:v:0")
        .map("1:a:0")
        .video_filter(format!("setsar=1,format={NORMALIZED_PIXEL_FORMAT}"))
        .output_args(audio_format_args())
        .encoding(encoding)
        .duration(seconds)
}

/// Cross-dissolve `second` into the tail of `first`, overlapping by `fade`
/// seconds. Audio uses an equal-power curve.
pub fn crossfade_command(
    first: &Path,
    first_duration: f64,
    second: &Path,
    fade: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let offset = (first_duration - fade).max(0.0);
    let graph = format!(
        "[0:v][1:v]xfade=transition=fade:duration={fade:.3}:offset={offset:.3},\
         format={NORMALIZED_PIXEL_FORMAT}[v];\
         [0:a][1:a]acrossfade=d={fade:.3}:c1=qsin:c2=qsin[a]"
    );
    FfmpegCommand::new(output)
        .input(first)
        .input(second)
        .filter_complex(graph)
        .map("[v]")
        .map("[a]")
        .output_args(audio_format_args())
        .encoding(encoding)
}

/// Keep only the first `keep_seconds` of `input`.
pub fn trim_command(
    input: &Path,
    keep_seconds: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(input)
        .duration(keep_seconds.max(0.0))
        .output_args(audio_format_args())
        .encoding(encoding)
}

/// Concat-demuxer list for `paths`.
pub fn concat_list(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

/// Join identically-encoded clips listed in `list_file` without re-encoding.
pub fn concat_command(list_file: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
        .input(list_file)
        .stream_copy()
}

/// Burn a `drawtext` chain into the video; audio is copied.
pub fn burn_text_command(
    input: &Path,
    filter_chain: &str,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .input(input)
        .video_filter(filter_chain)
        .output_args(encoding.video_args())
        .audio_codec("copy")
}

/// Mix `layers` over the video's own audio; video is copied.
pub fn mix_audio_command(
    video: &Path,
    layers: &[MixInput],
    base_volume: f64,
    total_duration: f64,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let mut cmd = FfmpegCommand::new(output).input(video);
    for layer in layers {
        cmd = cmd.input(&layer.path);
    }
    cmd.filter_complex(mix_filter_graph(layers, base_volume, total_duration))
        .map("0:v:0")
        .map("[aout]")
        .video_codec("copy")
        .output_args(audio_format_args())
        .output_args(encoding.audio_args())
}

/// Change the speaking rate of an audio file, or `None` when `factor` is
/// effectively 1.0.
pub fn tempo_command(input: &Path, factor: f64, output: &Path) -> Option<FfmpegCommand> {
    let filter = atempo_filter(factor)?;
    Some(
        FfmpegCommand::new(output)
            .input(input)
            .audio_filter(filter)
            .output_arg("-vn"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(cmd: &FfmpegCommand) -> Vec<String> {
        cmd.build_args()
    }

    fn value_after(args: &[String], flag: &str) -> String {
        let pos = args.iter().position(|a| a == flag).unwrap();
        args[pos + 1].clone()
    }

    fn info(width: u32, height: u32) -> VideoInfo {
        VideoInfo {
            duration: 6.0,
            width,
            height,
            fps: 24.0,
            codec: "h264".to_string(),
            has_audio: true,
        }
    }

    #[test]
    fn test_target_follows_reference_orientation() {
        assert_eq!(
            NormalizeTarget::for_reference(&info(1080, 1920)),
            NormalizeTarget::portrait()
        );
        assert_eq!(
            NormalizeTarget::for_reference(&info(1280, 720)),
            NormalizeTarget::landscape()
        );
        // square is treated as landscape
        assert_eq!(
            NormalizeTarget::for_reference(&info(1024, 1024)),
            NormalizeTarget::landscape()
        );
    }

    #[test]
    fn test_normalize_with_audio() {
        let cmd = normalize_command(
            Path::new("in.mp4"),
            Path::new("norm.mp4"),
            NormalizeTarget::landscape(),
            true,
            &EncodingConfig::default(),
        );
        let a = args(&cmd);
        assert_eq!(cmd.input_count(), 1);
        let vf = value_after(&a, "-vf");
        assert!(vf.contains("scale=1920:1080:force_original_aspect_ratio=decrease"));
        assert!(vf.contains("pad=1920:1080"));
        assert!(vf.contains("setsar=1"));
        assert!(vf.contains("fps=30"));
        assert!(vf.contains("format=yuv420p"));
        assert_eq!(value_after(&a, "-ar"), "48000");
        assert_eq!(value_after(&a, "-ac"), "2");
        assert!(!a.contains(&"-shortest".to_string()));
    }

    #[test]
    fn test_normalize_adds_silence_when_clip_has_no_audio() {
        let cmd = normalize_command(
            Path::new("in.mp4"),
            Path::new("norm.mp4"),
            NormalizeTarget::portrait(),
            false,
            &EncodingConfig::default(),
        );
        let a = args(&cmd);
        assert_eq!(cmd.input_count(), 2);
        assert!(a.contains(&"anullsrc=channel_layout=stereo:sample_rate=48000".to_string()));
        assert!(a.contains(&"1:a:0".to_string()));
        assert!(a.contains(&"-shortest".to_string()));
        assert!(value_after(&a, "-vf").contains("scale=1080:1920"));
    }

    #[test]
    fn test_black_clip() {
        let a = args(&black_clip_command(
            Path::new("black.mp4"),
            NormalizeTarget::landscape(),
            0.5,
            &EncodingConfig::default(),
        ));
        assert!(a.contains(&"color=c=black:s=1920x1080:r=30:d=0.500".to_string()));
        assert_eq!(value_after(&a, "-t"), "0.500");
    }

    #[test]
    fn test_crossfade_offset_and_curves() {
        let a = args(&crossfade_command(
            Path::new("a.mp4"),
            6.0,
            Path::new("b.mp4"),
            0.5,
            Path::new("x.mp4"),
            &EncodingConfig::default(),
        ));
        let graph = value_after(&a, "-filter_complex");
        assert!(graph.contains("xfade=transition=fade:duration=0.500:offset=5.500"));
        assert!(graph.contains("acrossfade=d=0.500:c1=qsin:c2=qsin"));
        assert!(a.contains(&"[v]".to_string()));
        assert!(a.contains(&"[a]".to_string()));
    }

    #[test]
    fn test_trim() {
        let a = args(&trim_command(
            Path::new("a.mp4"),
            5.9,
            Path::new("t.mp4"),
            &EncodingConfig::default(),
        ));
        assert_eq!(value_after(&a, "-t"), "5.900");
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/w/a.mp4"), PathBuf::from("/w/it's.mp4")]);
        assert_eq!(list, "file '/w/a.mp4'\nfile '/w/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_concat_copies_streams() {
        let a = args(&concat_command(Path::new("list.txt"), Path::new("o.mp4")));
        assert_eq!(value_after(&a, "-f"), "concat");
        assert_eq!(value_after(&a, "-safe"), "0");
        assert_eq!(value_after(&a, "-c"), "copy");
    }

    #[test]
    fn test_mix_audio_inputs_and_maps() {
        let layers = vec![MixInput {
            path: PathBuf::from("music.mp3"),
            delay: 0.0,
            volume: 0.4,
            fade_out: true,
        }];
        let cmd = mix_audio_command(
            Path::new("video.mp4"),
            &layers,
            1.0,
            12.0,
            Path::new("out.mp4"),
            &EncodingConfig::default(),
        );
        let a = args(&cmd);
        assert_eq!(cmd.input_count(), 2);
        assert!(a.contains(&"[aout]".to_string()));
        assert_eq!(value_after(&a, "-c:v"), "copy");
        assert!(value_after(&a, "-filter_complex").contains("normalize=0"));
    }

    #[test]
    fn test_tempo_command() {
        assert!(tempo_command(Path::new("a.mp3"), 1.0, Path::new("b.mp3")).is_none());
        let a = args(&tempo_command(Path::new("a.mp3"), 1.08, Path::new("b.mp3")).unwrap());
        assert_eq!(value_after(&a, "-af"), "atempo=1.0800");
    }
}
