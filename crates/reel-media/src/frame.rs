//! Still-frame extraction for take continuity.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::fs_utils::{ensure_parent_dir, is_non_empty_file};

/// How far before the end decoding starts; the last decoded frame wins.
const LAST_FRAME_WINDOW_SECS: f64 = 0.5;

/// Command writing the final frame of `video` to `output` as an image.
pub fn last_frame_command(video: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(output)
        .seek_from_end(LAST_FRAME_WINDOW_SECS)
        .input(video)
        .output_args(["-update", "1", "-q:v", "2"])
}

/// Extract the last frame of `video` into `output`.
///
/// Fails if FFmpeg fails or produces no image.
pub async fn extract_last_frame(
    runner: &FfmpegRunner,
    video: &Path,
    output: &Path,
) -> MediaResult<()> {
    if !video.exists() {
        return Err(MediaError::FileNotFound(video.to_path_buf()));
    }
    ensure_parent_dir(output).await?;

    runner.run(&last_frame_command(video, output)).await?;

    if !is_non_empty_file(output).await {
        return Err(MediaError::EmptyOutput(output.to_path_buf()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_last_frame_command() {
        let args = last_frame_command(Path::new("take_0.mp4"), Path::new("take_0_last.png"))
            .build_args();
        let sseof = args.iter().position(|a| a == "-sseof").unwrap();
        let input = args.iter().position(|a| a == "take_0.mp4").unwrap();
        assert!(sseof < input);
        assert_eq!(args[sseof + 1], "-0.500");
        assert!(args.contains(&"-update".to_string()));
        assert_eq!(args.last().unwrap(), "take_0_last.png");
    }

    #[tokio::test]
    async fn test_missing_video_is_reported_before_running() {
        let err = extract_last_frame(
            &FfmpegRunner::new(),
            Path::new("/nonexistent/take.mp4"),
            Path::new("/tmp/unused.png"),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, MediaError::FileNotFound(_)));
    }
}
