//! FFprobe video information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult, Tool};

/// Frame rate assumed when a stream reports neither average nor base rate.
const FALLBACK_FPS: f64 = 30.0;

/// What assembly needs to know about one clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    /// Container duration in seconds; 0 when unknown
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    /// At least one audio stream present
    pub has_audio: bool,
}

impl VideoInfo {
    /// Taller than wide.
    pub fn is_portrait(&self) -> bool {
        self.height > self.width
    }
}

#[derive(Debug, Deserialize)]
struct ProbeReport {
    #[serde(default)]
    format: ProbeFormat,
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

impl ProbeStream {
    /// Average rate first; variable-rate files often report `0/0` there.
    fn fps(&self) -> f64 {
        [&self.avg_frame_rate, &self.r_frame_rate]
            .into_iter()
            .flatten()
            .find_map(|r| rational(r))
            .unwrap_or(FALLBACK_FPS)
    }
}

impl ProbeReport {
    fn into_info(self) -> MediaResult<VideoInfo> {
        let has_audio = self.streams.iter().any(|s| s.codec_type == "audio");
        let video = self
            .streams
            .into_iter()
            .find(|s| s.codec_type == "video")
            .ok_or(MediaError::NoVideoStream)?;

        Ok(VideoInfo {
            duration: self
                .format
                .duration
                .and_then(|d| d.parse().ok())
                .unwrap_or(0.0),
            width: video.width.unwrap_or(0),
            height: video.height.unwrap_or(0),
            fps: video.fps(),
            codec: video.codec_name.clone().unwrap_or_default(),
            has_audio,
        })
    }
}

/// Probe `path` with ffprobe.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<VideoInfo> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    check_ffprobe()?;

    let output = Command::new(Tool::Ffprobe.binary())
        .args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        return Err(MediaError::failed(
            Tool::Ffprobe,
            format!("could not read {}", path.display()),
            (!stderr.is_empty()).then_some(stderr),
            output.status.code(),
        ));
    }

    serde_json::from_slice::<ProbeReport>(&output.stdout)?.into_info()
}

/// Duration of `path` in seconds.
pub async fn get_duration(path: impl AsRef<Path>) -> MediaResult<f64> {
    Ok(probe_video(path).await?.duration)
}

/// `"30000/1001"` or `"29.97"`; `None` for zero denominators and garbage.
fn rational(s: &str) -> Option<f64> {
    match s.split_once('/') {
        Some((num, den)) => {
            let den: f64 = den.parse().ok()?;
            (den > 0.0).then_some(num.parse::<f64>().ok()? / den)
        }
        None => s.parse().ok(),
    }
}
