//! Video encoding configuration and normalization targets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Highest CRF libx264 accepts.
pub const MAX_CRF: u8 = 51;

/// Common frame rate every clip is normalized to
pub const NORMALIZED_FPS: u32 = 30;
/// Common pixel format
pub const NORMALIZED_PIXEL_FORMAT: &str = "yuv420p";
/// Common audio sample rate
pub const NORMALIZED_SAMPLE_RATE: u32 = 48_000;
/// Common audio channel count
pub const NORMALIZED_CHANNELS: u32 = 2;

/// Landscape output resolution
pub const LANDSCAPE_WIDTH: u32 = 1920;
pub const LANDSCAPE_HEIGHT: u32 = 1080;

/// Encoder settings shared by every assembly stage.
///
/// Each stage re-encodes, so the same settings apply from normalization to
/// the final mix and generation loss stays uniform across the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct EncodingConfig {
    /// Video encoder, e.g. `libx264`
    pub codec: String,
    /// x264 preset
    pub preset: String,
    /// Constant Rate Factor, 0-51, lower is better
    pub crf: u8,
    pub audio_codec: String,
    pub audio_bitrate: String,
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self {
            codec: "libx264".to_string(),
            preset: "fast".to_string(),
            crf: 18,
            audio_codec: "aac".to_string(),
            audio_bitrate: "192k".to_string(),
        }
    }
}

impl EncodingConfig {
    /// Override quality; values above [`MAX_CRF`] are clamped.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf.min(MAX_CRF);
        self
    }

    /// Video-only encoder arguments.
    pub fn video_args(&self) -> Vec<String> {
        let crf = self.crf.to_string();
        ["-c:v", self.codec.as_str(), "-preset", self.preset.as_str(), "-crf", crf.as_str()]
            .map(String::from)
            .to_vec()
    }

    /// Audio-only encoder arguments.
    pub fn audio_args(&self) -> Vec<String> {
        ["-c:a", self.audio_codec.as_str(), "-b:a", self.audio_bitrate.as_str()]
            .map(String::from)
            .to_vec()
    }

    /// Both streams, with the index moved to the front for streaming.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = self.video_args();
        args.extend(self.audio_args());
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
        args
    }
}
