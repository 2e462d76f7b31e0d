//! Assembly inputs: resolved shots, audio layers, text overlays and transitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::mood::Mood;

/// How two adjacent clips are joined. Computed per run, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum TransitionDecision {
    /// Plain concatenation
    Cut,
    /// Concatenation after trimming the outgoing tail
    HardCut,
    /// Short cross-dissolve
    Crossfade,
    /// Long cross-dissolve
    CrossfadeLong,
    /// Blank clip between the two
    Black,
}

impl TransitionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionDecision::Cut => "cut",
            TransitionDecision::HardCut => "hard_cut",
            TransitionDecision::Crossfade => "crossfade",
            TransitionDecision::CrossfadeLong => "crossfade_long",
            TransitionDecision::Black => "black",
        }
    }
}

impl fmt::Display for TransitionDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A clip ready for assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssemblyShot {
    pub path: PathBuf,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub tension: Option<f64>,
    #[serde(default)]
    pub mood: Option<Mood>,
    /// Set for every non-first take of a chain; forces a plain cut
    #[serde(default)]
    pub skip_transition: bool,
}

impl AssemblyShot {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            energy: None,
            tension: None,
            mood: None,
            skip_transition: false,
        }
    }

    pub fn with_levels(mut self, energy: Option<f64>, tension: Option<f64>) -> Self {
        self.energy = energy;
        self.tension = tension;
        self
    }
}

/// Label of an audio layer. Only `Music` changes processing (end fade-out).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AudioLayerType {
    Music,
    Vo,
    Sfx,
    Ambient,
}

/// Narrative context used to derive synthesized voice parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema, Default)]
pub struct SpeechDelivery {
    #[serde(default)]
    pub mood: Option<Mood>,
    #[serde(default)]
    pub tension: Option<f64>,
    #[serde(default)]
    pub energy: Option<f64>,
}

/// Where the samples of an audio layer come from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AudioSource {
    /// Existing audio file
    File { path: PathBuf },
    /// Literal text rendered by the speech-synthesis service
    Speech {
        text: String,
        voice_id: String,
        #[serde(default)]
        delivery: SpeechDelivery,
    },
}

/// One timed audio layer mixed over the assembled video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioLayer {
    #[serde(rename = "type")]
    pub layer_type: AudioLayerType,
    pub source: AudioSource,
    #[serde(default = "default_volume")]
    pub volume: f64,
    /// Start offset in seconds
    #[serde(default)]
    pub start: f64,
}

fn default_volume() -> f64 {
    1.0
}

impl AudioLayer {
    pub fn file(layer_type: AudioLayerType, path: impl Into<PathBuf>) -> Self {
        Self {
            layer_type,
            source: AudioSource::File { path: path.into() },
            volume: default_volume(),
            start: 0.0,
        }
    }

    pub fn speech(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        Self {
            layer_type: AudioLayerType::Vo,
            source: AudioSource::Speech {
                text: text.into(),
                voice_id: voice_id.into(),
                delivery: SpeechDelivery::default(),
            },
            volume: default_volume(),
            start: 0.0,
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn starting_at(mut self, start: f64) -> Self {
        self.start = start;
        self
    }

    pub fn needs_synthesis(&self) -> bool {
        matches!(self.source, AudioSource::Speech { .. })
    }
}

/// Vertical anchor of a text overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverlayPosition {
    Top,
    Center,
    #[default]
    Bottom,
}

/// Text burned onto the assembled video for a time window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TextOverlay {
    pub text: String,
    /// Start time in seconds
    pub start: f64,
    /// Visible duration in seconds
    pub duration: f64,
    #[serde(default)]
    pub position: OverlayPosition,
}

impl TextOverlay {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}
