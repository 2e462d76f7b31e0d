//! Takes produced by splitting a dialogue-heavy shot.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{ModelError, ModelResult};
use crate::shot::DialogueLine;

/// Durations the video-generation service accepts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum GenerationDuration {
    Four,
    Six,
    Eight,
}

impl GenerationDuration {
    /// All allowed durations, ascending.
    pub const ALL: &'static [GenerationDuration] = &[
        GenerationDuration::Four,
        GenerationDuration::Six,
        GenerationDuration::Eight,
    ];

    /// Longest duration a single generation may have.
    pub const MAX: GenerationDuration = GenerationDuration::Eight;

    pub fn seconds(&self) -> u32 {
        match self {
            GenerationDuration::Four => 4,
            GenerationDuration::Six => 6,
            GenerationDuration::Eight => 8,
        }
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.seconds() as f64
    }
}

impl TryFrom<u32> for GenerationDuration {
    type Error = ModelError;

    fn try_from(value: u32) -> ModelResult<Self> {
        match value {
            4 => Ok(GenerationDuration::Four),
            6 => Ok(GenerationDuration::Six),
            8 => Ok(GenerationDuration::Eight),
            other => Err(ModelError::UnsupportedDuration(other)),
        }
    }
}

impl From<GenerationDuration> for u32 {
    fn from(value: GenerationDuration) -> Self {
        value.seconds()
    }
}

impl JsonSchema for GenerationDuration {
    fn schema_name() -> String {
        "GenerationDuration".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        u32::json_schema(gen)
    }
}

impl fmt::Display for GenerationDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.seconds())
    }
}

/// One bounded-duration generation attempt covering part of a shot's dialogue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Take {
    /// Position in the chain (0-based)
    pub index: usize,

    /// Ordered subset of the shot's dialogue
    pub lines: Vec<DialogueLine>,

    /// Estimated spoken duration of `lines` (seconds)
    pub estimated_duration: f64,

    /// Duration requested from the generation service
    pub duration: GenerationDuration,

    /// Prompt text for this take
    pub action_hint: String,

    pub is_first: bool,
    pub is_last: bool,

    /// Set when the take needs more time than the longest allowed duration
    #[serde(default)]
    pub over_capacity: bool,
}

impl Take {
    /// Distinct speakers of the take, in order of first appearance.
    pub fn speakers(&self) -> Vec<&str> {
        let mut speakers: Vec<&str> = Vec::new();
        for line in &self.lines {
            if !speakers.contains(&line.speaker.as_str()) {
                speakers.push(line.speaker.as_str());
            }
        }
        speakers
    }
}

/// Ordered takes for one shot. Only built when a shot actually splits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TakeChain {
    pub shot_id: String,
    pub takes: Vec<Take>,
}

impl TakeChain {
    pub fn new(shot_id: impl Into<String>, takes: Vec<Take>) -> Self {
        Self {
            shot_id: shot_id.into(),
            takes,
        }
    }

    pub fn len(&self) -> usize {
        self.takes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.takes.is_empty()
    }

    /// Dialogue of every take concatenated in order.
    pub fn dialogue(&self) -> Vec<&DialogueLine> {
        self.takes.iter().flat_map(|t| t.lines.iter()).collect()
    }

    /// Sum of the requested generation durations.
    pub fn total_generation_seconds(&self) -> u32 {
        self.takes.iter().map(|t| t.duration.seconds()).sum()
    }
}
