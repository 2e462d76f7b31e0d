//! Shot mood vocabulary.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ModelError;

/// The fixed 16-term mood vocabulary a shot is tagged with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Mood {
    Calm,
    Serene,
    Joyful,
    Playful,
    Hopeful,
    Romantic,
    Nostalgic,
    Melancholic,
    Somber,
    Mysterious,
    Anxious,
    Tense,
    Ominous,
    Angry,
    Dramatic,
    Triumphant,
}

impl Mood {
    /// Every mood in the vocabulary, in declaration order.
    pub const ALL: &'static [Mood] = &[
        Mood::Calm,
        Mood::Serene,
        Mood::Joyful,
        Mood::Playful,
        Mood::Hopeful,
        Mood::Romantic,
        Mood::Nostalgic,
        Mood::Melancholic,
        Mood::Somber,
        Mood::Mysterious,
        Mood::Anxious,
        Mood::Tense,
        Mood::Ominous,
        Mood::Angry,
        Mood::Dramatic,
        Mood::Triumphant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Calm => "calm",
            Mood::Serene => "serene",
            Mood::Joyful => "joyful",
            Mood::Playful => "playful",
            Mood::Hopeful => "hopeful",
            Mood::Romantic => "romantic",
            Mood::Nostalgic => "nostalgic",
            Mood::Melancholic => "melancholic",
            Mood::Somber => "somber",
            Mood::Mysterious => "mysterious",
            Mood::Anxious => "anxious",
            Mood::Tense => "tense",
            Mood::Ominous => "ominous",
            Mood::Angry => "angry",
            Mood::Dramatic => "dramatic",
            Mood::Triumphant => "triumphant",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mood {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_lowercase();
        Mood::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| ModelError::UnknownMood(s.to_string()))
    }
}
