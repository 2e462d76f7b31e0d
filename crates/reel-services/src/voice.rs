//! Voice parameters derived from narrative context.
//!
//! Mood picks a base delivery; tension then steadies or destabilizes the
//! voice and energy sets the pace.

use serde::{Deserialize, Serialize};

use reel_models::{IntensityLevel, Mood, SpeechDelivery};

pub const STABILITY_RANGE: (f64, f64) = (0.1, 1.0);
pub const SPEED_RANGE: (f64, f64) = (0.5, 2.0);
pub const SIMILARITY_RANGE: (f64, f64) = (0.0, 1.0);

/// Delivery settings for one synthesized line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceParameters {
    /// Lower is more expressive
    pub stability: f64,
    /// Closeness to the reference voice
    pub similarity: f64,
    /// Tempo factor applied after synthesis
    pub speed: f64,
}

impl Default for VoiceParameters {
    fn default() -> Self {
        Self {
            stability: 0.5,
            similarity: 0.75,
            speed: 1.0,
        }
    }
}

/// Base `(stability, similarity, speed)` for a mood.
pub fn mood_base(mood: Mood) -> VoiceParameters {
    let (stability, similarity, speed) = match mood {
        Mood::Calm => (0.70, 0.75, 0.95),
        Mood::Serene => (0.75, 0.75, 0.90),
        Mood::Joyful => (0.45, 0.80, 1.08),
        Mood::Playful => (0.40, 0.80, 1.10),
        Mood::Hopeful => (0.55, 0.78, 1.02),
        Mood::Romantic => (0.65, 0.80, 0.92),
        Mood::Nostalgic => (0.65, 0.75, 0.92),
        Mood::Melancholic => (0.70, 0.72, 0.88),
        Mood::Somber => (0.75, 0.70, 0.85),
        Mood::Mysterious => (0.60, 0.75, 0.90),
        Mood::Anxious => (0.35, 0.75, 1.10),
        Mood::Tense => (0.40, 0.78, 1.05),
        Mood::Ominous => (0.65, 0.72, 0.88),
        Mood::Angry => (0.30, 0.80, 1.12),
        Mood::Dramatic => (0.40, 0.82, 1.00),
        Mood::Triumphant => (0.45, 0.85, 1.05),
    };
    VoiceParameters {
        stability,
        similarity,
        speed,
    }
}

fn tension_stability_offset(level: IntensityLevel) -> f64 {
    match level {
        IntensityLevel::VeryLow => 0.15,
        IntensityLevel::Low => 0.05,
        IntensityLevel::Medium => 0.0,
        IntensityLevel::High => -0.10,
        IntensityLevel::VeryHigh => -0.20,
    }
}

fn energy_speed_factor(level: IntensityLevel) -> f64 {
    match level {
        IntensityLevel::VeryLow => 0.85,
        IntensityLevel::Low => 0.93,
        IntensityLevel::Medium => 1.0,
        IntensityLevel::High => 1.08,
        IntensityLevel::VeryHigh => 1.15,
    }
}

fn tension_speed_factor(level: IntensityLevel) -> f64 {
    match level {
        IntensityLevel::VeryHigh => 1.05,
        IntensityLevel::VeryLow => 0.95,
        _ => 1.0,
    }
}

fn clamp(value: f64, (min, max): (f64, f64)) -> f64 {
    value.clamp(min, max)
}

/// Voice parameters for `delivery`. Missing values count as medium; a
/// missing mood uses neutral defaults.
pub fn voice_parameters(delivery: &SpeechDelivery) -> VoiceParameters {
    let base = delivery.mood.map(mood_base).unwrap_or_default();
    let tension = IntensityLevel::from_optional(delivery.tension);
    let energy = IntensityLevel::from_optional(delivery.energy);

    VoiceParameters {
        stability: clamp(
            base.stability + tension_stability_offset(tension),
            STABILITY_RANGE,
        ),
        similarity: clamp(base.similarity, SIMILARITY_RANGE),
        speed: clamp(
            base.speed * energy_speed_factor(energy) * tension_speed_factor(tension),
            SPEED_RANGE,
        ),
    }
}
