//! Five-bucket categorisation of the 0–1 tension and energy axes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Coarse intensity bucket for a 0–1 narrative axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntensityLevel {
    VeryLow,
    Low,
    #[default]
    Medium,
    High,
    VeryHigh,
}

impl IntensityLevel {
    /// Bucket a value in [0, 1]. Values outside the range land in the outer buckets.
    pub fn from_value(value: f64) -> Self {
        if value < 0.2 {
            IntensityLevel::VeryLow
        } else if value < 0.4 {
            IntensityLevel::Low
        } else if value < 0.6 {
            IntensityLevel::Medium
        } else if value < 0.8 {
            IntensityLevel::High
        } else {
            IntensityLevel::VeryHigh
        }
    }

    /// Bucket an optional value; absent values are treated as medium.
    pub fn from_optional(value: Option<f64>) -> Self {
        value.map(Self::from_value).unwrap_or_default()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityLevel::VeryLow => "very_low",
            IntensityLevel::Low => "low",
            IntensityLevel::Medium => "medium",
            IntensityLevel::High => "high",
            IntensityLevel::VeryHigh => "very_high",
        }
    }
}

impl fmt::Display for IntensityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
