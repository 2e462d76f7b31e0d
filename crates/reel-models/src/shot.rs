//! Shot and dialogue definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

use crate::error::{ModelError, ModelResult};
use crate::job::JobId;
use crate::mood::Mood;

/// One spoken line. Lines keep their order within a shot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct DialogueLine {
    /// Speaker (character) id
    #[validate(length(min = 1))]
    pub speaker: String,

    /// Literal line text
    pub text: String,

    /// Per-line mood override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<Mood>,
}

impl DialogueLine {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            text: text.into(),
            mood: None,
        }
    }
}

/// Generation jobs attached to a shot by the execution stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShotJobs {
    /// First job of the shot, for consumers that only track one id
    pub primary: JobId,

    /// Every job of the shot in playback order
    pub job_ids: Vec<JobId>,
}

impl ShotJobs {
    pub fn single(id: JobId) -> Self {
        Self {
            primary: id.clone(),
            job_ids: vec![id],
        }
    }

    pub fn is_chain(&self) -> bool {
        self.job_ids.len() > 1
    }
}

/// A narrative shot. Produced upstream and read-only here, except for `jobs`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Shot {
    #[validate(length(min = 1))]
    pub id: String,

    /// Visual/action description used as the generation prompt
    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub energy: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 0.0, max = 1.0))]
    pub tension: Option<f64>,

    pub mood: Mood,

    /// Target duration in seconds
    #[validate(range(exclusive_min = 0.0))]
    pub duration_target: f64,

    #[serde(default)]
    #[validate(nested)]
    pub dialogue: Vec<DialogueLine>,

    /// Opaque character references
    #[serde(default)]
    pub characters: Vec<String>,

    /// Opaque environment reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<String>,

    /// Reference image supplied as the first frame of the first generation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_image: Option<PathBuf>,

    /// Jobs attached by the execution stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<ShotJobs>,
}

impl Shot {
    pub fn new(id: impl Into<String>, mood: Mood, duration_target: f64) -> Self {
        Self {
            id: id.into(),
            description: String::new(),
            energy: None,
            tension: None,
            mood,
            duration_target,
            dialogue: Vec::new(),
            characters: Vec::new(),
            environment: None,
            reference_image: None,
            jobs: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_energy(mut self, energy: f64) -> Self {
        self.energy = Some(energy);
        self
    }

    pub fn with_tension(mut self, tension: f64) -> Self {
        self.tension = Some(tension);
        self
    }

    pub fn with_dialogue(mut self, dialogue: Vec<DialogueLine>) -> Self {
        self.dialogue = dialogue;
        self
    }

    pub fn with_reference_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.reference_image = Some(path.into());
        self
    }

    pub fn has_dialogue(&self) -> bool {
        !self.dialogue.is_empty()
    }

    /// Check ranges and required fields.
    pub fn validated(&self) -> ModelResult<()> {
        self.validate()?;
        // Range checks let NaN through.
        let levels = [Some(self.duration_target), self.energy, self.tension];
        if levels.iter().flatten().any(|v| !v.is_finite()) {
            return Err(ModelError::invalid_input(format!(
                "shot {} has a non-finite duration or level",
                self.id
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shot_validation_ranges() {
        let ok = Shot::new("s1", Mood::Calm, 6.0).with_energy(0.4).with_tension(0.9);
        assert!(ok.validated().is_ok());

        let bad_energy = Shot::new("s1", Mood::Calm, 6.0).with_energy(1.4);
        assert!(bad_energy.validated().is_err());

        let bad_duration = Shot::new("s1", Mood::Calm, 0.0);
        assert!(bad_duration.validated().is_err());

        let empty_id = Shot::new("", Mood::Calm, 4.0);
        assert!(empty_id.validated().is_err());

        let nan_tension = Shot::new("s1", Mood::Calm, 4.0).with_tension(f64::NAN);
        assert!(matches!(
            nan_tension.validated(),
            Err(ModelError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_dialogue_speaker_required() {
        let shot = Shot::new("s1", Mood::Tense, 8.0)
            .with_dialogue(vec![DialogueLine::new("", "hello there")]);
        assert!(shot.validated().is_err());
    }

    #[test]
    fn test_shot_deserializes_with_defaults() {
        let shot: Shot = serde_json::from_str(
            r#"{"id":"s7","mood":"ominous","duration_target":6,"tension":0.7}"#,
        )
        .unwrap();
        assert_eq!(shot.mood, Mood::Ominous);
        assert_eq!(shot.tension, Some(0.7));
        assert!(shot.energy.is_none());
        assert!(shot.dialogue.is_empty());
        assert!(shot.jobs.is_none());
    }

    #[test]
    fn test_shot_jobs_single() {
        let id = JobId::new();
        let jobs = ShotJobs::single(id.clone());
        assert_eq!(jobs.primary, id);
        assert!(!jobs.is_chain());
    }
}
