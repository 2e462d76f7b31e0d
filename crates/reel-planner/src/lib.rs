//! Pure planning logic for the ShotReel pipeline.
//!
//! This crate provides:
//! - Spoken-duration estimation and snapping to allowed generation durations
//! - Splitting dialogue-heavy shots into chained takes
//! - Mood-aware transition selection between adjacent clips
//!
//! Nothing here performs I/O; identical inputs always give identical plans.

pub mod duration;
pub mod takes;
pub mod transition;

pub use duration::{
    estimate_spoken_duration, fits_allowed_duration, select_allowed_duration, word_count,
    ESTABLISHMENT_BUFFER, MAX_SINGLE_DURATION, SPEAKER_CHANGE_PAUSE, WORDS_PER_MINUTE,
};
pub use takes::plan_takes;
pub use transition::{
    expected_duration, plan_transitions, resolve_transition, select_transition,
    TransitionInput,
};
