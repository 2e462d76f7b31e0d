//! Spoken-duration arithmetic.

use reel_models::{DialogueLine, GenerationDuration};

/// Fixed speaking rate used for all estimates.
pub const WORDS_PER_MINUTE: f64 = 150.0;

/// Silence inserted whenever the speaker changes between adjacent lines (seconds).
pub const SPEAKER_CHANGE_PAUSE: f64 = 0.5;

/// Time reserved at the start of every generation before anyone speaks (seconds).
pub const ESTABLISHMENT_BUFFER: f64 = 1.0;

/// Longest single generation the service accepts (seconds).
pub const MAX_SINGLE_DURATION: f64 = 8.0;

/// Float comparisons against duration thresholds use this tolerance.
pub(crate) const EPSILON: f64 = 1e-9;

/// Number of whitespace-separated words.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Spoken duration of a single line, ignoring pauses.
pub fn line_duration(line: &DialogueLine) -> f64 {
    word_count(&line.text) as f64 / WORDS_PER_MINUTE * 60.0
}

/// Number of adjacent line pairs with different speakers.
pub fn speaker_changes(lines: &[DialogueLine]) -> usize {
    lines
        .windows(2)
        .filter(|pair| pair[0].speaker != pair[1].speaker)
        .count()
}

/// Estimated time to speak `lines` in order, including speaker-change pauses.
pub fn estimate_spoken_duration(lines: &[DialogueLine]) -> f64 {
    let speech: f64 = lines.iter().map(line_duration).sum();
    speech + SPEAKER_CHANGE_PAUSE * speaker_changes(lines) as f64
}

/// Smallest allowed generation duration that covers `needed_seconds`.
///
/// Requests above the longest allowed value get the longest value; use
/// [`fits_allowed_duration`] to detect that case.
pub fn select_allowed_duration(needed_seconds: f64) -> GenerationDuration {
    GenerationDuration::ALL
        .iter()
        .copied()
        .find(|d| d.as_secs_f64() + EPSILON >= needed_seconds)
        .unwrap_or(GenerationDuration::MAX)
}

/// Whether `needed_seconds` fits in a single generation.
pub fn fits_allowed_duration(needed_seconds: f64) -> bool {
    needed_seconds <= GenerationDuration::MAX.as_secs_f64() + EPSILON
}
