//! Splitting dialogue-heavy shots into chained takes.
//!
//! A generation request is capped at [`MAX_SINGLE_DURATION`] seconds. When a
//! shot's dialogue cannot be spoken inside that window (plus the
//! establishment buffer), its lines are partitioned greedily into takes that
//! are generated one after another and later joined with plain cuts.

use reel_models::{DialogueLine, Shot, Take, TakeChain};
use tracing::{debug, warn};

use crate::duration::{
    estimate_spoken_duration, fits_allowed_duration, line_duration, select_allowed_duration,
    ESTABLISHMENT_BUFFER, EPSILON, MAX_SINGLE_DURATION, SPEAKER_CHANGE_PAUSE,
};

/// Fraction of take capacity after which a speaker change closes the take.
pub const PREFERRED_BREAK_RATIO: f64 = 0.6;

const CONTINUITY_SUFFIX: &str = "Maintain visual continuity with the previous take.";

/// Spoken-time capacity of one take.
pub fn take_capacity() -> f64 {
    MAX_SINGLE_DURATION - ESTABLISHMENT_BUFFER
}

/// Plan the takes for `shot`.
///
/// Returns `None` when the shot has no dialogue or when the whole dialogue
/// fits in one generation, in which case the shot is submitted unsplit.
pub fn plan_takes(shot: &Shot) -> Option<TakeChain> {
    if !shot.has_dialogue() {
        return None;
    }

    let total = estimate_spoken_duration(&shot.dialogue);
    let ceiling = shot.duration_target.min(MAX_SINGLE_DURATION);
    if total + ESTABLISHMENT_BUFFER <= ceiling + EPSILON {
        debug!(
            shot_id = %shot.id,
            spoken_seconds = total,
            ceiling,
            "Dialogue fits in a single generation"
        );
        return None;
    }

    let partitions = partition_dialogue(&shot.dialogue);
    if partitions.len() <= 1 {
        debug!(shot_id = %shot.id, "Dialogue did not split, keeping single generation");
        return None;
    }

    let count = partitions.len();
    let takes: Vec<Take> = partitions
        .into_iter()
        .enumerate()
        .map(|(index, lines)| build_take(shot, index, count, lines))
        .collect();

    debug!(
        shot_id = %shot.id,
        takes = takes.len(),
        spoken_seconds = total,
        "Planned take chain"
    );

    Some(TakeChain::new(shot.id.clone(), takes))
}

/// Greedy partition of `lines` into groups of at most [`take_capacity`]
/// spoken seconds, preferring to break on a speaker change once a group is
/// reasonably full. A single over-long line still forms its own group.
fn partition_dialogue(lines: &[DialogueLine]) -> Vec<&[DialogueLine]> {
    let capacity = take_capacity();
    let preferred = capacity * PREFERRED_BREAK_RATIO;

    let mut partitions = Vec::new();
    let mut start = 0;
    let mut current = 0.0;

    for (i, line) in lines.iter().enumerate() {
        let secs = line_duration(line);
        let pause = if i > start && lines[i - 1].speaker != line.speaker {
            SPEAKER_CHANGE_PAUSE
        } else {
            0.0
        };
        let projected = current + secs + pause;

        if i > start && projected > capacity + EPSILON {
            partitions.push(&lines[start..i]);
            start = i;
            current = secs;
        } else {
            current = projected;
        }

        if let Some(next) = lines.get(i + 1) {
            if current + EPSILON >= preferred && next.speaker != line.speaker {
                partitions.push(&lines[start..=i]);
                start = i + 1;
                current = 0.0;
            }
        }
    }

    if start < lines.len() {
        partitions.push(&lines[start..]);
    }
    partitions
}

fn build_take(shot: &Shot, index: usize, count: usize, lines: &[DialogueLine]) -> Take {
    let estimated = estimate_spoken_duration(lines);
    let needed = estimated + ESTABLISHMENT_BUFFER;
    let over_capacity = !fits_allowed_duration(needed);
    if over_capacity {
        warn!(
            shot_id = %shot.id,
            take_index = index,
            needed_seconds = needed,
            max_seconds = MAX_SINGLE_DURATION,
            "Take exceeds the longest generation; dialogue will be clipped"
        );
    }

    let mut take = Take {
        index,
        lines: lines.to_vec(),
        estimated_duration: estimated,
        duration: select_allowed_duration(needed),
        action_hint: String::new(),
        is_first: index == 0,
        is_last: index + 1 == count,
        over_capacity,
    };
    take.action_hint = action_hint(&shot.description, &take);
    take
}

fn action_hint(description: &str, take: &Take) -> String {
    let speakers = take.speakers().join(" and ");
    let action = if take.is_first {
        format!("{speakers} begins speaking.")
    } else if take.is_last {
        format!("{speakers} concludes the dialogue. {CONTINUITY_SUFFIX}")
    } else {
        format!("{speakers} continues the conversation. {CONTINUITY_SUFFIX}")
    };

    let description = description.trim();
    if description.is_empty() {
        action
    } else {
        format!("{description} {action}")
    }
}
