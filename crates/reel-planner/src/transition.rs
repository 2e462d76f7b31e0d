//! Mood-aware transition selection between adjacent clips.

use reel_models::{AssemblyShot, Shot, TransitionDecision};
use serde::{Deserialize, Serialize};

use crate::duration::EPSILON;

/// Tension change treated as a large narrative shift.
pub const LARGE_SHIFT: f64 = 0.4;
/// Tension below this is "low".
pub const LOW_TENSION: f64 = 0.3;
/// Tension at or above this is "high".
pub const HIGH_TENSION: f64 = 0.6;
/// Energy changes below this are "small".
pub const SMALL_ENERGY_CHANGE: f64 = 0.2;

/// Overlap of a short cross-dissolve (seconds).
pub const CROSSFADE_SECS: f64 = 0.25;
/// Overlap of a long cross-dissolve (seconds).
pub const CROSSFADE_LONG_SECS: f64 = 0.5;
/// Length of the blank clip inserted by a `black` transition (seconds).
pub const BLACK_GAP_SECS: f64 = 0.5;
/// Tail trimmed from the outgoing clip by a `hard_cut` (seconds).
pub const HARD_CUT_TRIM_SECS: f64 = 0.1;

/// The narrative levels transition selection looks at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TransitionInput {
    pub tension: Option<f64>,
    pub energy: Option<f64>,
}

impl TransitionInput {
    pub fn new(tension: Option<f64>, energy: Option<f64>) -> Self {
        Self { tension, energy }
    }
}

impl From<&Shot> for TransitionInput {
    fn from(shot: &Shot) -> Self {
        Self::new(shot.tension, shot.energy)
    }
}

impl From<&AssemblyShot> for TransitionInput {
    fn from(shot: &AssemblyShot) -> Self {
        Self::new(shot.tension, shot.energy)
    }
}

/// Choose how `curr` is joined to the clip before it.
///
/// Tension rules take priority over energy rules; the first matching rule
/// wins. The first clip of a sequence always gets a plain cut. Every
/// threshold is compared with 1e-9 slack, so a value nominally on a boundary
/// lands on the same side whatever its rounding.
pub fn select_transition(
    prev: Option<TransitionInput>,
    curr: TransitionInput,
) -> TransitionDecision {
    let Some(prev) = prev else {
        return TransitionDecision::Cut;
    };

    if let (Some(before), Some(after)) = (prev.tension, curr.tension) {
        let delta = after - before;
        if delta <= -LARGE_SHIFT + EPSILON && after < LOW_TENSION - EPSILON {
            return TransitionDecision::CrossfadeLong;
        }
        if delta >= LARGE_SHIFT - EPSILON && before < LOW_TENSION - EPSILON {
            return TransitionDecision::Black;
        }
        if before >= HIGH_TENSION - EPSILON && after >= HIGH_TENSION - EPSILON {
            return TransitionDecision::HardCut;
        }
    }

    match (prev.energy, curr.energy) {
        (Some(before), Some(after)) => {
            let delta = after - before;
            if delta <= -LARGE_SHIFT + EPSILON {
                TransitionDecision::Black
            } else if delta >= LARGE_SHIFT - EPSILON {
                TransitionDecision::HardCut
            } else if delta.abs() < SMALL_ENERGY_CHANGE - EPSILON {
                TransitionDecision::Crossfade
            } else {
                TransitionDecision::Cut
            }
        }
        _ => TransitionDecision::Cut,
    }
}

/// Transition into `curr`, honoring the chain override: takes after the first
/// in a chain are always joined with a plain cut.
pub fn resolve_transition(prev: Option<&AssemblyShot>, curr: &AssemblyShot) -> TransitionDecision {
    if curr.skip_transition {
        return TransitionDecision::Cut;
    }
    select_transition(prev.map(TransitionInput::from), TransitionInput::from(curr))
}

/// One decision per adjacent pair; `result[i]` joins `shots[i]` to `shots[i + 1]`.
pub fn plan_transitions(shots: &[AssemblyShot]) -> Vec<TransitionDecision> {
    shots
        .windows(2)
        .map(|pair| resolve_transition(Some(&pair[0]), &pair[1]))
        .collect()
}

/// Change in running time a transition causes (seconds).
pub fn duration_delta(decision: TransitionDecision) -> f64 {
    match decision {
        TransitionDecision::Cut => 0.0,
        TransitionDecision::HardCut => -HARD_CUT_TRIM_SECS,
        TransitionDecision::Crossfade => -CROSSFADE_SECS,
        TransitionDecision::CrossfadeLong => -CROSSFADE_LONG_SECS,
        TransitionDecision::Black => BLACK_GAP_SECS,
    }
}

/// Expected length of the assembled video for clip `durations` joined by
/// `decisions` (one per adjacent pair).
pub fn expected_duration(durations: &[f64], decisions: &[TransitionDecision]) -> f64 {
    let clips: f64 = durations.iter().sum();
    let joins: f64 = decisions.iter().copied().map(duration_delta).sum();
    clips + joins
}
