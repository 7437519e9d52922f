// Breath phase - Which part of a breath the track is in at an instant
// Audio cue collaborators play on phase changes (direction changes)

use serde::{Deserialize, Serialize};

use super::types::{Track, INHALED};

/// Phase of the breath at a point on the track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreathPhase {
    /// Height rising toward fully inhaled
    Inhale,

    /// Holding at fully inhaled
    HoldAfterInhale,

    /// Height falling toward fully exhaled
    Exhale,

    /// Holding at fully exhaled
    HoldAfterExhale,

    /// Past the end of the track (or the track has no breaths)
    Finished,
}

impl BreathPhase {
    /// Human-readable name for cue text
    pub fn display_name(&self) -> &'static str {
        match self {
            BreathPhase::Inhale => "Breathe in",
            BreathPhase::HoldAfterInhale => "Hold",
            BreathPhase::Exhale => "Breathe out",
            BreathPhase::HoldAfterExhale => "Hold",
            BreathPhase::Finished => "Done",
        }
    }

    /// True for the two hold phases
    pub fn is_hold(&self) -> bool {
        matches!(self, BreathPhase::HoldAfterInhale | BreathPhase::HoldAfterExhale)
    }
}

/// Phase of the breath at `t` milliseconds
///
/// Segments are half-open on the left: a vertex belongs to the segment it
/// starts, so the phase flips exactly when the direction changes.
pub fn phase_at(track: &Track, t: f64) -> BreathPhase {
    if t >= track.duration_ms() {
        return BreathPhase::Finished;
    }

    let t = t.max(0.0);
    for (left, right) in track.segments() {
        if left.t <= t && t < right.t {
            return if right.h > left.h {
                BreathPhase::Inhale
            } else if right.h < left.h {
                BreathPhase::Exhale
            } else if left.h >= INHALED {
                BreathPhase::HoldAfterInhale
            } else {
                BreathPhase::HoldAfterExhale
            };
        }
    }

    BreathPhase::Finished
}
