// Regime types - Requested breathing programs and their compiled form
// Defines regimes, hold positions, boundaries, and the compiled program

use serde::{Deserialize, Serialize};

use crate::track::Track;

/// Milliseconds in one minute
pub const MS_PER_MINUTE: f64 = 60000.0;

/// Where in the breath a hold segment is inserted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HoldPosition {
    /// Hold with full lungs, between inhale and exhale
    PostInhale,

    /// Hold with empty lungs, after the exhale
    PostExhale,
}

impl HoldPosition {
    /// Parse the text token used in regime files
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "postInhale" => Some(HoldPosition::PostInhale),
            "postExhale" => Some(HoldPosition::PostExhale),
            _ => None,
        }
    }

    /// Text token used in regime files
    pub fn as_token(&self) -> &'static str {
        match self {
            HoldPosition::PostInhale => "postInhale",
            HoldPosition::PostExhale => "postExhale",
        }
    }
}

/// A requested breathing program segment
///
/// Regimes are read, never mutated, by the compiler. The boundary schedule
/// hands back the exact requested value even when the realized duration
/// drifted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Regime {
    /// Requested minimum duration in milliseconds
    pub duration_ms: u64,

    /// Breathing rate
    pub breaths_per_minute: u32,

    /// Optional hold segment inside each breath
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hold_pos: Option<HoldPosition>,

    /// Randomize each segment's duration around the base duration
    #[serde(default)]
    pub randomize: bool,
}

impl Regime {
    /// Steady regime with no hold and no randomization
    pub fn new(duration_ms: u64, breaths_per_minute: u32) -> Self {
        Regime {
            duration_ms,
            breaths_per_minute,
            hold_pos: None,
            randomize: false,
        }
    }

    /// Add a hold segment to every breath
    pub fn with_hold(mut self, hold_pos: HoldPosition) -> Self {
        self.hold_pos = Some(hold_pos);
        self
    }

    /// Enable or disable segment randomization
    pub fn randomized(mut self, randomize: bool) -> Self {
        self.randomize = randomize;
        self
    }

    /// Segments per breath: inhale + exhale, plus the hold if any
    pub fn segments_per_breath(&self) -> u32 {
        if self.hold_pos.is_some() {
            3
        } else {
            2
        }
    }

    /// Length of one breath at the requested rate
    pub fn ms_per_breath(&self) -> f64 {
        MS_PER_MINUTE / self.breaths_per_minute as f64
    }

    /// Length of one unrandomized segment
    pub fn base_segment_ms(&self) -> f64 {
        self.ms_per_breath() / self.segments_per_breath() as f64
    }
}

/// Track offset where a regime's first breath begins
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegimeBoundary {
    /// Elapsed track milliseconds at which this regime starts
    pub boundary_ms: f64,

    /// The regime exactly as requested
    pub regime: Regime,

    /// How long the generated breaths actually last
    /// Differs from `regime.duration_ms` by whole-breath rounding and drift
    pub realized_duration_ms: f64,
}

impl RegimeBoundary {
    /// Track offset where this regime's generated breaths end
    pub fn end_ms(&self) -> f64 {
        self.boundary_ms + self.realized_duration_ms
    }
}

/// Output of the compiler: the full track and its boundary schedule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledProgram {
    pub track: Track,
    pub boundaries: Vec<RegimeBoundary>,
}

impl CompiledProgram {
    /// Program with no regimes: sentinel-only track, empty schedule
    pub fn empty() -> Self {
        CompiledProgram {
            track: Track::new(),
            boundaries: Vec::new(),
        }
    }

    /// Total track duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.track.duration_ms()
    }

    /// The regime whose breaths cover `t`, if any
    pub fn regime_at(&self, t: f64) -> Option<&RegimeBoundary> {
        self.boundaries
            .iter()
            .rev()
            .find(|boundary| boundary.boundary_ms <= t && t <= boundary.end_ms())
    }
}

impl Default for CompiledProgram {
    fn default() -> Self {
        Self::empty()
    }
}
