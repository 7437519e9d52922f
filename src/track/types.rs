// Track types - Breath points and the compiled track
// A track is the full inhale/hold/exhale curve drawn by the renderer

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Height of a fully inhaled breath
pub const INHALED: f64 = 1.0;

/// Height of a fully exhaled breath
pub const EXHALED: f64 = 0.0;

/// A single vertex of the piecewise-linear breath track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BreathPoint {
    /// Elapsed milliseconds from track start
    pub t: f64,

    /// Breath height: 1.0 = fully inhaled, 0.0 = fully exhaled
    pub h: f64,
}

impl BreathPoint {
    pub fn new(t: f64, h: f64) -> Self {
        BreathPoint { t, h }
    }

    /// The start-of-time marker every track begins with
    pub fn sentinel() -> Self {
        BreathPoint { t: 0.0, h: EXHALED }
    }
}

/// Point lists that do not form a track
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackError {
    #[error("track has no points")]
    Empty,

    #[error("track must start with the sentinel at t=0, h=0, found t={t}, h={h}")]
    MissingSentinel { t: f64, h: f64 },

    #[error("point {index}: time {t} does not follow {previous}")]
    NotIncreasing { index: usize, t: f64, previous: f64 },

    #[error("point {index}: height {h} is outside [0, 1]")]
    HeightOutOfRange { index: usize, h: f64 },
}

/// Ordered sequence of breath points, starting with the sentinel
///
/// Point times are strictly increasing. The sentinel is not a drawn
/// breath segment; a track holding only the sentinel has no breaths.
/// Deserialized tracks are checked the same way as `Track::try_from`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawTrack")]
pub struct Track {
    points: Vec<BreathPoint>,
}

/// Unchecked wire shape of a track
#[derive(Deserialize)]
struct RawTrack {
    points: Vec<BreathPoint>,
}

impl Track {
    /// Create a track holding only the sentinel point
    pub fn new() -> Self {
        Track {
            points: vec![BreathPoint::sentinel()],
        }
    }

    /// Append a vertex. Callers keep times strictly increasing.
    pub(crate) fn push(&mut self, t: f64, h: f64) {
        debug_assert!(
            self.points.last().map_or(true, |last| t > last.t),
            "track times must be strictly increasing"
        );
        self.points.push(BreathPoint::new(t, h));
    }

    /// All vertices including the sentinel
    pub fn points(&self) -> &[BreathPoint] {
        &self.points
    }

    /// Number of vertices including the sentinel
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// True when the track holds no breaths (sentinel only)
    pub fn is_empty(&self) -> bool {
        self.points.len() <= 1
    }

    /// The last vertex (the sentinel for an empty track)
    pub fn last(&self) -> BreathPoint {
        self.points
            .last()
            .copied()
            .unwrap_or_else(BreathPoint::sentinel)
    }

    /// Total duration of the track in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.last().t
    }

    /// Iterate over consecutive (left, right) vertex pairs
    pub fn segments(&self) -> impl Iterator<Item = (BreathPoint, BreathPoint)> + '_ {
        self.points.windows(2).map(|pair| (pair[0], pair[1]))
    }

    /// Height of the track at `t` milliseconds
    pub fn height_at(&self, t: f64) -> f64 {
        super::interpolate::height_at(self, t)
    }
}

impl Default for Track {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<Vec<BreathPoint>> for Track {
    type Error = TrackError;

    /// Build a track from raw points, sentinel included
    fn try_from(points: Vec<BreathPoint>) -> Result<Self, Self::Error> {
        let first = points.first().copied().ok_or(TrackError::Empty)?;
        if first != BreathPoint::sentinel() {
            return Err(TrackError::MissingSentinel {
                t: first.t,
                h: first.h,
            });
        }

        for (index, pair) in points.windows(2).enumerate() {
            let (previous, point) = (pair[0], pair[1]);
            if !point.t.is_finite() || point.t <= previous.t {
                return Err(TrackError::NotIncreasing {
                    index: index + 1,
                    t: point.t,
                    previous: previous.t,
                });
            }
            if !(EXHALED..=INHALED).contains(&point.h) {
                return Err(TrackError::HeightOutOfRange {
                    index: index + 1,
                    h: point.h,
                });
            }
        }

        Ok(Track { points })
    }
}

impl TryFrom<RawTrack> for Track {
    type Error = TrackError;

    fn try_from(raw: RawTrack) -> Result<Self, Self::Error> {
        Track::try_from(raw.points)
    }
}
