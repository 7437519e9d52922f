// Breath Track - Piecewise-linear height-over-time curve
// Interpolation and breath phase lookup over compiled tracks

pub mod types;
pub mod interpolate;
pub mod phase;

pub use types::{BreathPoint, Track, TrackError};
pub use interpolate::{height_at, extrapolate_after_end};
pub use phase::{BreathPhase, phase_at};
