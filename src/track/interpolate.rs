// Track interpolation - Height of the breath curve at any instant
// Linear scan is fine here: tracks are short-lived and rebuilt on every regime change

use super::types::{BreathPoint, Track};

/// Evaluate track height at `t` milliseconds
///
/// Finds the bracketing pair `left.t <= t <= right.t` and interpolates
/// linearly between them. At or before the sentinel the sentinel height is
/// returned; past the last vertex the height comes from
/// [`extrapolate_after_end`].
pub fn height_at(track: &Track, t: f64) -> f64 {
    let points = track.points();
    let first = match points.first() {
        Some(first) => *first,
        None => return BreathPoint::sentinel().h,
    };

    if t <= first.t {
        return first.h;
    }

    for (left, right) in track.segments() {
        if left.t <= t && t <= right.t {
            return lerp(left, right, t);
        }
    }

    extrapolate_after_end(track.last(), t)
}

/// Height policy for instants past the final vertex
///
/// The track is treated as a zero-slope line extended to infinity: the
/// marker rests at the last height once the program has run out.
pub fn extrapolate_after_end(last: BreathPoint, _t: f64) -> f64 {
    last.h
}

fn lerp(left: BreathPoint, right: BreathPoint, t: f64) -> f64 {
    let span = right.t - left.t;
    if span <= 0.0 {
        return right.h;
    }
    left.h + (right.h - left.h) * (t - left.t) / span
}
