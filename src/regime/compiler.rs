// Regime Compiler - Turns an ordered regime list into a breath track
// Whole-breath generation with optional randomized segment durations

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{CompiledProgram, HoldPosition, Regime, RegimeBoundary};
use crate::track::types::{Track, EXHALED, INHALED};

/// Relative slack when comparing accumulated segment time against a target.
/// Summing `60000 / bpm` pieces lands a few ulps off exact multiples.
const DURATION_EPSILON: f64 = 1e-9;

/// Slack when counting whole steps inside a spread
const STEP_EPSILON: f64 = 1e-9;

/// Configuration for regime validation and segment sampling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Slowest accepted breathing rate
    pub min_bpm: u32,

    /// Fastest accepted breathing rate
    pub max_bpm: u32,

    /// Shortest accepted requested duration in milliseconds
    pub min_duration_ms: u64,

    /// Maximum drift of one randomized breath, split across its segments
    pub random_spread_ms: f64,

    /// Granularity of one randomized breath, split across its segments
    pub random_step_ms: f64,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            min_bpm: 2,
            max_bpm: 60,
            min_duration_ms: 10000,
            random_spread_ms: 2000.0,
            random_step_ms: 100.0,
        }
    }
}

/// A regime that cannot be compiled
///
/// Validation runs over the whole list before any generation, so one bad
/// regime rejects the entire compile call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("regime {index}: {} breaths per minute is outside [{min}, {max}]", .regime.breaths_per_minute)]
    RateOutOfRange {
        index: usize,
        regime: Regime,
        min: u32,
        max: u32,
    },

    #[error("regime {index}: duration {} ms is below the {min_ms} ms minimum", .regime.duration_ms)]
    DurationTooShort {
        index: usize,
        regime: Regime,
        min_ms: u64,
    },

    #[error("regime {index}: duration {} ms is shorter than one {breath_ms:.0} ms breath", .regime.duration_ms)]
    ShorterThanOneBreath {
        index: usize,
        regime: Regime,
        breath_ms: f64,
    },
}

impl ValidationError {
    /// Position of the offending regime in the submitted list
    pub fn index(&self) -> usize {
        match self {
            ValidationError::RateOutOfRange { index, .. }
            | ValidationError::DurationTooShort { index, .. }
            | ValidationError::ShorterThanOneBreath { index, .. } => *index,
        }
    }

    /// The offending regime
    pub fn regime(&self) -> &Regime {
        match self {
            ValidationError::RateOutOfRange { regime, .. }
            | ValidationError::DurationTooShort { regime, .. }
            | ValidationError::ShorterThanOneBreath { regime, .. } => regime,
        }
    }
}

/// Source of segment durations for one regime
pub trait SegmentSampler {
    /// Duration of the next inhale, hold, or exhale segment in milliseconds
    fn next_segment_ms(&mut self) -> f64;
}

/// Every segment lasts exactly the base duration
#[derive(Debug, Clone, Copy)]
pub struct ConstantSampler {
    segment_ms: f64,
}

impl ConstantSampler {
    pub fn new(segment_ms: f64) -> Self {
        ConstantSampler { segment_ms }
    }
}

impl SegmentSampler for ConstantSampler {
    fn next_segment_ms(&mut self) -> f64 {
        self.segment_ms
    }
}

/// Uniform draws, with replacement, from a discrete set around the base
///
/// The set spans `base ± spread/segments` in steps of `step/segments`, so a
/// whole breath drifts by at most `spread` regardless of hold count. The set
/// is always symmetric about the base, so the long-run average stays on the
/// requested rate; fast rates only get fewer steps on each side.
#[derive(Debug, Clone)]
pub struct RandomSampler<R> {
    choices: Vec<f64>,
    rng: R,
}

impl<R: Rng> RandomSampler<R> {
    /// Build the choice set for one regime
    pub fn new(regime: &Regime, config: &CompilerConfig, rng: R) -> Self {
        let segments = regime.segments_per_breath() as f64;
        let base = regime.base_segment_ms();
        let step = config.random_step_ms / segments;

        if step <= 0.0 || config.random_spread_ms <= 0.0 {
            return RandomSampler {
                choices: vec![base],
                rng,
            };
        }

        // Fast rates leave less than the full spread below the base;
        // narrow both sides equally so every segment stays positive and
        // the set stays centred on the base.
        let spread = (config.random_spread_ms / segments).min(base - step).max(0.0);
        let half = (spread / step + STEP_EPSILON).floor() as i64;

        let choices = (-half..=half)
            .map(|k| base + k as f64 * step)
            .collect();

        RandomSampler { choices, rng }
    }

    /// The discrete set draws are taken from
    pub fn choices(&self) -> &[f64] {
        &self.choices
    }
}

impl<R: Rng> SegmentSampler for RandomSampler<R> {
    fn next_segment_ms(&mut self) -> f64 {
        let idx = self.rng.gen_range(0..self.choices.len());
        self.choices[idx]
    }
}

/// Compiles regime lists into a track and boundary schedule
#[derive(Debug, Clone, Default)]
pub struct Compiler {
    config: CompilerConfig,
}

impl Compiler {
    pub fn new(config: CompilerConfig) -> Self {
        Compiler { config }
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Check every regime against rate and duration constraints
    pub fn validate(&self, regimes: &[Regime]) -> Result<(), ValidationError> {
        for (index, regime) in regimes.iter().enumerate() {
            self.validate_one(index, regime)?;
        }
        Ok(())
    }

    fn validate_one(&self, index: usize, regime: &Regime) -> Result<(), ValidationError> {
        let bpm = regime.breaths_per_minute;
        if bpm < self.config.min_bpm || bpm > self.config.max_bpm || bpm == 0 {
            return Err(ValidationError::RateOutOfRange {
                index,
                regime: *regime,
                min: self.config.min_bpm,
                max: self.config.max_bpm,
            });
        }

        if regime.duration_ms < self.config.min_duration_ms {
            return Err(ValidationError::DurationTooShort {
                index,
                regime: *regime,
                min_ms: self.config.min_duration_ms,
            });
        }

        let breath_ms = regime.ms_per_breath();
        if (regime.duration_ms as f64) < breath_ms {
            return Err(ValidationError::ShorterThanOneBreath {
                index,
                regime: *regime,
                breath_ms,
            });
        }

        Ok(())
    }

    /// Compile with segment randomness drawn from `rng`
    ///
    /// Each regime gets its own sampler seeded from `rng`, so sampler state
    /// never carries across regimes and a seeded `rng` reproduces the
    /// same track.
    pub fn compile_with_rng<R: RngCore + ?Sized>(
        &self,
        regimes: &[Regime],
        rng: &mut R,
    ) -> Result<CompiledProgram, ValidationError> {
        self.validate(regimes)?;

        let mut track = Track::new();
        let mut boundaries = Vec::with_capacity(regimes.len());
        let mut offset_ms = 0.0;

        for regime in regimes {
            let regime_seed = rng.next_u64();

            let realized_ms = if regime.randomize {
                let mut sampler =
                    RandomSampler::new(regime, &self.config, StdRng::seed_from_u64(regime_seed));
                generate_breaths(regime, &mut sampler, offset_ms, &mut track)
            } else {
                let mut sampler = ConstantSampler::new(regime.base_segment_ms());
                generate_breaths(regime, &mut sampler, offset_ms, &mut track)
            };

            boundaries.push(RegimeBoundary {
                boundary_ms: offset_ms,
                regime: *regime,
                realized_duration_ms: realized_ms,
            });

            // Later boundaries follow the realized duration, not the request
            offset_ms += realized_ms;
        }

        log::info!(
            "Compiled {} regimes into {} track points ({:.0} ms)",
            regimes.len(),
            track.len(),
            track.duration_ms()
        );

        Ok(CompiledProgram { track, boundaries })
    }

    /// Compile with a fixed seed (reproducible randomized tracks)
    pub fn compile_seeded(
        &self,
        regimes: &[Regime],
        seed: u64,
    ) -> Result<CompiledProgram, ValidationError> {
        let mut rng = StdRng::seed_from_u64(seed);
        self.compile_with_rng(regimes, &mut rng)
    }

    /// Compile with entropy-seeded randomness
    pub fn compile(&self, regimes: &[Regime]) -> Result<CompiledProgram, ValidationError> {
        let mut rng = StdRng::from_entropy();
        self.compile_with_rng(regimes, &mut rng)
    }
}

/// Compile regimes with the default configuration
pub fn compile(regimes: &[Regime]) -> Result<CompiledProgram, ValidationError> {
    Compiler::default().compile(regimes)
}

/// Compile regimes with the default configuration and a fixed seed
pub fn compile_seeded(regimes: &[Regime], seed: u64) -> Result<CompiledProgram, ValidationError> {
    Compiler::default().compile_seeded(regimes, seed)
}

/// Append whole breaths for one regime until its requested duration is
/// covered. Returns the realized duration.
///
/// A duration that is an exact multiple of the breath length is covered
/// once the accumulated time is within `DURATION_EPSILON` of it, so float
/// drift never adds a breath.
fn generate_breaths(
    regime: &Regime,
    sampler: &mut dyn SegmentSampler,
    offset_ms: f64,
    track: &mut Track,
) -> f64 {
    let target_ms = regime.duration_ms as f64;
    let covered_ms = target_ms - target_ms * DURATION_EPSILON;
    let mut elapsed = 0.0;

    loop {
        elapsed += sampler.next_segment_ms();
        track.push(offset_ms + elapsed, INHALED);

        if regime.hold_pos == Some(HoldPosition::PostInhale) {
            elapsed += sampler.next_segment_ms();
            track.push(offset_ms + elapsed, INHALED);
        }

        elapsed += sampler.next_segment_ms();
        track.push(offset_ms + elapsed, EXHALED);

        if regime.hold_pos == Some(HoldPosition::PostExhale) {
            elapsed += sampler.next_segment_ms();
            track.push(offset_ms + elapsed, EXHALED);
        }

        if elapsed >= covered_ms {
            break;
        }
    }

    elapsed
}
