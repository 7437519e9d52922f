// Regime Compiler - Regime types, text parsing, and track compilation
// Turns requested breathing programs into a track plus boundary schedule

pub mod types;
pub mod compiler;
pub mod parse;

pub use types::{CompiledProgram, HoldPosition, Regime, RegimeBoundary};
pub use compiler::{
    compile, compile_seeded, Compiler, CompilerConfig, ConstantSampler, RandomSampler,
    SegmentSampler, ValidationError,
};
pub use parse::{parse_regimes, ParseError};
