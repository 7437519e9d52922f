// Breathpace - Paced breathing timeline compiler and playback engine
// Module declarations

pub mod pacer;
pub mod playback;
pub mod regime;
pub mod settings;
pub mod track;

pub use pacer::{Pacer, PacerError};
pub use playback::{
    drive, BoundaryDispatch, BoundaryEvent, Completion, CompletionSignal, DriveOutcome,
    DriverCommand, DriverConfig, EngineConfig, Frame, Guide, PlaybackEngine, PlaybackError,
    PlaybackStatus,
};
pub use regime::{
    compile, compile_seeded, parse_regimes, CompiledProgram, Compiler, CompilerConfig,
    HoldPosition, ParseError, Regime, RegimeBoundary, ValidationError,
};
pub use settings::{PacerSettings, SettingsError};
pub use track::{height_at, BreathPhase, BreathPoint, Track, TrackError};
