// Playback - Engine, frame driver, and session trace
// Cooperative sample-driven playback of compiled breath programs

pub mod engine;
pub mod driver;
pub mod trace;

pub use engine::{
    BoundaryDispatch, BoundaryEvent, Completion, CompletionSignal, EngineConfig, Frame, Guide,
    PlaybackEngine, PlaybackError, PlaybackStatus,
};
pub use driver::{drive, DriveOutcome, DriverCommand, DriverConfig, DriverError};
pub use trace::{read_trace_file, SessionEvent, TraceEntry, TraceError, TraceWriter};
