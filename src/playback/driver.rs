// Frame Driver - Feeds the playback engine from a real clock
// Ticks on a fixed frame interval and applies transport commands between frames

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use uuid::Uuid;

use super::engine::{Completion, Frame, PlaybackEngine, PlaybackError};
use super::trace::{SessionEvent, TraceError, TraceWriter};
use crate::regime::CompiledProgram;

/// Configuration for the frame driver
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Time between engine ticks (16 ms is roughly one display frame)
    pub frame_interval_ms: u64,

    /// Optional JSONL file receiving session events
    pub trace_path: Option<PathBuf>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            frame_interval_ms: 16,
            trace_path: None,
        }
    }
}

/// Transport commands applied between frames
#[derive(Debug, Clone)]
pub enum DriverCommand {
    Pause,
    Resume,
    /// Hot-swap the program without resetting elapsed time
    SetProgram(CompiledProgram),
    /// Abandon the session
    Stop,
}

/// How a driven session ended
#[derive(Debug, Clone, PartialEq)]
pub enum DriveOutcome {
    Completed(Completion),
    Stopped { session_id: Uuid, elapsed_ms: f64 },
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),
}

/// Run one session on `engine` until it completes or is stopped
///
/// Starts the engine, then ticks it every `frame_interval_ms` with the
/// milliseconds elapsed since the driver began. Each frame is handed to
/// `on_frame` (the renderer hook). Commands are applied as they arrive; a
/// closed command channel just leaves the session running to completion.
pub async fn drive<F>(
    engine: &mut PlaybackEngine,
    config: &DriverConfig,
    mut commands: mpsc::Receiver<DriverCommand>,
    mut on_frame: F,
) -> Result<DriveOutcome, DriverError>
where
    F: FnMut(&Frame),
{
    let trace = config.trace_path.clone().map(TraceWriter::new);

    let signal = engine.start()?;
    let session_id = signal.session_id();

    if let Some(program) = engine.program() {
        record(
            trace.as_ref(),
            session_id,
            SessionEvent::Started {
                track_duration_ms: program.duration_ms(),
                regime_count: program.boundaries.len(),
            },
        )?;
    }

    let origin = Instant::now();
    let mut interval = time::interval(Duration::from_millis(config.frame_interval_ms.max(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut commands_open = true;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let instant_ms = origin.elapsed().as_secs_f64() * 1000.0;
                let frame = engine.tick(instant_ms)?;

                for event in &frame.fired {
                    record(
                        trace.as_ref(),
                        session_id,
                        SessionEvent::BoundaryCrossed {
                            elapsed_ms: event.elapsed_ms,
                            boundary_ms: event.boundary.boundary_ms,
                            regime: event.boundary.regime,
                        },
                    )?;
                }

                on_frame(&frame);

                if frame.completed {
                    break;
                }
            }
            command = commands.recv(), if commands_open => {
                match command {
                    None => commands_open = false,
                    Some(DriverCommand::Pause) => {
                        if engine.pause() {
                            record(trace.as_ref(), session_id, SessionEvent::Paused {
                                elapsed_ms: engine.elapsed_ms(),
                            })?;
                        }
                    }
                    Some(DriverCommand::Resume) => {
                        if engine.resume() {
                            record(trace.as_ref(), session_id, SessionEvent::Resumed {
                                elapsed_ms: engine.elapsed_ms(),
                            })?;
                        }
                    }
                    Some(DriverCommand::SetProgram(program)) => {
                        let track_duration_ms = program.duration_ms();
                        engine.set_program(program);
                        record(trace.as_ref(), session_id, SessionEvent::ProgramReplaced {
                            elapsed_ms: engine.elapsed_ms(),
                            track_duration_ms,
                        })?;
                    }
                    Some(DriverCommand::Stop) => {
                        let elapsed_ms = engine.elapsed_ms();
                        log::info!("Session {} stopped at {:.0} ms", session_id, elapsed_ms);
                        record(trace.as_ref(), session_id, SessionEvent::Stopped { elapsed_ms })?;
                        return Ok(DriveOutcome::Stopped { session_id, elapsed_ms });
                    }
                }
            }
        }
    }

    let completion = signal.await?;
    record(
        trace.as_ref(),
        session_id,
        SessionEvent::Completed {
            elapsed_ms: completion.elapsed_ms,
        },
    )?;

    Ok(DriveOutcome::Completed(completion))
}

fn record(
    trace: Option<&TraceWriter>,
    session_id: Uuid,
    event: SessionEvent,
) -> Result<(), TraceError> {
    match trace {
        Some(writer) => writer.record(session_id, event),
        None => Ok(()),
    }
}
