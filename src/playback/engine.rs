// Playback Engine - Frame-driven clock over a compiled breath track
// Advances logical time from external samples, fires boundary events, signals completion

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

use crate::regime::{CompiledProgram, Regime, RegimeBoundary};
use crate::track::{height_at, phase_at, BreathPhase};

/// Lifecycle of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackStatus {
    /// Constructed, never started
    Idle,

    /// Accepting ticks and advancing elapsed time
    Running,

    /// Elapsed time frozen until resumed
    Paused,

    /// Elapsed time passed the end of the track; ticks are ignored
    Completed,
}

/// How many due boundaries one tick may fire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryDispatch {
    /// At most one boundary per tick. A tick spanning several boundaries
    /// fires the earliest now and the rest on following ticks.
    OnePerTick,

    /// Every boundary at or before the current elapsed time
    DrainAll,
}

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub boundary_dispatch: BoundaryDispatch,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            boundary_dispatch: BoundaryDispatch::OnePerTick,
        }
    }
}

/// Errors raised by playback operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("no compiled program installed")]
    NoProgram,

    #[error("playback session {0} ended without completing")]
    Abandoned(Uuid),
}

/// Current marker position handed to the renderer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Guide {
    pub elapsed_ms: f64,
    pub height: f64,
}

/// A regime boundary crossed during a tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundaryEvent {
    /// Engine elapsed time when the crossing was noticed
    pub elapsed_ms: f64,

    /// The boundary crossed, carrying the requested regime
    pub boundary: RegimeBoundary,
}

impl BoundaryEvent {
    /// The regime as originally requested
    pub fn regime(&self) -> &Regime {
        &self.boundary.regime
    }
}

/// Everything a single tick reports
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub status: PlaybackStatus,
    pub guide: Guide,
    pub phase: BreathPhase,

    /// Phase differs from the previous running tick (direction change cue)
    pub phase_changed: bool,

    /// Boundaries crossed by this tick, in track order
    pub fired: Vec<BoundaryEvent>,

    /// True once the engine is in the terminal state
    pub completed: bool,
}

/// Delivered once per `start()` when playback runs past the track end
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Completion {
    pub session_id: Uuid,
    pub elapsed_ms: f64,
}

/// Resolves when the session started alongside it completes
///
/// Resolves to [`PlaybackError::Abandoned`] when the session is replaced by
/// another `start()` or the engine is dropped first.
#[derive(Debug)]
pub struct CompletionSignal {
    session_id: Uuid,
    rx: oneshot::Receiver<Completion>,
}

impl CompletionSignal {
    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Non-blocking check; returns the completion once it has been sent
    pub fn try_completed(&mut self) -> Option<Completion> {
        self.rx.try_recv().ok()
    }
}

impl Future for CompletionSignal {
    type Output = Result<Completion, PlaybackError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let session_id = self.session_id;
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.map_err(|_| PlaybackError::Abandoned(session_id)))
    }
}

type BoundaryObserver = Box<dyn FnMut(f64, &Regime) + Send>;

/// Cooperative, sample-driven playback over a compiled program
///
/// The engine owns no clock. Callers feed it instants (milliseconds on any
/// monotonic scale) through [`PlaybackEngine::tick`], one at a time.
pub struct PlaybackEngine {
    config: EngineConfig,
    program: Option<CompiledProgram>,
    status: PlaybackStatus,
    elapsed_ms: f64,
    last_sample_ms: Option<f64>,
    pending: VecDeque<RegimeBoundary>,
    observers: Vec<BoundaryObserver>,
    session_id: Option<Uuid>,
    completion_tx: Option<oneshot::Sender<Completion>>,
    last_phase: Option<BreathPhase>,
}

impl PlaybackEngine {
    /// Create an idle engine with no program installed
    pub fn new(config: EngineConfig) -> Self {
        PlaybackEngine {
            config,
            program: None,
            status: PlaybackStatus::Idle,
            elapsed_ms: 0.0,
            last_sample_ms: None,
            pending: VecDeque::new(),
            observers: Vec::new(),
            session_id: None,
            completion_tx: None,
            last_phase: None,
        }
    }

    /// Create an idle engine with a program installed
    pub fn with_program(config: EngineConfig, program: CompiledProgram) -> Self {
        let mut engine = Self::new(config);
        engine.set_program(program);
        engine
    }

    /// Install a new track and boundary schedule
    ///
    /// Allowed in any state. Elapsed time is kept; boundaries earlier than
    /// the current elapsed time are treated as already passed.
    pub fn set_program(&mut self, program: CompiledProgram) {
        let elapsed = self.elapsed_ms;
        self.pending = program
            .boundaries
            .iter()
            .filter(|boundary| boundary.boundary_ms >= elapsed)
            .copied()
            .collect();

        log::info!(
            "Installed program: {} boundaries, {:.0} ms track ({} pending at {:.0} ms)",
            program.boundaries.len(),
            program.duration_ms(),
            self.pending.len(),
            elapsed
        );

        self.program = Some(program);
    }

    pub fn program(&self) -> Option<&CompiledProgram> {
        self.program.as_ref()
    }

    /// Register an observer called on every boundary crossing
    ///
    /// Observers run synchronously inside `tick`, in registration order,
    /// with the elapsed time and the requested regime.
    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(f64, &Regime) + Send + 'static,
    {
        self.observers.push(Box::new(observer));
    }

    /// Begin a new session from time zero
    pub fn start(&mut self) -> Result<CompletionSignal, PlaybackError> {
        let program = self.program.as_ref().ok_or(PlaybackError::NoProgram)?;

        // Dropping the previous sender resolves its signal as abandoned
        let (tx, rx) = oneshot::channel();
        let session_id = Uuid::new_v4();

        self.pending = program.boundaries.iter().copied().collect();
        self.elapsed_ms = 0.0;
        self.last_sample_ms = None;
        self.last_phase = None;
        self.status = PlaybackStatus::Running;
        self.session_id = Some(session_id);
        self.completion_tx = Some(tx);

        log::info!(
            "Started session {} ({:.0} ms track)",
            session_id,
            program.duration_ms()
        );

        Ok(CompletionSignal { session_id, rx })
    }

    /// Freeze elapsed time. Returns false (no-op) unless running.
    pub fn pause(&mut self) -> bool {
        if self.status != PlaybackStatus::Running {
            return false;
        }
        self.status = PlaybackStatus::Paused;
        // Next resume starts a fresh baseline instead of charging the gap
        self.last_sample_ms = None;
        log::debug!("Paused at {:.0} ms", self.elapsed_ms);
        true
    }

    /// Continue without resetting elapsed time. Returns false (no-op)
    /// unless paused or idle.
    pub fn resume(&mut self) -> bool {
        match self.status {
            PlaybackStatus::Paused | PlaybackStatus::Idle => {
                self.status = PlaybackStatus::Running;
                self.last_sample_ms = None;
                log::debug!("Resumed at {:.0} ms", self.elapsed_ms);
                true
            }
            PlaybackStatus::Running | PlaybackStatus::Completed => false,
        }
    }

    /// Advance the clock to `instant_ms` and report the resulting frame
    ///
    /// Outside the running state this is a no-op that reports the current
    /// frame with no events.
    pub fn tick(&mut self, instant_ms: f64) -> Result<Frame, PlaybackError> {
        if self.program.is_none() {
            return Err(PlaybackError::NoProgram);
        }

        if self.status != PlaybackStatus::Running {
            let phase = self.current_phase();
            return Ok(self.frame(phase, false, Vec::new()));
        }

        self.advance_clock(instant_ms);
        let fired = self.dispatch_boundaries();
        self.check_completion();

        let phase = self.current_phase();
        let phase_changed = self.last_phase != Some(phase);
        self.last_phase = Some(phase);

        Ok(self.frame(phase, phase_changed, fired))
    }

    fn advance_clock(&mut self, instant_ms: f64) {
        if let Some(last) = self.last_sample_ms {
            let delta = instant_ms - last;
            if delta >= 0.0 {
                self.elapsed_ms += delta;
            } else {
                log::warn!(
                    "Clock sample went backwards by {:.1} ms; holding elapsed time",
                    -delta
                );
            }
        }
        self.last_sample_ms = Some(instant_ms);
    }

    fn dispatch_boundaries(&mut self) -> Vec<BoundaryEvent> {
        let mut fired = Vec::new();

        while let Some(next) = self.pending.front().copied() {
            if self.elapsed_ms < next.boundary_ms {
                break;
            }
            self.pending.pop_front();

            log::debug!(
                "Crossed boundary at {:.0} ms ({} bpm) at elapsed {:.0} ms",
                next.boundary_ms,
                next.regime.breaths_per_minute,
                self.elapsed_ms
            );

            for observer in self.observers.iter_mut() {
                observer(self.elapsed_ms, &next.regime);
            }

            fired.push(BoundaryEvent {
                elapsed_ms: self.elapsed_ms,
                boundary: next,
            });

            if self.config.boundary_dispatch == BoundaryDispatch::OnePerTick {
                break;
            }
        }

        fired
    }

    fn check_completion(&mut self) {
        let track = match self.program.as_ref() {
            Some(program) => &program.track,
            None => return,
        };

        if !track.is_empty() && self.elapsed_ms <= track.duration_ms() {
            return;
        }

        self.status = PlaybackStatus::Completed;

        let session_id = self.session_id.unwrap_or_else(Uuid::nil);
        log::info!(
            "Session {} completed at {:.0} ms",
            session_id,
            self.elapsed_ms
        );

        if let Some(tx) = self.completion_tx.take() {
            // Receiver may already be gone; completion is still terminal
            let _ = tx.send(Completion {
                session_id,
                elapsed_ms: self.elapsed_ms,
            });
        }
    }

    fn current_phase(&self) -> BreathPhase {
        match self.program.as_ref() {
            Some(program) => phase_at(&program.track, self.elapsed_ms),
            None => BreathPhase::Finished,
        }
    }

    fn frame(&self, phase: BreathPhase, phase_changed: bool, fired: Vec<BoundaryEvent>) -> Frame {
        Frame {
            status: self.status,
            guide: self.guide(),
            phase,
            phase_changed,
            fired,
            completed: self.status == PlaybackStatus::Completed,
        }
    }

    /// Current marker position
    pub fn guide(&self) -> Guide {
        let height = self
            .program
            .as_ref()
            .map_or(0.0, |program| height_at(&program.track, self.elapsed_ms));

        Guide {
            elapsed_ms: self.elapsed_ms,
            height,
        }
    }

    pub fn status(&self) -> PlaybackStatus {
        self.status
    }

    pub fn elapsed_ms(&self) -> f64 {
        self.elapsed_ms
    }

    /// Id of the current (or last) session
    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Boundaries not yet fired, in track order
    pub fn pending_boundaries(&self) -> impl Iterator<Item = &RegimeBoundary> {
        self.pending.iter()
    }
}

impl Default for PlaybackEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regime::compile_seeded;
    use std::sync::{Arc, Mutex};

    fn program(regimes: &[Regime]) -> CompiledProgram {
        compile_seeded(regimes, 1).unwrap()
    }

    /// Three regimes: boundaries at 0, 12000, 24000; track ends at 36000
    fn three_regimes() -> CompiledProgram {
        program(&[
            Regime::new(10000, 10),
            Regime::new(12000, 10),
            Regime::new(10000, 5),
        ])
    }

    fn recorder(engine: &mut PlaybackEngine) -> Arc<Mutex<Vec<(f64, Regime)>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.subscribe(move |elapsed, regime| {
            sink.lock().unwrap().push((elapsed, *regime));
        });
        seen
    }

    #[test]
    fn test_requires_program() {
        let mut engine = PlaybackEngine::default();
        assert_eq!(engine.start().unwrap_err(), PlaybackError::NoProgram);
        assert_eq!(engine.tick(0.0).unwrap_err(), PlaybackError::NoProgram);
        assert_eq!(engine.status(), PlaybackStatus::Idle);
    }

    #[test]
    fn test_first_tick_sets_baseline() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let _signal = engine.start().unwrap();

        let frame = engine.tick(5000.0).unwrap();
        assert_eq!(frame.guide.elapsed_ms, 0.0);

        let frame = engine.tick(5500.0).unwrap();
        assert_eq!(frame.guide.elapsed_ms, 500.0);
        assert_eq!(frame.status, PlaybackStatus::Running);
    }

    #[test]
    fn test_guide_height_follows_track() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let _signal = engine.start().unwrap();

        engine.tick(0.0).unwrap();
        let frame = engine.tick(1500.0).unwrap();
        assert!((frame.guide.height - 0.5).abs() < 1e-9);
        assert_eq!(frame.phase, BreathPhase::Inhale);

        let frame = engine.tick(4500.0).unwrap();
        assert!((frame.guide.height - 0.5).abs() < 1e-9);
        assert_eq!(frame.phase, BreathPhase::Exhale);
        assert!(frame.phase_changed);
    }

    #[test]
    fn test_first_boundary_fires_on_first_tick() {
        let compiled = three_regimes();
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), compiled.clone());
        let seen = recorder(&mut engine);
        let _signal = engine.start().unwrap();

        let frame = engine.tick(0.0).unwrap();
        assert_eq!(frame.fired.len(), 1);
        assert_eq!(frame.fired[0].boundary.boundary_ms, 0.0);
        assert_eq!(frame.fired[0].regime(), &compiled.boundaries[0].regime);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (0.0, Regime::new(10000, 10)));
    }

    #[test]
    fn test_observers_notified_in_registration_order() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let order = Arc::new(Mutex::new(Vec::new()));

        for id in 0..3 {
            let order = Arc::clone(&order);
            engine.subscribe(move |_, _| order.lock().unwrap().push(id));
        }

        let _signal = engine.start().unwrap();
        engine.tick(0.0).unwrap();

        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_one_boundary_per_tick() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let seen = recorder(&mut engine);
        let _signal = engine.start().unwrap();

        engine.tick(0.0).unwrap();
        // Jump past both remaining boundaries in one tick
        let frame = engine.tick(25000.0).unwrap();
        assert_eq!(frame.fired.len(), 1);
        assert_eq!(frame.fired[0].boundary.boundary_ms, 12000.0);
        assert_eq!(frame.fired[0].elapsed_ms, 25000.0);

        let frame = engine.tick(25016.0).unwrap();
        assert_eq!(frame.fired.len(), 1);
        assert_eq!(frame.fired[0].boundary.boundary_ms, 24000.0);

        assert_eq!(seen.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_drain_all_dispatch() {
        let config = EngineConfig {
            boundary_dispatch: BoundaryDispatch::DrainAll,
        };
        let mut engine = PlaybackEngine::with_program(config, three_regimes());
        let seen = recorder(&mut engine);
        let _signal = engine.start().unwrap();

        engine.tick(0.0).unwrap();
        let frame = engine.tick(25000.0).unwrap();
        assert_eq!(frame.fired.len(), 2);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].1, Regime::new(12000, 10));
        assert_eq!(seen[2].1, Regime::new(10000, 5));
    }

    #[test]
    fn test_pause_freezes_and_resume_skips_gap() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let _signal = engine.start().unwrap();

        engine.tick(0.0).unwrap();
        engine.tick(1000.0).unwrap();
        assert!(engine.pause());
        assert_eq!(engine.status(), PlaybackStatus::Paused);

        let frame = engine.tick(5000.0).unwrap();
        assert_eq!(frame.guide.elapsed_ms, 1000.0);
        assert_eq!(frame.status, PlaybackStatus::Paused);
        assert!(frame.fired.is_empty());

        assert!(engine.resume());
        engine.tick(9000.0).unwrap();
        assert_eq!(engine.elapsed_ms(), 1000.0);
        engine.tick(9500.0).unwrap();
        assert_eq!(engine.elapsed_ms(), 1500.0);
    }

    #[test]
    fn test_redundant_pause_resume_are_noops() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        assert!(!engine.pause());
        assert_eq!(engine.status(), PlaybackStatus::Idle);

        let _signal = engine.start().unwrap();
        assert!(!engine.resume());
        assert!(engine.pause());
        assert!(!engine.pause());
        assert!(engine.resume());
        assert!(!engine.resume());
        assert_eq!(engine.status(), PlaybackStatus::Running);
    }

    #[test]
    fn test_resume_from_idle_runs_without_signal() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let seen = recorder(&mut engine);

        assert!(engine.resume());
        engine.tick(0.0).unwrap();
        engine.tick(800.0).unwrap();

        assert_eq!(engine.elapsed_ms(), 800.0);
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_completion_resolves_once_and_later_ticks_are_noops() {
        let compiled = program(&[Regime::new(10000, 10)]);
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), compiled);
        let mut signal = engine.start().unwrap();
        let session_id = signal.session_id();

        engine.tick(0.0).unwrap();
        let frame = engine.tick(12000.0).unwrap();
        assert!(!frame.completed);
        assert!(signal.try_completed().is_none());

        let frame = engine.tick(12001.0).unwrap();
        assert!(frame.completed);
        assert_eq!(frame.status, PlaybackStatus::Completed);
        assert_eq!(frame.phase, BreathPhase::Finished);
        assert_eq!(frame.guide.height, 0.0);

        let completion = signal.try_completed().unwrap();
        assert_eq!(completion.session_id, session_id);
        assert_eq!(completion.elapsed_ms, 12001.0);

        let frame = engine.tick(50000.0).unwrap();
        assert!(frame.completed);
        assert!(!frame.phase_changed);
        assert_eq!(frame.guide.elapsed_ms, 12001.0);
        assert!(!engine.resume());
    }

    #[test]
    fn test_empty_program_completes_on_first_tick() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), CompiledProgram::empty());
        let mut signal = engine.start().unwrap();

        let frame = engine.tick(100.0).unwrap();
        assert!(frame.completed);
        assert!(frame.fired.is_empty());
        assert!(signal.try_completed().is_some());
    }

    #[test]
    fn test_backwards_clock_holds_elapsed() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let _signal = engine.start().unwrap();

        engine.tick(1000.0).unwrap();
        engine.tick(2000.0).unwrap();
        engine.tick(1500.0).unwrap();
        assert_eq!(engine.elapsed_ms(), 1000.0);

        engine.tick(1700.0).unwrap();
        assert_eq!(engine.elapsed_ms(), 1200.0);
    }

    #[test]
    fn test_hot_swap_keeps_elapsed_and_drops_passed_boundaries() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let seen = recorder(&mut engine);
        let _signal = engine.start().unwrap();

        engine.tick(0.0).unwrap();
        engine.tick(13000.0).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);

        // New program: boundaries at 0 and 12000 are behind us, 24000 is ahead
        engine.set_program(program(&[
            Regime::new(10000, 10),
            Regime::new(10000, 10),
            Regime::new(20000, 6),
        ]));
        assert_eq!(engine.elapsed_ms(), 13000.0);
        assert_eq!(engine.pending_boundaries().count(), 1);

        engine.tick(13500.0).unwrap();
        assert_eq!(engine.elapsed_ms(), 13500.0);
        engine.tick(24500.0).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2].1, Regime::new(20000, 6));
    }

    #[test]
    fn test_start_resets_session() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let first = engine.start().unwrap();
        engine.tick(0.0).unwrap();
        engine.tick(20000.0).unwrap();

        let second = engine.start().unwrap();
        assert_ne!(first.session_id(), second.session_id());
        assert_eq!(engine.elapsed_ms(), 0.0);
        assert_eq!(engine.pending_boundaries().count(), 3);
        assert_eq!(engine.session_id(), Some(second.session_id()));
    }

    #[tokio::test]
    async fn test_restart_abandons_previous_signal() {
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), three_regimes());
        let first = engine.start().unwrap();
        let first_id = first.session_id();
        let _second = engine.start().unwrap();

        assert_eq!(first.await.unwrap_err(), PlaybackError::Abandoned(first_id));
    }

    #[tokio::test]
    async fn test_signal_awaits_completion() {
        let compiled = program(&[Regime::new(10000, 10)]);
        let mut engine = PlaybackEngine::with_program(EngineConfig::default(), compiled);
        let signal = engine.start().unwrap();

        engine.tick(0.0).unwrap();
        engine.tick(20000.0).unwrap();

        let completion = signal.await.unwrap();
        assert_eq!(completion.elapsed_ms, 20000.0);
    }
}
