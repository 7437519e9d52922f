// Pacer - App-facing surface tying compilation to playback
// Regime text or lists go in; frames, boundary events, and completion come out

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use crate::playback::{CompletionSignal, Frame, PlaybackEngine, PlaybackError};
use crate::regime::{parse_regimes, CompiledProgram, Compiler, ParseError, Regime, ValidationError};
use crate::settings::PacerSettings;
use crate::track::Track;

#[derive(Debug, Error)]
pub enum PacerError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

type PacerResult<T> = Result<T, PacerError>;

/// Compiler and engine behind one handle
///
/// Installing regimes is atomic: a list that fails to parse or validate
/// leaves the running program untouched.
pub struct Pacer {
    compiler: Compiler,
    engine: PlaybackEngine,
    rng: StdRng,
}

impl Pacer {
    pub fn new(settings: &PacerSettings) -> Self {
        Pacer {
            compiler: settings.compiler(),
            engine: settings.engine(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Pacer whose randomized regimes are reproducible
    pub fn seeded(settings: &PacerSettings, seed: u64) -> Self {
        Pacer {
            compiler: settings.compiler(),
            engine: settings.engine(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Compile and install a regime list
    ///
    /// Allowed while running: the new track takes effect on the next tick
    /// and elapsed time is kept until the next `start`.
    pub fn set_regimes(&mut self, regimes: &[Regime]) -> PacerResult<&CompiledProgram> {
        let program = self.compiler.compile_with_rng(regimes, &mut self.rng)?;
        self.engine.set_program(program);
        self.engine.program().ok_or(PacerError::Playback(PlaybackError::NoProgram))
    }

    /// Parse regime text, then compile and install it
    pub fn load_regimes_text(&mut self, text: &str) -> PacerResult<&CompiledProgram> {
        let regimes = parse_regimes(text)?;
        self.set_regimes(&regimes)
    }

    pub fn subscribe<F>(&mut self, observer: F)
    where
        F: FnMut(f64, &Regime) + Send + 'static,
    {
        self.engine.subscribe(observer);
    }

    pub fn start(&mut self) -> PacerResult<CompletionSignal> {
        Ok(self.engine.start()?)
    }

    pub fn pause(&mut self) -> bool {
        self.engine.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.engine.resume()
    }

    pub fn tick(&mut self, instant_ms: f64) -> PacerResult<Frame> {
        Ok(self.engine.tick(instant_ms)?)
    }

    /// Full track for drawing the static path
    pub fn track(&self) -> Option<&Track> {
        self.engine.program().map(|program| &program.track)
    }

    pub fn engine(&self) -> &PlaybackEngine {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut PlaybackEngine {
        &mut self.engine
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(&PacerSettings::default())
    }
}
