// Pacer settings - Compiler, engine, and driver configuration in one file
// Every section falls back to its defaults when omitted

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::playback::{DriverConfig, EngineConfig, PlaybackEngine};
use crate::regime::{Compiler, CompilerConfig};

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid settings: {0}")]
    ParseError(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacerSettings {
    pub compiler: CompilerConfig,
    pub engine: EngineConfig,
    pub driver: DriverConfig,
}

impl PacerSettings {
    /// Parse settings from JSON text
    pub fn from_json_str(json: &str) -> Result<Self, SettingsError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load settings from a JSON file
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path)?;
        let settings = Self::from_json_str(&contents)?;
        log::info!("Loaded pacer settings from {}", path.display());
        Ok(settings)
    }

    /// Compiler built from these settings
    pub fn compiler(&self) -> Compiler {
        Compiler::new(self.compiler.clone())
    }

    /// Idle engine built from these settings
    pub fn engine(&self) -> PlaybackEngine {
        PlaybackEngine::new(self.engine.clone())
    }
}
