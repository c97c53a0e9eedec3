//! Application settings management

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::PathManager;

/// Application settings stored in settings.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Whisper GGML model path; None falls back to the managed models dir.
    pub model_path: Option<PathBuf>,
    /// Transcription language hint (e.g. "en"); None lets the engine decide.
    pub language: Option<String>,
    /// Voice-detection sensitivity, 1 (least) to 5 (most).
    #[serde(default = "default_sensitivity")]
    pub vad_sensitivity: u8,
    /// Streaming chunk duration in milliseconds.
    #[serde(default = "default_chunk_ms")]
    pub chunk_ms: u64,
    /// Baseline natural-pause wait in milliseconds.
    #[serde(default = "default_pause_base_ms")]
    pub pause_base_ms: u64,
}

fn default_sensitivity() -> u8 {
    3
}

fn default_chunk_ms() -> u64 {
    800
}

fn default_pause_base_ms() -> u64 {
    1_500
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_path: None,
            language: None,
            vad_sensitivity: default_sensitivity(),
            chunk_ms: default_chunk_ms(),
            pause_base_ms: default_pause_base_ms(),
        }
    }
}

impl Settings {
    /// Load settings from the settings file, or return defaults if not found
    pub fn load() -> Self {
        let Some(path) = PathManager::settings_path() else {
            return Self::default();
        };

        let Ok(content) = fs::read_to_string(&path) else {
            return Self::default();
        };

        toml::from_str(&content).unwrap_or_default()
    }

    /// Save settings to the settings file
    pub fn save(&self) -> Result<(), String> {
        let path = PathManager::settings_path().ok_or("Could not determine settings path")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| format!("Failed to create config dir: {}", e))?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;
        fs::write(&path, content).map_err(|e| format!("Failed to write settings: {}", e))?;
        Ok(())
    }

    /// Resolved model path: the explicit setting or the managed default.
    pub fn resolved_model_path(&self) -> Option<PathBuf> {
        self.model_path
            .clone()
            .or_else(PathManager::default_model_path)
    }
}
