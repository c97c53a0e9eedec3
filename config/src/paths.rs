use std::path::PathBuf;

/// Well-known locations for settings and models.
pub struct PathManager;

impl PathManager {
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("voxtask"))
    }

    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("voxtask"))
    }

    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|d| d.join("settings.toml"))
    }

    pub fn models_dir() -> Option<PathBuf> {
        Self::data_dir().map(|d| d.join("models"))
    }

    /// Default Whisper model location.
    pub fn default_model_path() -> Option<PathBuf> {
        Self::models_dir().map(|d| d.join("ggml-base.en.bin"))
    }

    pub fn ensure_dirs_exist() -> std::io::Result<()> {
        for dir in [Self::config_dir(), Self::data_dir(), Self::models_dir()]
            .into_iter()
            .flatten()
        {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
