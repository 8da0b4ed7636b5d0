use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;

use crate::error::{EngineError, EngineResult};
use crate::models::settings::EngineSettings;

const SETTINGS_FILE: &str = "settings.toml";

/// Reads and writes [`EngineSettings`] as a TOML file.
pub struct SettingsService {
    path: PathBuf,
}

impl SettingsService {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `settings.toml` in the platform config directory.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "KenBoyle", "CalendarEngine")
            .map(|dirs| dirs.config_dir().join(SETTINGS_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the settings; a missing file yields the defaults.
    pub fn load(&self) -> EngineResult<EngineSettings> {
        if !self.path.exists() {
            log::debug!("No settings at {}; using defaults", self.path.display());
            return Ok(EngineSettings::default());
        }
        let settings = self
            .read()
            .map_err(|e| EngineError::Settings(format!("{:#}", e)))?;
        settings.validate().map_err(EngineError::Settings)?;
        Ok(settings)
    }

    /// Like [`Self::load`], falling back to the defaults on any error.
    pub fn load_or_default(&self) -> EngineSettings {
        self.load().unwrap_or_else(|e| {
            log::warn!("{}; using default settings", e);
            EngineSettings::default()
        })
    }

    pub fn save(&self, settings: &EngineSettings) -> EngineResult<()> {
        settings.validate().map_err(EngineError::Settings)?;
        self.write(settings)
            .map_err(|e| EngineError::Settings(format!("{:#}", e)))?;
        log::info!("Saved settings to {}", self.path.display());
        Ok(())
    }

    fn read(&self) -> Result<EngineSettings> {
        let text = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        toml::from_str(&text).with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn write(&self, settings: &EngineSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(settings).context("Failed to serialize settings")?;
        fs::write(&self.path, text)
            .with_context(|| format!("Failed to write {}", self.path.display()))
    }
}
