use crate::config::RunConfig;
use crate::error::PanelError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_DIR: &str = "stylegan-panel";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub poll_interval_ms: u64,
    /// Upper bound on how many numbered outputs a cleanup pass will check.
    pub cleanup_scan_limit: u32,
    pub frame_delay_ms: u32,
    pub animation_file: String,
    pub command_log_file: String,
    pub executable_stem: String,
    pub last_run: RunConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            cleanup_scan_limit: 100_000,
            frame_delay_ms: 100,
            animation_file: "animation.gif".to_string(),
            command_log_file: "command_line.txt".to_string(),
            executable_stem: "stylegan".to_string(),
            last_run: RunConfig::default(),
        }
    }
}

impl Settings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Load from the default location, falling back to defaults.
    pub fn load() -> Self {
        match user_settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Settings>(&contents) {
                Ok(settings) => {
                    log::debug!("Loaded settings from {}", path.display());
                    settings
                }
                Err(e) => {
                    log::warn!("Ignoring malformed settings {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                log::warn!("Could not read settings {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> Result<(), PanelError> {
        let path = user_settings_path()
            .ok_or_else(|| PanelError::Settings("no config directory available".to_string()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), PanelError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| PanelError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|e| PanelError::io(path, e))
    }
}

fn user_settings_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(SETTINGS_DIR).join(SETTINGS_FILE))
}
