use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::sync::api::DEFAULT_BASE_URL;
use crate::views::BoardTiming;

pub const APP_DIR: &str = "quire";

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("~/.local/share"))
        .join(APP_DIR)
}

/// `~/.config/quire/config.json`
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join(APP_DIR)
        .join("config.json")
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct QuireConfig {
    pub api_base_url: String,
    pub data_directory: PathBuf,
    pub debug_logging: bool,
    pub fade_completed_after_secs: u32,
    pub hide_completed_after_secs: u32,
}

impl Default for QuireConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            data_directory: default_data_dir(),
            debug_logging: false,
            fade_completed_after_secs: 3,
            hide_completed_after_secs: 5,
        }
    }
}

impl QuireConfig {
    /// Missing or unreadable config yields defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                log::warn!("Ignoring invalid config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(path, json)
    }

    pub fn board_timing(&self) -> BoardTiming {
        let fade = self.fade_completed_after_secs.min(self.hide_completed_after_secs);
        BoardTiming {
            fade_after: Duration::seconds(fade.into()),
            hide_after: Duration::seconds(self.hide_completed_after_secs.into()),
        }
    }
}
