//! Persisted user settings.
//!
//! The settings file holds the inference credential so it does not have to be
//! exported in every shell. It is a small JSON document:
//!
//! ```json
//! { "api_key": "sk-..." }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{StripError, StripResult};

/// Environment variable that overrides the settings file location.
pub const SETTINGS_ENV: &str = "STRIP_SETTINGS";

const APP_DIR: &str = "water-strip-analyzer";
const FILE_NAME: &str = "settings.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Settings {
    /// `$STRIP_SETTINGS`, else `<config_dir>/water-strip-analyzer/settings.json`.
    pub fn default_path() -> StripResult<PathBuf> {
        if let Some(path) = std::env::var_os(SETTINGS_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR).join(FILE_NAME))
            .ok_or_else(|| {
                StripError::config("settings_path", "<none>", "no user config directory")
                    .with_recovery_suggestion(format!("Set {} to a writable file path", SETTINGS_ENV))
            })
    }

    /// Load settings; a missing file yields defaults.
    pub fn load(path: &Path) -> StripResult<Self> {
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let settings = serde_json::from_str(&text)
                    .map_err(|e| StripError::from(e).with_context(format!("reading {}", path.display())))?;
                debug!(path = %path.display(), "loaded settings");
                Ok(settings)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(StripError::io_at("read settings", path, e)),
        }
    }

    /// Write settings, creating parent directories as needed.
    pub fn save(&self, path: &Path) -> StripResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StripError::io_at("create settings directory", parent, e))?;
        }
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text).map_err(|e| StripError::io_at("write settings", path, e))?;
        debug!(path = %path.display(), "saved settings");
        Ok(())
    }

    /// The key with everything but the last four characters hidden.
    ///
    /// Keys of eight characters or fewer are hidden entirely.
    pub fn masked_key(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| {
            let chars: Vec<char> = key.chars().collect();
            let shown = if chars.len() > 8 { 4 } else { 0 };
            let hidden = (chars.len() - shown).max(4);
            let tail: String = chars[chars.len() - shown..].iter().collect();
            format!("{}{}", "*".repeat(hidden), tail)
        })
    }
}
