//! Configuration for the aria voice client

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;

use crate::live::DEFAULT_ENDPOINT;
use crate::transcript::DEFAULT_TRANSCRIPT_CAPACITY;
use crate::{Error, Result};

/// Default model identifier for live audio sessions
const DEFAULT_MODEL: &str = "models/gemini-2.5-flash-native-audio-preview-12-2025";

/// Default prebuilt voice
const DEFAULT_VOICE: &str = "Charon";

/// Environment variable read for the API key by default
const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";

/// Client configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Target model identifier
    pub model: String,

    /// Prebuilt voice for synthesized audio
    pub voice: String,

    /// System instruction sent at session setup
    pub system_instruction: String,

    /// Live endpoint URL
    pub endpoint: String,

    /// Name of the environment variable holding the API key
    pub api_key_env: String,

    /// Transcript entries retained before eviction
    pub transcript_capacity: usize,

    /// Override path for the memory fact store
    pub memory_path: Option<PathBuf>,

    /// Audio device configuration
    pub audio: AudioConfig,
}

/// Audio device configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Acquire microphone and speaker; disable on headless hosts
    pub enabled: bool,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            voice: DEFAULT_VOICE.to_string(),
            system_instruction: "You are Aria, a capable and courteous voice concierge. \
                You have a long-term memory bank and several tools. Use memory_save to \
                remember important user preferences or facts, and memory_list to recall \
                them. Be proactive, concise, and helpful."
                .to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            transcript_capacity: DEFAULT_TRANSCRIPT_CAPACITY,
            memory_path: None,
            audio: AudioConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from an explicit path or the platform config dir
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let resolved = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::project_dirs().map(|dirs| dirs.config_dir().join("aria.toml")),
        };

        let Some(resolved) = resolved else {
            return Ok(Self::default());
        };

        if !resolved.exists() {
            tracing::debug!(path = %resolved.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(&resolved)?;
        let config: Self = toml::from_str(&raw)?;
        tracing::debug!(path = %resolved.display(), "configuration loaded");
        Ok(config)
    }

    /// Resolve the API key from the configured environment variable
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if the variable is unset or empty
    pub fn api_key(&self) -> Result<String> {
        match std::env::var(&self.api_key_env) {
            Ok(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::Config(format!(
                "API key not found; set {}",
                self.api_key_env
            ))),
        }
    }

    /// Path of the memory fact store
    #[must_use]
    pub fn memory_path(&self) -> PathBuf {
        self.memory_path.clone().unwrap_or_else(|| {
            Self::project_dirs().map_or_else(
                || PathBuf::from("memories.json"),
                |dirs| dirs.data_dir().join("memories.json"),
            )
        })
    }

    fn project_dirs() -> Option<ProjectDirs> {
        ProjectDirs::from("dev", "omni", "aria")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sensible() {
        let config = Config::default();
        assert_eq!(config.voice, "Charon");
        assert_eq!(config.transcript_capacity, 50);
        assert!(config.audio.enabled);
    }

    #[test]
    fn partial_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aria.toml");
        std::fs::write(&path, "voice = \"Kore\"\n[audio]\nenabled = false\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.voice, "Kore");
        assert!(!config.audio.enabled);
        // Untouched fields keep their defaults
        assert_eq!(config.api_key_env, "GEMINI_API_KEY");
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(config.voice, "Charon");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aria.toml");
        std::fs::write(&path, "voice = [broken").unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
