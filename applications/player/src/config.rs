//! Player configuration
//!
//! Layered: built-in defaults, then the TOML file, then `FERMATA__`
//! environment variables (`FERMATA__REMOTE__PASSWORD=...`).
use crate::error::{PlayerError, Result};
use fermata_playback::PlaybackConfig;
use fermata_remote::RemoteConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "fermata.toml";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PlayerConfig {
    #[serde(default)]
    pub playback: PlaybackConfig,

    #[serde(default)]
    pub remote: RemoteConfig,

    #[serde(default)]
    pub resume: ResumeSettings,

    #[serde(default)]
    pub library: LibrarySettings,

    #[serde(default)]
    pub backend: BackendSettings,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResumeSettings {
    /// Restore the queue saved at the last clean shutdown
    #[serde(default = "default_resume_enabled")]
    pub enabled: bool,

    #[serde(default = "default_resume_path")]
    pub path: PathBuf,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LibrarySettings {
    /// JSON song library; without one every query resolves to nothing
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// External decode engine child process
    Local,
    /// In-process headless media elements
    #[default]
    Embedded,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendSettings {
    #[serde(default)]
    pub kind: BackendKind,

    /// Decode engine executable, required for the local backend
    #[serde(default)]
    pub decoder: Option<PathBuf>,

    #[serde(default)]
    pub decoder_args: Vec<String>,
}

fn default_resume_enabled() -> bool {
    true
}

fn default_resume_path() -> PathBuf {
    PathBuf::from("./data/queue.bin")
}

impl Default for ResumeSettings {
    fn default() -> Self {
        Self {
            enabled: default_resume_enabled(),
            path: default_resume_path(),
        }
    }
}

impl PlayerConfig {
    /// Load configuration from file and environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(PlayerError::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                settings = settings.add_source(config::File::from(path));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        // Override with environment variables (FERMATA__SECTION__KEY)
        settings = settings.add_source(
            config::Environment::with_prefix("FERMATA")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = settings.build()?.try_deserialize()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.remote.validate()?;

        if self.backend.kind == BackendKind::Local && self.backend.decoder.is_none() {
            return Err(PlayerError::Config(
                "The local backend needs a decode engine (set backend.decoder)".to_string(),
            ));
        }

        if self.playback.previous_restart_threshold < 0.0 {
            return Err(PlayerError::Config(
                "playback.previous_restart_threshold must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}
