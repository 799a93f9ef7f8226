//! Configuration management for gifcast

use anyhow::{Context, Result};
use rdev::Key;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::input::Modifier;

/// Highest accepted capture rate
pub const MAX_FPS: u32 = 60;
/// Longest accepted recording, ten minutes
pub const MAX_DURATION_SECS: u64 = 600;

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Recording configuration
    #[serde(default)]
    pub recording: RecordingConfig,

    /// Region selection configuration
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Global start/stop hotkey
    #[serde(default)]
    pub hotkey: HotkeyConfig,

    /// What happens to a finished recording
    #[serde(default)]
    pub output: OutputConfig,

    /// Path to config file (not serialized)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Capture rate, also the playback rate of the GIF
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Recording stops on its own after this many seconds
    #[serde(default = "default_max_duration_secs")]
    pub max_duration_secs: u64,

    /// 0 loops forever
    #[serde(default)]
    pub loop_count: u16,

    /// Save a recording that caught a single frame as a PNG
    #[serde(default = "default_true")]
    pub still_for_single_frame: bool,

    /// Where recordings are saved (platform data dir when unset)
    #[serde(default)]
    pub output_directory: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Drags narrower and shorter than this many points cancel the selection
    #[serde(default = "default_min_size_points")]
    pub min_size_points: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HotkeyConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// rdev key name, e.g. "Num6" or "F9"
    #[serde(default = "default_hotkey_key")]
    pub key: Key,

    #[serde(default = "default_hotkey_modifiers")]
    pub modifiers: Vec<Modifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Put the saved file's path on the clipboard
    #[serde(default = "default_true")]
    pub copy_to_clipboard: bool,

    /// Show a desktop notification once saved
    #[serde(default = "default_true")]
    pub notify: bool,
}

// Default value functions
fn default_fps() -> u32 {
    15
}

fn default_max_duration_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_min_size_points() -> f64 {
    2.0
}

fn default_hotkey_key() -> Key {
    Key::Num6
}

fn default_hotkey_modifiers() -> Vec<Modifier> {
    vec![Modifier::Meta, Modifier::Shift]
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            fps: default_fps(),
            max_duration_secs: default_max_duration_secs(),
            loop_count: 0,
            still_for_single_frame: true,
            output_directory: None,
        }
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            min_size_points: default_min_size_points(),
        }
    }
}

impl Default for HotkeyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            key: default_hotkey_key(),
            modifiers: default_hotkey_modifiers(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            copy_to_clipboard: true,
            notify: true,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            recording: RecordingConfig::default(),
            selection: SelectionConfig::default(),
            hotkey: HotkeyConfig::default(),
            output: OutputConfig::default(),
            config_path: None,
        }
    }
}

impl RecordingConfig {
    pub fn max_duration(&self) -> Duration {
        Duration::from_secs(self.max_duration_secs)
    }
}

impl Config {
    /// Load configuration from default location or create default
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path()?)
    }

    /// Load configuration from a specific file, writing defaults there if
    /// it doesn't exist yet
    pub fn load_from(path: &Path) -> Result<Self> {
        let config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;

            let mut config: Config = toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;

            config.config_path = Some(path.to_path_buf());
            config
        } else {
            // Create default config
            let config = Config {
                config_path: Some(path.to_path_buf()),
                ..Config::default()
            };
            config.save()?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = self.config_path()?;

        // Ensure parent directory exists
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;

        Ok(())
    }

    /// Reject values the recorder can't work with
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            (1..=MAX_FPS).contains(&self.recording.fps),
            "recording.fps must be between 1 and {}",
            MAX_FPS
        );
        anyhow::ensure!(
            (1..=MAX_DURATION_SECS).contains(&self.recording.max_duration_secs),
            "recording.max_duration_secs must be between 1 and {}",
            MAX_DURATION_SECS
        );
        anyhow::ensure!(
            self.selection.min_size_points >= 0.0,
            "selection.min_size_points must not be negative"
        );
        Ok(())
    }

    /// Get the config file path
    pub fn config_path(&self) -> Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_config_path(),
        }
    }

    /// Directory recordings are saved into
    pub fn output_directory(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.recording.output_directory {
            return Ok(dir.clone());
        }
        let proj_dirs = Self::project_dirs()?;
        Ok(proj_dirs.data_dir().join("GifCast"))
    }

    fn project_dirs() -> Result<directories::ProjectDirs> {
        directories::ProjectDirs::from("dev", "gifcast", "gifcast")
            .context("Failed to determine config directory")
    }

    /// Get default config path
    fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }
}
