//! Configuration management for nipbot.
//!
//! Loads configuration from ${NIPBOT_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::prompts::SYSTEM_INSTRUCTION;

/// Returns the default config template with comments.
///
/// This is embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}

pub mod paths {
    //! Path resolution for nipbot configuration and data directories.
    //!
    //! NIPBOT_HOME resolution order:
    //! 1. NIPBOT_HOME environment variable (if set)
    //! 2. ~/.config/nipbot (default)

    use std::path::PathBuf;

    /// Returns the nipbot home directory.
    pub fn nipbot_home() -> PathBuf {
        if let Ok(home) = std::env::var("NIPBOT_HOME")
            && !home.trim().is_empty()
        {
            return PathBuf::from(home);
        }

        dirs::home_dir().map_or_else(
            || PathBuf::from(".nipbot"),
            |h| h.join(".config").join("nipbot"),
        )
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        nipbot_home().join("config.toml")
    }

    /// Returns the default log directory.
    pub fn logs_dir() -> PathBuf {
        nipbot_home().join("logs")
    }
}

/// Grounding citation filtering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundingConfig {
    /// Citations survive only if their URI mentions one of these domains.
    pub allowed_domains: Vec<String>,
    /// Title used when a citation arrives without one.
    pub fallback_title: String,
}

impl Default for GroundingConfig {
    fn default() -> Self {
        Self {
            allowed_domains: vec!["kdca.go.kr".to_string(), "nip.kdca.go.kr".to_string()],
            fallback_title: "질병관리청 공식 정보".to_string(),
        }
    }
}

/// Table image export settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Output directory for `NIP-Table-*.png` files.
    pub output_dir: Option<String>,
    /// Font file used to draw cell text.
    pub font_path: Option<String>,
}

impl ExportConfig {
    pub fn effective_output_dir(&self) -> PathBuf {
        self.output_dir
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map_or_else(|| PathBuf::from("."), PathBuf::from)
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when RUST_LOG is not set.
    pub level: String,
    /// Log directory (defaults to $NIPBOT_HOME/logs).
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl LoggingConfig {
    pub fn effective_directory(&self) -> PathBuf {
        self.directory
            .as_deref()
            .map(str::trim)
            .filter(|dir| !dir.is_empty())
            .map_or_else(paths::logs_dir, PathBuf::from)
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// The Gemini model to use
    pub model: String,

    /// API key (falls back to environment variables)
    pub api_key: Option<String>,

    /// Base URL override for the Generative Language API
    pub base_url: Option<String>,

    /// Attach the Google Search grounding tool
    pub web_search: bool,

    /// Maximum output tokens (provider default when unset)
    pub max_output_tokens: Option<u32>,

    /// Sampling temperature (provider default when unset)
    pub temperature: Option<f32>,

    /// Optional inline system prompt
    pub system_prompt: Option<String>,

    /// Optional path to a file containing the system prompt
    pub system_prompt_file: Option<String>,

    #[serde(default)]
    pub grounding: GroundingConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

    /// Loads configuration from the default config path.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Returns the system instruction: prompt file, then inline prompt, then the
    /// bundled NIP instruction.
    pub fn effective_system_prompt(&self) -> Result<String> {
        if let Some(path_str) = &self.system_prompt_file {
            let path = Path::new(path_str);
            let content = fs::read_to_string(path)
                .with_context(|| format!("Failed to read system prompt file: {path_str}"))?;
            let trimmed = content.trim();
            if !trimmed.is_empty() {
                return Ok(trimmed.to_string());
            }
        }

        let inline = self.system_prompt.as_deref().unwrap_or("").trim();
        if inline.is_empty() {
            Ok(SYSTEM_INSTRUCTION.trim().to_string())
        } else {
            Ok(inline.to_string())
        }
    }

    /// Creates a default config file at the given path.
    /// Returns an error if the file already exists.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            anyhow::bail!("Config file already exists at {}", path.display());
        }

        Self::write_config(path, default_config_template())
    }

    /// Writes config content to a file, creating parent directories as needed.
    /// Uses atomic write (temp file + rename) to prevent corruption.
    fn write_config(path: &Path, content: &str) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let tmp_path = path.with_extension("toml.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write config to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                tmp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            model: Self::DEFAULT_MODEL.to_string(),
            api_key: None,
            base_url: None,
            web_search: true,
            max_output_tokens: None,
            temperature: None,
            system_prompt: None,
            system_prompt_file: None,
            grounding: GroundingConfig::default(),
            export: ExportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}
