//! Application configuration
//!
//! Read once at startup from TOML. Every section is optional; anything left
//! out takes its default.

use crate::llm::LLMConfig;
use crate::messages::HistoryConfig;
use crate::speech::{CaptureConfig, SpeechConfig};
use crate::{MentrisError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "MENTRIS_CONFIG";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LLMConfig,
    pub history: HistoryConfig,
    pub stt: CaptureConfig,
    pub tts: SpeechConfig,

    /// Offer the voice button
    pub enable_voice_input: bool,

    /// Speak replies to voice turns
    pub enable_voice_output: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            llm: LLMConfig::default(),
            history: HistoryConfig::default(),
            stt: CaptureConfig::default(),
            tts: SpeechConfig::default(),
            enable_voice_input: true,
            enable_voice_output: true,
        }
    }
}

impl AppConfig {
    /// `$MENTRIS_CONFIG`, else `<config dir>/mentris/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Some(PathBuf::from(path));
        }
        dirs::config_dir().map(|dir| dir.join("mentris").join("config.toml"))
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load `path`; a missing file means defaults, a malformed one is an error
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)?;
        let config = Self::from_toml(&text)
            .map_err(|e| MentrisError::ConfigError(format!("{}: {}", path.display(), e)))?;
        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| MentrisError::ConfigError(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| MentrisError::ConfigError(e.to_string()))
    }

    pub fn with_llm(mut self, llm: LLMConfig) -> Self {
        self.llm = llm;
        self
    }

    pub fn with_history(mut self, history: HistoryConfig) -> Self {
        self.history = history;
        self
    }

    /// Text-only mode: no voice button
    pub fn without_voice_input(mut self) -> Self {
        self.enable_voice_input = false;
        self
    }

    /// Never speak replies
    pub fn without_voice_output(mut self) -> Self {
        self.enable_voice_output = false;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.llm.validate().map_err(MentrisError::ConfigError)?;

        if self.enable_voice_input {
            self.check_voice_input()?;
        }
        if self.enable_voice_output {
            self.tts.validate().map_err(MentrisError::ConfigError)?;
        }

        Ok(())
    }

    /// Like [`validate`](Self::validate), but a bad voice section only turns
    /// that voice feature off. A bad model section is still an error.
    pub fn into_usable(mut self) -> Result<Self> {
        self.llm.validate().map_err(MentrisError::ConfigError)?;

        if self.enable_voice_input {
            if let Err(e) = self.check_voice_input() {
                warn!("Voice input disabled: {}", e);
                self.enable_voice_input = false;
            }
        }
        if self.enable_voice_output {
            if let Err(e) = self.tts.validate() {
                warn!("Voice output disabled: {}", e);
                self.enable_voice_output = false;
            }
        }

        Ok(self)
    }

    fn check_voice_input(&self) -> Result<()> {
        self.stt.validate().map_err(MentrisError::ConfigError)?;
        if !self.stt.model_path.exists() {
            return Err(MentrisError::ConfigError(format!(
                "Whisper model not found: {:?}",
                self.stt.model_path
            )));
        }
        Ok(())
    }
}
