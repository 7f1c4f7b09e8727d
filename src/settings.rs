//! Persistent settings for the OpenMobile CLI.
//! Stored in the platform-specific config directory via `directories::ProjectDirs`.
//!
//! Layering: defaults, then `settings.json`, then environment variables, then
//! command-line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::adb::TextInputMode;
use crate::agent::{LoopConfig, DEFAULT_MAX_STEPS};
use crate::model::{
    ApiFlavor, ModelConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_DELAY_SECS, DEFAULT_TIMEOUT_SECS,
};
use crate::vision::{DEFAULT_MAX_DIMENSION, DEFAULT_QUALITY};

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Cannot determine config directory")]
    NoConfigDir,
    #[error("Settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid setting: {0}")]
    Invalid(String),
}

/// Application settings that can be saved and loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSettings {
    /// Model API flavor ("ollama" or "openai")
    pub api: String,
    /// Model API base URL
    pub base_url: String,
    /// Model API key
    pub api_key: String,
    /// Model that decides each step; must accept images
    pub model_name: String,
    /// Model used to locate elements
    pub vision_model_name: String,
    /// ADB device ID (optional)
    pub device_id: String,
    /// Maximum steps per goal
    pub max_steps: u32,
    /// Pause after each action in milliseconds
    pub settle_delay_ms: u64,
    /// Longest side of the screenshot sent to the model
    pub max_image_dimension: u32,
    /// JPEG quality of the screenshot sent to the model
    pub image_quality: u8,
    /// Maximum retries for model requests
    pub max_retries: u32,
    /// Retry delay in seconds
    pub retry_delay: u64,
    /// Model request timeout in seconds
    pub timeout_secs: u64,
    /// Type text through ADB Keyboard instead of `input text`
    pub adb_keyboard: bool,
    /// Where attached screenshots are saved (empty: data directory)
    pub screenshots_dir: String,
    /// Attach the final screenshot to the success report
    pub attach_final_screenshot: bool,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api: ApiFlavor::Ollama.as_str().to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: "EMPTY".to_string(),
            model_name: "llama3.2-vision".to_string(),
            vision_model_name: "llama3.2-vision".to_string(),
            device_id: String::new(),
            max_steps: DEFAULT_MAX_STEPS,
            settle_delay_ms: 2000,
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            image_quality: DEFAULT_QUALITY,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: DEFAULT_RETRY_DELAY_SECS,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            adb_keyboard: false,
            screenshots_dir: String::new(),
            attach_final_screenshot: true,
        }
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "moderras", "openmobile")
}

impl AppSettings {
    /// Get the config directory path.
    pub fn config_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().to_path_buf())
    }

    /// Get the settings file path.
    pub fn settings_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("settings.json"))
    }

    /// Default screenshots directory.
    pub fn default_screenshots_dir() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.data_dir().join("screenshots"))
    }

    /// Load settings from the config file, falling back to defaults.
    pub fn load() -> Self {
        let Some(path) = Self::settings_path() else {
            return Self::default();
        };
        if !path.exists() {
            return Self::default();
        }
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("ignoring settings file: {}", e);
            Self::default()
        })
    }

    /// Load settings from `path`; missing fields take their defaults.
    pub fn load_from(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save settings to the config file.
    pub fn save(&self) -> Result<PathBuf, SettingsError> {
        let path = Self::settings_path().ok_or(SettingsError::NoConfigDir)?;
        self.save_to(&path)?;
        Ok(path)
    }

    /// Write settings to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), SettingsError> {
        let io_err = |source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(io_err)
    }

    /// Overlay `OPENMOBILE_*` and `ADB_DEVICE_ID` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_with(|key| std::env::var(key).ok());
    }

    /// Overlay values from `lookup`. Empty and unparseable values are ignored.
    pub fn apply_env_with(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("OPENMOBILE_API") {
            self.api = v;
        }
        if let Some(v) = get("OPENMOBILE_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = get("OPENMOBILE_API_KEY") {
            self.api_key = v;
        }
        if let Some(v) = get("OPENMOBILE_MODEL") {
            self.model_name = v;
        }
        if let Some(v) = get("OPENMOBILE_VISION_MODEL") {
            self.vision_model_name = v;
        }
        if let Some(v) = get("ADB_DEVICE_ID") {
            self.device_id = v;
        }
        if let Some(v) = get("OPENMOBILE_MAX_STEPS") {
            match v.trim().parse() {
                Ok(n) => self.max_steps = n,
                Err(_) => tracing::warn!(value = %v, "ignoring OPENMOBILE_MAX_STEPS"),
            }
        }
        if let Some(v) = get("OPENMOBILE_SETTLE_MS") {
            match v.trim().parse() {
                Ok(ms) => self.settle_delay_ms = ms,
                Err(_) => tracing::warn!(value = %v, "ignoring OPENMOBILE_SETTLE_MS"),
            }
        }
    }

    /// Parsed API flavor.
    pub fn api_flavor(&self) -> Result<ApiFlavor, SettingsError> {
        self.api.parse().map_err(SettingsError::Invalid)
    }

    /// Device serial, if one is configured.
    pub fn device(&self) -> Option<&str> {
        Some(self.device_id.trim()).filter(|id| !id.is_empty())
    }

    /// Client configuration for the deciding model.
    pub fn model_config(&self) -> Result<ModelConfig, SettingsError> {
        Ok(ModelConfig::default()
            .with_api(self.api_flavor()?)
            .with_base_url(&self.base_url)
            .with_api_key(&self.api_key)
            .with_model_name(&self.model_name)
            .with_max_retries(self.max_retries)
            .with_retry_delay(self.retry_delay)
            .with_timeout(self.timeout_secs))
    }

    /// Client configuration for the element locator.
    pub fn vision_model_config(&self) -> Result<ModelConfig, SettingsError> {
        Ok(self.model_config()?.with_model_name(&self.vision_model_name))
    }

    /// Control loop configuration.
    pub fn loop_config(&self) -> LoopConfig {
        LoopConfig {
            settle_delay: Duration::from_millis(self.settle_delay_ms),
            max_image_dimension: self.max_image_dimension,
            image_quality: self.image_quality,
            attach_final_screenshot: self.attach_final_screenshot,
        }
    }

    /// How text is typed on the device.
    pub fn text_input_mode(&self) -> TextInputMode {
        if self.adb_keyboard {
            TextInputMode::AdbKeyboard
        } else {
            TextInputMode::InputText
        }
    }

    /// Configured screenshots directory, or the default one.
    pub fn screenshots_dir(&self) -> Option<PathBuf> {
        if self.screenshots_dir.trim().is_empty() {
            Self::default_screenshots_dir()
        } else {
            Some(PathBuf::from(&self.screenshots_dir))
        }
    }
}
