//! Configuration management for photo-poet
//!
//! Config stored at: ~/.config/photo-poet/config.json

use poet_types::{ConfigError, OutputFormat, Result, MAX_UPLOAD_MB};
use poet_vision::ai::gemini::DEFAULT_MODEL;
use poet_vision::ToolLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Generative backend to use (gemini, dryrun)
    #[serde(default = "default_backend")]
    pub backend: String,

    /// Model name override
    #[serde(default = "default_model")]
    pub model: String,

    /// API base URL override
    #[serde(default)]
    pub api_base: Option<String>,

    /// Upload size ceiling in bytes
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    /// Analysis tool invocations allowed per poem
    #[serde(default = "default_tool_call_limit")]
    pub tool_call_limit: usize,

    /// Timeout for a single analysis tool invocation
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Timeout for a single backend HTTP request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Default output format (text, json)
    #[serde(default)]
    pub output_format: OutputFormat,
}

fn default_backend() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_upload_bytes() -> u64 {
    MAX_UPLOAD_MB * 1024 * 1024
}

fn default_tool_call_limit() -> usize {
    1
}

fn default_tool_timeout_secs() -> u64 {
    60
}

fn default_request_timeout_secs() -> u64 {
    90
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            model: default_model(),
            api_base: None,
            max_upload_bytes: default_max_upload_bytes(),
            tool_call_limit: default_tool_call_limit(),
            tool_timeout_secs: default_tool_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
            output_format: OutputFormat::default(),
        }
    }
}

impl Config {
    /// Get the config directory path
    pub fn config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(ConfigError::NotFound)?
            .join("photo-poet");
        Ok(config_dir)
    }

    /// Get the config file path
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join("config.json"))
    }

    /// Load config from the default location, or defaults if absent
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn with_backend(mut self, backend: Option<String>) -> Self {
        if let Some(backend) = backend {
            self.backend = backend.to_lowercase();
        }
        self
    }

    pub fn with_model(mut self, model: Option<String>) -> Self {
        if let Some(model) = model {
            self.model = model;
        }
        self
    }

    pub fn tool_limits(&self) -> ToolLimits {
        ToolLimits {
            max_calls: self.tool_call_limit,
            timeout: Duration::from_secs(self.tool_timeout_secs),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl std::fmt::Display for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Photo Poet Configuration")?;
        writeln!(f, "========================")?;
        writeln!(f)?;
        writeln!(f, "Backend:          {}", self.backend)?;
        writeln!(f, "Model:            {}", self.model)?;
        writeln!(
            f,
            "API base:         {}",
            self.api_base.as_deref().unwrap_or("(default)")
        )?;
        writeln!(
            f,
            "Upload limit:     {:.1} MB",
            self.max_upload_bytes as f64 / (1024.0 * 1024.0)
        )?;
        writeln!(f, "Tool call limit:  {}", self.tool_call_limit)?;
        writeln!(f, "Tool timeout:     {}s", self.tool_timeout_secs)?;
        writeln!(f, "Request timeout:  {}s", self.request_timeout_secs)?;
        writeln!(f, "Output format:    {}", self.output_format)?;

        if let Ok(path) = Self::config_path() {
            writeln!(f)?;
            writeln!(f, "Config file:      {}", path.display())?;
        }

        Ok(())
    }
}
