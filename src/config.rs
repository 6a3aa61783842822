use crate::client::DEFAULT_MAX_DIAGRAM_NODES;
use crate::diagram::{DEFAULT_BACKGROUND, ExportOptions};
use crate::log_debug;

use anyhow::{Context, Result, anyhow};
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Environment variables checked for an API key, in order
pub const API_KEY_ENV_VARS: &[&str] = &["GEMINI_API_KEY", "GOOGLE_API_KEY"];

/// Default Gemini model
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Default Gemini REST endpoint
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Configuration structure for codeflow
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct Config {
    /// Model provider settings
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Analysis request settings
    #[serde(default)]
    pub analysis: AnalysisConfig,
    /// Diagram export settings
    #[serde(default)]
    pub export: ExportConfig,
    /// Connectivity probe settings
    #[serde(default)]
    pub connectivity: ConnectivityConfig,
    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Provider-specific configuration structure
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ProviderConfig {
    /// API key for the provider
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    /// Model used for analysis and code extraction
    #[serde(default = "default_model")]
    pub model: String,
    /// Base URL of the REST API
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Extra `generationConfig` parameters sent verbatim
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub additional_params: HashMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            endpoint: default_endpoint(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            additional_params: HashMap::new(),
        }
    }
}

/// Analysis request configuration
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Wall-clock budget for one analysis
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Cap on flowchart nodes requested from the model
    #[serde(default = "default_max_diagram_nodes")]
    pub max_diagram_nodes: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout_seconds(),
            max_diagram_nodes: default_max_diagram_nodes(),
        }
    }
}

/// Diagram export configuration
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct ExportConfig {
    /// Background color painted behind the diagram
    #[serde(default = "default_background")]
    pub background: String,
    /// Directory exported files are written to
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            background: default_background(),
            output_dir: default_output_dir(),
        }
    }
}

/// Connectivity probe configuration
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct ConnectivityConfig {
    /// Whether to probe at all; when disabled the network is assumed up
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// `host:port` to open TCP connections to
    #[serde(default = "default_probe_host")]
    pub probe_host: String,
    #[serde(default = "default_probe_interval_seconds")]
    pub probe_interval_seconds: u64,
}

impl Default for ConnectivityConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            probe_host: default_probe_host(),
            probe_interval_seconds: default_probe_interval_seconds(),
        }
    }
}

/// Logging configuration
#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Whether to enable verbose logging (includes HTTP requests/responses)
    #[serde(default)]
    pub verbose_logging: bool,
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_output_tokens() -> u32 {
    4096
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_max_diagram_nodes() -> usize {
    DEFAULT_MAX_DIAGRAM_NODES
}

fn default_background() -> String {
    DEFAULT_BACKGROUND.to_string()
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_probe_host() -> String {
    "generativelanguage.googleapis.com:443".to_string()
}

fn default_probe_interval_seconds() -> u64 {
    5
}

impl Config {
    /// Load the configuration from the user config file, then apply
    /// environment overrides
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides();
        log_debug!("Configuration loaded from {}", config_path.display());
        Ok(config)
    }

    /// Load a configuration file; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        let config: Self = toml::from_str(&content).map_err(|e| {
            anyhow!(
                "Invalid configuration file format: {}. Please check '{}' for syntax errors.",
                e,
                path.display()
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(path, config_content)
            .with_context(|| format!("Failed to write config file '{}'", path.display()))?;
        log_debug!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Get the path to the configuration file
    pub fn get_config_path() -> Result<PathBuf> {
        let mut path =
            config_dir().ok_or_else(|| anyhow!("Unable to determine config directory"))?;
        path.push("codeflow");
        std::fs::create_dir_all(&path)?;
        path.push("config.toml");
        Ok(path)
    }

    /// Fill an empty API key from the environment
    pub fn apply_env_overrides(&mut self) {
        self.apply_api_key_from(|name| std::env::var(name).ok());
    }

    /// Fill an empty API key from the first non-blank variable in
    /// [`API_KEY_ENV_VARS`], as reported by `lookup`
    pub fn apply_api_key_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if !self.provider.api_key.is_empty() {
            return;
        }
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| lookup(name))
            .find(|value| !value.trim().is_empty())
        {
            log_debug!("Using API key from environment");
            self.provider.api_key = key.trim().to_string();
        }
    }

    /// Check values that would otherwise fail later at request time
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.provider.endpoint)
            .with_context(|| format!("Invalid provider endpoint '{}'", self.provider.endpoint))?;
        if self.provider.model.trim().is_empty() {
            return Err(anyhow!("Provider model must not be empty"));
        }
        if self.analysis.timeout_seconds == 0 {
            return Err(anyhow!("Analysis timeout must be at least one second"));
        }
        Ok(())
    }

    /// Update the configuration with new values
    pub fn update(
        &mut self,
        api_key: Option<String>,
        model: Option<String>,
        timeout_seconds: Option<u64>,
        max_diagram_nodes: Option<usize>,
        output_dir: Option<PathBuf>,
        additional_params: Option<HashMap<String, String>>,
    ) -> Result<()> {
        if let Some(key) = api_key {
            self.provider.api_key = key;
        }
        if let Some(model) = model {
            self.provider.model = model;
        }
        if let Some(timeout) = timeout_seconds {
            self.analysis.timeout_seconds = timeout;
        }
        if let Some(nodes) = max_diagram_nodes {
            self.analysis.max_diagram_nodes = nodes;
        }
        if let Some(dir) = output_dir {
            self.export.output_dir = dir;
        }
        if let Some(params) = additional_params {
            self.provider.additional_params.extend(params);
        }

        self.validate()?;
        log_debug!("Configuration updated");
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.analysis.timeout_seconds)
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.connectivity.probe_interval_seconds.max(1))
    }

    pub fn export_options(&self) -> ExportOptions {
        ExportOptions {
            background: self.export.background.clone(),
            output_dir: self.export.output_dir.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.provider.model, DEFAULT_MODEL);
        assert_eq!(config.analysis.timeout_seconds, 30);
        assert_eq!(config.export.background, "#ffffff");
        assert!(config.connectivity.enabled);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[analysis]\ntimeout_seconds = 10\n")
            .expect("partial config should parse");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.analysis.max_diagram_nodes, DEFAULT_MAX_DIAGRAM_NODES);
        assert_eq!(config.provider.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_update_rejects_zero_timeout() {
        let mut config = Config::default();
        assert!(
            config
                .update(None, None, Some(0), None, None, None)
                .is_err()
        );
    }
}
