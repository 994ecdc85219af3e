//! Tabula Configuration
//!
//! Config file: $XDG_CONFIG_HOME/tabula/config.toml (usually ~/.config/tabula/config.toml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TabulaError;
use crate::llm_client::LlmConfig;

/// Models the agent is known to work with
pub const ALLOWED_MODELS: &[&str] = &["gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];

/// Reject models outside [`ALLOWED_MODELS`].
pub fn validate_model(model: &str) -> std::result::Result<(), TabulaError> {
    if ALLOWED_MODELS.contains(&model) {
        Ok(())
    } else {
        Err(TabulaError::InvalidModel {
            model: model.to_string(),
            allowed: ALLOWED_MODELS.iter().map(|m| m.to_string()).collect(),
        })
    }
}

/// LLM backend section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl LlmSection {
    /// Client config with an already-resolved key
    pub fn to_llm_config(&self, api_key: Option<String>) -> LlmConfig {
        LlmConfig {
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            api_key,
            timeout_secs: self.timeout_secs,
        }
    }
}

/// Answer cache section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Caching is on unless turned off here or per invocation.
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Base path; namespace files are `{path}_{fingerprint}`
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_path() -> PathBuf {
    PathBuf::from(".tabula_cache")
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            path: default_cache_path(),
        }
    }
}

/// Main Tabula configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TabulaConfig {
    #[serde(default)]
    pub llm: LlmSection,

    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub verbose: bool,
}

impl TabulaConfig {
    /// Default user config path
    pub fn user_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().context("Cannot determine config directory")?;
        Ok(config_dir.join("tabula").join("config.toml"))
    }

    /// Load the user config, or defaults when none exists
    pub fn load() -> Result<Self> {
        match Self::user_config_path() {
            Ok(path) if path.exists() => Self::load_from(&path),
            _ => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: TabulaConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        validate_model(&config.llm.model)?;
        Ok(config)
    }

    /// API key from the configured environment variable
    pub fn api_key_from_env(&self) -> Option<String> {
        std::env::var(&self.llm.api_key_env)
            .ok()
            .filter(|k| !k.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = TabulaConfig::default();
        assert!(config.cache.enabled);
        assert_eq!(config.cache.path, PathBuf::from(".tabula_cache"));
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert!(!config.verbose);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[cache]\nenabled = false\n\n[llm]\nmodel = \"gpt-4-turbo\"\n").unwrap();

        let config = TabulaConfig::load_from(&path).unwrap();
        assert!(!config.cache.enabled);
        assert_eq!(config.cache.path, PathBuf::from(".tabula_cache"));
        assert_eq!(config.llm.model, "gpt-4-turbo");
        assert_eq!(config.llm.timeout_secs, 60);
    }

    #[test]
    fn test_unsupported_model_in_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[llm]\nmodel = \"gpt-100\"\n").unwrap();

        let err = TabulaConfig::load_from(&path).unwrap_err();
        assert!(err.to_string().contains("Invalid model: gpt-100"));
    }

    #[test]
    fn test_validate_model() {
        for model in ALLOWED_MODELS {
            assert!(validate_model(model).is_ok());
        }
        assert!(validate_model("gpt-100").is_err());
    }

    #[test]
    fn test_to_llm_config() {
        let llm = LlmSection::default().to_llm_config(Some("sk-test".to_string()));
        assert_eq!(llm.model, "gpt-4o");
        assert_eq!(llm.api_key.as_deref(), Some("sk-test"));
    }
}
