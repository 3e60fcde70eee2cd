// SPDX-License-Identifier: MIT

//! Engine configuration - YAML file loading, defaults and validation
//!
//! Every section is optional. Environment variables `MODEL_NAME` and
//! `OPENAI_BASE_URL` override the file when set.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::adk::error::{Result, VireError};
use crate::vire::workflow::branch::DEFAULT_MAX_TOOL_CYCLES;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelSettings {
    pub model_name: String,
    pub base_url: Option<String>,
    pub temperature: Option<f32>,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_name: "gpt-4o-mini".to_string(),
            base_url: None,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Model/tool cycles allowed per branch before final reasoning is forced
    pub max_tool_cycles: u32,
    /// Fan-in deadline for all branches together
    pub branch_timeout_secs: u64,
    pub tool_timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_tool_cycles: DEFAULT_MAX_TOOL_CYCLES,
            branch_timeout_secs: 180,
            tool_timeout_secs: 60,
        }
    }
}

impl EngineSettings {
    pub fn branch_timeout(&self) -> Duration {
        Duration::from_secs(self.branch_timeout_secs)
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolSettings {
    pub wikipedia_top_k: usize,
    pub arxiv_max_results: usize,
    pub max_snippet_chars: usize,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            wikipedia_top_k: 3,
            arxiv_max_results: 3,
            max_snippet_chars: 2000,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VireConfig {
    pub model: ModelSettings,
    pub engine: EngineSettings,
    pub tools: ToolSettings,
    /// Directory for JSON checkpoints; in-memory checkpoints when unset
    pub checkpoint_dir: Option<PathBuf>,
}

impl VireConfig {
    pub fn validate(&self) -> Result<()> {
        if self.engine.max_tool_cycles < 1 {
            return Err(VireError::config("engine.max_tool_cycles must be at least 1"));
        }
        if self.engine.branch_timeout_secs == 0 {
            return Err(VireError::config("engine.branch_timeout_secs must be positive"));
        }
        if self.engine.tool_timeout_secs == 0 {
            return Err(VireError::config("engine.tool_timeout_secs must be positive"));
        }
        if self.model.model_name.trim().is_empty() {
            return Err(VireError::config("model.model_name must not be empty"));
        }
        Ok(())
    }

    /// Replace model settings with explicit overrides where given
    pub fn apply_overrides(&mut self, model_name: Option<String>, base_url: Option<String>) {
        if let Some(name) = model_name.filter(|n| !n.trim().is_empty()) {
            self.model.model_name = name;
        }
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.model.base_url = Some(url);
        }
    }
}

/// Loads [`VireConfig`] from YAML
pub struct ConfigLoader;

impl ConfigLoader {
    pub fn new() -> Self {
        Self
    }

    /// Load from `path`, or defaults when `None`, then apply the environment
    pub fn load(&self, path: Option<&Path>) -> Result<VireConfig> {
        let mut config = match path {
            Some(path) => {
                log::info!("Loading configuration from {}", path.display());
                let content = fs::read_to_string(path)?;
                Self::parse_yaml(&content)?
            }
            None => VireConfig::default(),
        };
        config.apply_overrides(
            std::env::var("MODEL_NAME").ok(),
            std::env::var("OPENAI_BASE_URL").ok(),
        );
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a configuration from a YAML string
    pub fn parse_yaml(content: &str) -> Result<VireConfig> {
        if content.trim().is_empty() {
            return Ok(VireConfig::default());
        }
        let config: VireConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
model:
  model_name: gpt-4o
  base_url: http://localhost:8000/v1
  temperature: 0.2
engine:
  max_tool_cycles: 3
  branch_timeout_secs: 90
  tool_timeout_secs: 20
tools:
  wikipedia_top_k: 2
  arxiv_max_results: 1
  max_snippet_chars: 500
checkpoint_dir: .vire/checkpoints
"#;
        let config = ConfigLoader::parse_yaml(yaml).unwrap();
        assert_eq!(config.model.model_name, "gpt-4o");
        assert_eq!(config.model.base_url.as_deref(), Some("http://localhost:8000/v1"));
        assert_eq!(config.engine.max_tool_cycles, 3);
        assert_eq!(config.engine.branch_timeout(), Duration::from_secs(90));
        assert_eq!(config.tools.max_snippet_chars, 500);
        assert_eq!(
            config.checkpoint_dir,
            Some(PathBuf::from(".vire/checkpoints"))
        );
    }

    #[test]
    fn test_missing_sections_take_defaults() {
        let config = ConfigLoader::parse_yaml("engine:\n  max_tool_cycles: 2\n").unwrap();
        assert_eq!(config.engine.max_tool_cycles, 2);
        assert_eq!(config.engine.tool_timeout_secs, 60);
        assert_eq!(config.model, ModelSettings::default());
        assert_eq!(config.tools, ToolSettings::default());
        assert!(config.checkpoint_dir.is_none());
    }

    #[test]
    fn test_empty_file_is_default() {
        let config = ConfigLoader::parse_yaml("").unwrap();
        assert_eq!(config, VireConfig::default());
        assert_eq!(config.engine.max_tool_cycles, 5);
    }

    #[test]
    fn test_zero_step_bound_is_rejected() {
        let err = ConfigLoader::parse_yaml("engine:\n  max_tool_cycles: 0\n").unwrap_err();
        assert!(matches!(err, VireError::Config(_)));
    }

    #[test]
    fn test_unparseable_yaml_is_yaml_error() {
        let err = ConfigLoader::parse_yaml("engine: [unclosed").unwrap_err();
        assert!(matches!(err, VireError::Yaml(_)));
    }

    #[test]
    fn test_overrides_ignore_blank_values() {
        let mut config = VireConfig::default();
        config.apply_overrides(Some("  ".to_string()), Some("http://proxy/v1".to_string()));
        assert_eq!(config.model.model_name, "gpt-4o-mini");
        assert_eq!(config.model.base_url.as_deref(), Some("http://proxy/v1"));
    }
}
