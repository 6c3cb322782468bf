//! Pipeline configuration (mcl.toml)
//!
//! ```toml
//! [pipeline]
//! global_optimizer = true
//! peephole = true
//! semantic_pass = true
//!
//! [output]
//! format = "text"   # or "json"
//! ```
//!
//! Every key is optional.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIG_FILE: &str = "mcl.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

/// Which optional stages run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Constant folding/propagation before code generation
    #[serde(default = "enabled")]
    pub global_optimizer: bool,

    /// Peephole pass over P-code
    #[serde(default = "enabled")]
    pub peephole: bool,

    /// Standalone semantic analysis after parsing
    #[serde(default = "enabled")]
    pub semantic_pass: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            global_optimizer: true,
            peephole: true,
            semantic_pass: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn enabled() -> bool {
    true
}

impl Config {
    /// Parse a configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config {
            message: format!("Failed to parse {}: {}", CONFIG_FILE, e),
        })
    }

    /// Load a configuration from a file path
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::from_str(&content)
    }

    /// `dir/mcl.toml` if it exists, otherwise defaults
    pub fn discover(dir: &Path) -> Result<(Self, Option<PathBuf>)> {
        let path = dir.join(CONFIG_FILE);
        if path.is_file() {
            let config = Self::from_file(&path)?;
            tracing::debug!(path = %path.display(), "loaded configuration");
            return Ok((config, Some(path)));
        }
        Ok((Self::default(), None))
    }

    /// Serialize to a TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config {
            message: format!("Failed to serialize configuration: {}", e),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.pipeline.global_optimizer);
        assert!(config.pipeline.peephole);
        assert!(config.pipeline.semantic_pass);
        assert_eq!(config.output.format, OutputFormat::Text);
    }

    #[test]
    fn test_partial_config() {
        let toml = r#"
[pipeline]
peephole = false

[output]
format = "json"
"#;
        let config = Config::from_str(toml).unwrap();
        assert!(config.pipeline.global_optimizer);
        assert!(!config.pipeline.peephole);
        assert_eq!(config.output.format, OutputFormat::Json);
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        let err = Config::from_str("[output]\nformat = \"xml\"\n").unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(matches!(Config::from_str("[pipeline]\nfold = true\n"), Err(Error::Config { .. })));
        assert!(matches!(Config::from_str("[pipeline"), Err(Error::Config { .. })));
    }

    #[test]
    fn test_round_trip_through_toml() {
        let mut config = Config::default();
        config.pipeline.semantic_pass = false;
        let text = config.to_toml().unwrap();
        assert_eq!(Config::from_str(&text).unwrap(), config);
    }

    #[test]
    fn test_from_file_and_discover() {
        let dir = tempfile::tempdir().unwrap();
        let (config, path) = Config::discover(dir.path()).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.is_none());

        std::fs::write(dir.path().join(CONFIG_FILE), "[pipeline]\nglobal_optimizer = false\n").unwrap();
        let (config, path) = Config::discover(dir.path()).unwrap();
        assert!(!config.pipeline.global_optimizer);
        assert_eq!(path, Some(dir.path().join(CONFIG_FILE)));

        let missing = Config::from_file(&dir.path().join("nope.toml"));
        assert!(matches!(missing, Err(Error::Config { .. })));
    }
}
