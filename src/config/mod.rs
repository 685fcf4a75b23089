//! Plugin configuration loading (spec §6 "Plugin configuration").

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginSpec {
    pub name: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSpec {
    pub name: String,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    #[serde(default = "default_true")]
    pub require_ipa: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorParams {
    #[serde(default = "default_cost")]
    pub sub: f32,
    #[serde(default = "default_cost")]
    pub ins: f32,
    #[serde(default = "default_cost")]
    pub del: f32,
}

fn default_cost() -> f32 {
    1.0
}

impl Default for ComparatorParams {
    fn default() -> Self {
        Self {
            sub: default_cost(),
            ins: default_cost(),
            del: default_cost(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparatorSpec {
    pub name: String,
    #[serde(default)]
    pub params: ComparatorParams,
}

/// Top-level plugin configuration (spec §6). `version` must be `1`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub version: u32,
    #[serde(default)]
    pub strict_mode: bool,
    pub backend: BackendSpec,
    pub textref: PluginSpec,
    #[serde(default)]
    pub comparator: Option<ComparatorSpec>,
    #[serde(default)]
    pub preprocessor: Option<PluginSpec>,
    #[serde(default)]
    pub llm: Option<PluginSpec>,
}

impl PipelineConfig {
    /// Loads a config document, detecting YAML vs JSON by content rather
    /// than file extension (callers may hand us bytes from anywhere).
    pub fn from_str(text: &str) -> Result<Self> {
        let config: Self = if looks_like_json(text) {
            serde_json::from_str(text)
                .map_err(|e| PipelineError::config(format!("invalid JSON pipeline config: {e}")))?
        } else {
            serde_yaml::from_str(text)
                .map_err(|e| PipelineError::config(format!("invalid YAML pipeline config: {e}")))?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| PipelineError::config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_str(&text)
    }

    fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(PipelineError::config(format!(
                "unsupported pipeline config version {}",
                self.version
            )));
        }
        Ok(())
    }

    /// A config with the deterministic stub ASR and dictionary TextRef,
    /// suitable as a process default (spec §B.3 supplement).
    pub fn default_stub() -> Self {
        Self {
            version: 1,
            strict_mode: false,
            backend: BackendSpec {
                name: "stub".to_string(),
                params: HashMap::new(),
                require_ipa: true,
            },
            textref: PluginSpec {
                name: "dictionary".to_string(),
                params: HashMap::new(),
            },
            comparator: None,
            preprocessor: None,
            llm: None,
        }
    }
}

fn looks_like_json(text: &str) -> bool {
    text.trim_start().starts_with('{')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_yaml_config() {
        let yaml = r#"
version: 1
backend:
  name: stub
textref:
  name: dictionary
"#;
        let config = PipelineConfig::from_str(yaml).unwrap();
        assert_eq!(config.backend.name, "stub");
        assert!(config.backend.require_ipa);
        assert!(!config.strict_mode);
    }

    #[test]
    fn parses_json_config() {
        let json = r#"{"version":1,"backend":{"name":"whisper","require_ipa":false},"textref":{"name":"dictionary"}}"#;
        let config = PipelineConfig::from_str(json).unwrap();
        assert!(!config.backend.require_ipa);
    }

    #[test]
    fn rejects_unsupported_version() {
        let yaml = "version: 2\nbackend:\n  name: stub\ntextref:\n  name: dictionary\n";
        let err = PipelineConfig::from_str(yaml).unwrap_err();
        assert!(matches!(err, PipelineError::ConfigError { .. }));
    }

    #[test]
    fn default_stub_is_non_strict() {
        let config = PipelineConfig::default_stub();
        assert!(!config.strict_mode);
        assert_eq!(config.textref.name, "dictionary");
    }
}
