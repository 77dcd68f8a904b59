// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::DEFAULT_PIPELINE_NAME;
use crate::config::registry::DuplicateNamePolicy;
use crate::engine::EmbeddingMode;
use crate::errors::ConfigError;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Declarative definition of a sequential pipeline.
///
/// # Fields
/// * `name` - Pipeline name used in logs and errors (optional, defaults to `pipeline`)
/// * `options` - Registration and embedding behavior (optional)
/// * `steps` - Steps in execution order
///
/// # Example
/// ```yaml
/// name: text
/// options:
///   duplicate_names: rebind
///   embedding: share
/// steps:
///   - name: shout
///     step: change_text_case
///     options:
///       case: upper
///   - name: bracket
///     step: prefix_suffix_adder
///     options:
///       prefix: "["
///       suffix: "]"
/// ```
#[derive(Debug, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_pipeline_name")]
    pub name: String,
    #[serde(default)]
    pub options: PipelineOptions,
    pub steps: Vec<StepConfig>,
}

fn default_pipeline_name() -> String {
    DEFAULT_PIPELINE_NAME.to_string()
}

/// Behavior switches shared by both pipeline flavors.
///
/// # Fields
/// * `duplicate_names` - What registering a taken name does (defaults to `rebind`)
/// * `embedding` - How the pipeline sees the outer context when used as a step (defaults to `share`)
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
pub struct PipelineOptions {
    #[serde(default)]
    pub duplicate_names: DuplicateNamePolicy,
    #[serde(default)]
    pub embedding: EmbeddingMode,
}

/// Configuration for a single step.
///
/// # Fields
/// * `name` - Registration name; jump targets refer to it
/// * `step` - Built-in implementation name (see `LocalStepFactory::list_available_implementations`)
/// * `description` - Free text kept in the registry (optional)
/// * `options` - Implementation-specific options
///
/// # Example
/// ```yaml
/// name: route_errors
/// step: jump_when
/// options:
///   contains: "ERROR"
///   target: report
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub name: String,
    pub step: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub options: HashMap<String, serde_yaml::Value>,
}

impl StepConfig {
    /// String option, if present and a string.
    pub fn option_str(&self, key: &str) -> Option<&str> {
        self.options.get(key).and_then(|v| v.as_str())
    }
}

/// Supported pipeline file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// Pick the format from the file extension. Files without an extension are read as YAML.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            None | Some("yaml") | Some("yml") => Ok(ConfigFormat::Yaml),
            Some("toml") => Ok(ConfigFormat::Toml),
            Some(other) => Err(ConfigError::UnsupportedFormat {
                extension: other.to_string(),
            }),
        }
    }
}

/// Parse a pipeline definition from text.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<PipelineConfig, ConfigError> {
    let cfg = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };
    Ok(cfg)
}

/// Load a pipeline definition from a YAML or TOML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let path = path.as_ref();
    let format = ConfigFormat::from_path(path)?;
    let content = fs::read_to_string(path)?;
    parse_config(&content, format)
}

/// Load a pipeline definition and validate it.
///
/// Validation reports every problem found, not just the first.
pub fn load_and_validate_config<P: AsRef<Path>>(path: P) -> Result<PipelineConfig, ConfigError> {
    let cfg = load_config(path)?;
    crate::config::validate_pipeline_config(&cfg).map_err(ConfigError::Validation)?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_basic_config() {
        let yaml = r#"
name: text
steps:
  - name: shout
    step: change_text_case
    options:
      case: upper
  - name: flip
    step: reverse_text
    description: reverses the text
"#;

        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.name, "text");
        assert_eq!(cfg.options, PipelineOptions::default());
        assert_eq!(cfg.steps.len(), 2);
        assert_eq!(cfg.steps[0].option_str("case"), Some("upper"));
        assert_eq!(cfg.steps[1].description.as_deref(), Some("reverses the text"));
    }

    #[test]
    fn test_parse_options_and_defaults() {
        let yaml = r#"
options:
  duplicate_names: replace
  embedding: copy
steps: []
"#;

        let cfg = parse_config(yaml, ConfigFormat::Yaml).unwrap();
        assert_eq!(cfg.name, DEFAULT_PIPELINE_NAME);
        assert_eq!(cfg.options.duplicate_names, DuplicateNamePolicy::Replace);
        assert_eq!(cfg.options.embedding, EmbeddingMode::Copy);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
name = "toml-pipeline"

[[steps]]
name = "bracket"
step = "prefix_suffix_adder"

[steps.options]
prefix = "<"
suffix = ">"
"#;

        let cfg = parse_config(toml, ConfigFormat::Toml).unwrap();
        assert_eq!(cfg.name, "toml-pipeline");
        assert_eq!(cfg.steps[0].option_str("prefix"), Some("<"));
        assert_eq!(cfg.steps[0].option_str("suffix"), Some(">"));
    }

    #[test]
    fn test_format_from_extension() {
        let cases = vec![
            ("p.yaml", Some(ConfigFormat::Yaml)),
            ("p.yml", Some(ConfigFormat::Yaml)),
            ("p.toml", Some(ConfigFormat::Toml)),
            ("p", Some(ConfigFormat::Yaml)),
            ("p.json", None),
        ];

        for (file, expected) in cases {
            let result = ConfigFormat::from_path(Path::new(file)).ok();
            assert_eq!(result, expected, "{}", file);
        }
    }

    #[test]
    fn test_load_and_validate_reports_all_errors() {
        let yaml = r#"
steps:
  - name: ""
    step: reverse_text
  - name: shout
    step: yell
  - name: route
    step: jump_when
    options:
      contains: "x"
      target: nowhere
"#;

        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(yaml.as_bytes()).unwrap();

        let err = load_and_validate_config(file.path()).unwrap_err();
        match err {
            ConfigError::Validation(errors) => assert_eq!(errors.len(), 3),
            other => panic!("Expected Validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
