// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;

use thiserror::Error;

/// Problems found while validating a pipeline configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A step has an empty name
    EmptyStepName {
        /// Position of the step in the configuration
        position: usize,
    },
    /// A step references an implementation the factory does not know
    UnknownImplementation {
        /// The step that references the implementation
        step_name: String,
        /// The implementation name that couldn't be resolved
        implementation: String,
        /// Names the factory does know
        available: Vec<String>,
    },
    /// A step is missing an option its implementation requires
    MissingOption {
        /// The step with the missing option
        step_name: String,
        /// The option key
        option: String,
    },
    /// A step has an option value of the wrong shape
    InvalidOption {
        /// The step with the bad option
        step_name: String,
        /// The option key
        option: String,
        /// What was expected
        expected: String,
    },
    /// A jump step targets a name no step in the pipeline carries
    UnresolvedJumpTarget {
        /// The jump step
        step_name: String,
        /// The target that couldn't be resolved
        target: String,
    },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptyStepName { position } => {
                write!(f, "Step at position {} has an empty name", position)
            }
            ValidationError::UnknownImplementation {
                step_name,
                implementation,
                available,
            } => {
                write!(
                    f,
                    "Step '{}' uses unknown implementation '{}' (available: {})",
                    step_name,
                    implementation,
                    available.join(", ")
                )
            }
            ValidationError::MissingOption { step_name, option } => {
                write!(
                    f,
                    "Step '{}' is missing required option '{}'",
                    step_name, option
                )
            }
            ValidationError::InvalidOption {
                step_name,
                option,
                expected,
            } => {
                write!(
                    f,
                    "Step '{}' has an invalid value for option '{}': expected {}",
                    step_name, option, expected
                )
            }
            ValidationError::UnresolvedJumpTarget { step_name, target } => {
                write!(
                    f,
                    "Step '{}' jumps to '{}' which does not exist",
                    step_name, target
                )
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised while loading a pipeline configuration or building a runtime from it.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("unsupported config format: '{extension}'")]
    UnsupportedFormat { extension: String },

    #[error("config validation failed: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("failed to create step '{step}': {reason}")]
    StepCreation { step: String, reason: String },
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let error = ValidationError::UnknownImplementation {
            step_name: "shout".to_string(),
            implementation: "yell".to_string(),
            available: vec!["reverse_text".to_string(), "token_counter".to_string()],
        };
        assert_eq!(
            error.to_string(),
            "Step 'shout' uses unknown implementation 'yell' (available: reverse_text, token_counter)"
        );
    }

    #[test]
    fn test_config_error_joins_validation_errors() {
        let error = ConfigError::Validation(vec![
            ValidationError::EmptyStepName { position: 0 },
            ValidationError::UnresolvedJumpTarget {
                step_name: "route".to_string(),
                target: "nowhere".to_string(),
            },
        ]);
        let message = error.to_string();
        assert!(message.contains("position 0"));
        assert!(message.contains("jumps to 'nowhere'"));
    }
}
