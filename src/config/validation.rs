// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Configuration validation for pipeline definitions.
//!
//! Validation runs every check over every step and reports all problems together, so a
//! broken file can be fixed in one pass.
//!
//! # Checks
//!
//! 1. **Names**: every step has a non-empty name
//! 2. **Implementations**: every step names a built-in the factory can create
//! 3. **Options**: required options are present and have the right shape
//! 4. **Jump targets**: `jump_when` targets name a step of the same pipeline
//!
//! Duplicate step names are allowed; what they mean is governed by
//! `options.duplicate_names`.
//!
//! # Example
//! ```rust
//! use yaaf::config::{parse_config, validate_pipeline_config, ConfigFormat};
//!
//! let cfg = parse_config(
//!     "steps:\n  - name: flip\n    step: reverse_text\n",
//!     ConfigFormat::Yaml,
//! )
//! .unwrap();
//!
//! assert!(validate_pipeline_config(&cfg).is_ok());
//! ```

use std::collections::HashSet;

use crate::backends::local::{LocalStepFactory, TextCase};
use crate::config::{PipelineConfig, StepConfig};
use crate::errors::ValidationError;

/// Validate a pipeline definition, returning every problem found.
pub fn validate_pipeline_config(cfg: &PipelineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let names: HashSet<&str> = cfg.steps.iter().map(|s| s.name.as_str()).collect();

    for (position, step) in cfg.steps.iter().enumerate() {
        if step.name.trim().is_empty() {
            errors.push(ValidationError::EmptyStepName { position });
        }

        if !LocalStepFactory::is_implementation_available(&step.step) {
            errors.push(ValidationError::UnknownImplementation {
                step_name: step.name.clone(),
                implementation: step.step.clone(),
                available: LocalStepFactory::list_available_implementations()
                    .into_iter()
                    .map(String::from)
                    .collect(),
            });
            continue;
        }

        validate_options(step, &mut errors);

        if step.step == "jump_when" {
            if let Some(target) = step.option_str("target") {
                if !names.contains(target) {
                    errors.push(ValidationError::UnresolvedJumpTarget {
                        step_name: step.name.clone(),
                        target: target.to_string(),
                    });
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_options(step: &StepConfig, errors: &mut Vec<ValidationError>) {
    for option in LocalStepFactory::required_options(&step.step) {
        match step.options.get(*option) {
            None => errors.push(ValidationError::MissingOption {
                step_name: step.name.clone(),
                option: option.to_string(),
            }),
            Some(value) if value.as_str().is_none() => {
                errors.push(ValidationError::InvalidOption {
                    step_name: step.name.clone(),
                    option: option.to_string(),
                    expected: "a string".to_string(),
                })
            }
            Some(_) => {}
        }
    }

    if step.step == "change_text_case" {
        if let Some(case) = step.option_str("case") {
            if case.parse::<TextCase>().is_err() {
                errors.push(ValidationError::InvalidOption {
                    step_name: step.name.clone(),
                    option: "case".to_string(),
                    expected: "one of upper, lower, proper, title".to_string(),
                });
            }
        }
    }
}
