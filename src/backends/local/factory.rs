// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use tracing::error;

use super::steps::*;
use crate::config::consts::{DEFAULT_PREFIX, DEFAULT_SUFFIX};
use crate::config::StepConfig;
use crate::errors::ConfigError;
use crate::observability::messages::steps::StepCreationFailed;
use crate::traits::Middleware;

/// Factory for creating built-in (in-process) step instances
pub struct LocalStepFactory;

impl LocalStepFactory {
    /// Create a step instance from configuration
    ///
    /// The `step` field in the config determines which step to create:
    /// - "change_text_case" -> [`ChangeTextCase`] (requires `case`)
    /// - "reverse_text" -> [`ReverseText`]
    /// - "prefix_suffix_adder" -> [`PrefixSuffixAdder`] (`prefix`/`suffix` default to brackets)
    /// - "token_counter" -> [`TokenCounter`]
    /// - "jump_when" -> [`JumpWhen`] (requires `contains` and `target`)
    /// - "stop_when" -> [`StopWhen`] (requires `contains`)
    pub fn create_step(config: &StepConfig) -> Result<Arc<dyn Middleware>, ConfigError> {
        Self::build(config).map_err(|reason| {
            error!(
                "{}",
                StepCreationFailed {
                    step_name: &config.name,
                    implementation: &config.step,
                    reason: &reason,
                }
            );
            ConfigError::StepCreation {
                step: config.name.clone(),
                reason,
            }
        })
    }

    fn build(config: &StepConfig) -> Result<Arc<dyn Middleware>, String> {
        let name = config.name.as_str();
        let required = |key: &str| {
            config
                .option_str(key)
                .ok_or_else(|| format!("missing string option '{}'", key))
        };

        match config.step.as_str() {
            "change_text_case" => {
                let case: TextCase = required("case")?.parse()?;
                Ok(Arc::new(TextStep::named(name, ChangeTextCase::new(case))))
            }
            "reverse_text" => Ok(Arc::new(TextStep::named(name, ReverseText))),
            "prefix_suffix_adder" => {
                let prefix = config.option_str("prefix").unwrap_or(DEFAULT_PREFIX);
                let suffix = config.option_str("suffix").unwrap_or(DEFAULT_SUFFIX);
                Ok(Arc::new(TextStep::named(
                    name,
                    PrefixSuffixAdder::new(prefix, suffix),
                )))
            }
            "token_counter" => Ok(Arc::new(TokenCounter::new(name))),
            "jump_when" => Ok(Arc::new(JumpWhen::new(
                name,
                required("contains")?,
                required("target")?,
            ))),
            "stop_when" => Ok(Arc::new(StopWhen::new(name, required("contains")?))),
            other => Err(format!("unknown step implementation '{}'", other)),
        }
    }

    /// List all available built-in step implementations
    pub fn list_available_implementations() -> Vec<&'static str> {
        vec![
            "change_text_case",
            "reverse_text",
            "prefix_suffix_adder",
            "token_counter",
            "jump_when",
            "stop_when",
        ]
    }

    /// Check if an implementation is available
    pub fn is_implementation_available(impl_name: &str) -> bool {
        Self::list_available_implementations().contains(&impl_name)
    }

    /// Options an implementation cannot be created without
    pub fn required_options(impl_name: &str) -> &'static [&'static str] {
        match impl_name {
            "change_text_case" => &["case"],
            "jump_when" => &["contains", "target"],
            "stop_when" => &["contains"],
            _ => &[],
        }
    }
}
