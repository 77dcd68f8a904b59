// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::backends::local::LocalStepFactory;
use crate::config::PipelineConfig;
use crate::engine::SequentialPipeline;
use crate::errors::ConfigError;

/// Pipeline runtime builder - turns a declarative definition into a runnable pipeline.
///
/// Steps are created through [`LocalStepFactory`] and registered in file order under their
/// configured names, honoring the definition's duplicate-name policy.
///
/// # Examples
///
/// ```
/// use yaaf::config::{parse_config, ConfigFormat, RuntimeBuilder};
///
/// let cfg = parse_config(
///     "name: demo\nsteps:\n  - name: flip\n    step: reverse_text\n",
///     ConfigFormat::Yaml,
/// )
/// .unwrap();
///
/// let pipeline = RuntimeBuilder::from_config(&cfg).unwrap();
/// assert_eq!(pipeline.name(), "demo");
/// assert_eq!(pipeline.len(), 1);
/// ```
pub struct RuntimeBuilder;

impl RuntimeBuilder {
    /// Build a sequential pipeline from configuration.
    ///
    /// The definition is not validated here; use `load_and_validate_config` or
    /// `validate_pipeline_config` first to get every problem reported at once.
    pub fn from_config(cfg: &PipelineConfig) -> Result<SequentialPipeline, ConfigError> {
        let mut pipeline = SequentialPipeline::with_options(cfg.name.clone(), cfg.options);
        for step_cfg in &cfg.steps {
            let step = LocalStepFactory::create_step(step_cfg)?;
            pipeline.register_shared(
                step,
                Some(step_cfg.name.as_str()),
                step_cfg.description.as_deref(),
            );
        }
        Ok(pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_config, ConfigFormat};
    use crate::context::ExecutionContext;
    use serde_json::json;

    #[tokio::test]
    async fn test_from_config_runs_steps_in_order() {
        let cfg = parse_config(
            r#"
name: text
steps:
  - name: shout
    step: change_text_case
    options: { case: upper }
    description: make it loud
  - name: bracket
    step: prefix_suffix_adder
    options: { prefix: "<", suffix: ">" }
"#,
            ConfigFormat::Yaml,
        )
        .unwrap();

        let pipeline = RuntimeBuilder::from_config(&cfg).unwrap();
        assert_eq!(
            pipeline.registry().lookup("shout"),
            Some((0, Some("make it loud")))
        );

        let ctx = pipeline.run(ExecutionContext::with_data("hello")).await.unwrap();
        assert_eq!(ctx.data(), Some(&json!("<HELLO>")));
    }

    #[test]
    fn test_from_config_reports_step_creation_failure() {
        let cfg = parse_config(
            "steps:\n  - name: broken\n    step: change_text_case\n",
            ConfigFormat::Yaml,
        )
        .unwrap();

        match RuntimeBuilder::from_config(&cfg) {
            Err(ConfigError::StepCreation { step, .. }) => assert_eq!(step, "broken"),
            other => panic!("Expected StepCreation error, got {:?}", other.map(|p| p.len())),
        }
    }
}
