// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Routing steps: change control flow when the payload contains a marker.

use async_trait::async_trait;
use tracing::debug;

use super::text_payload;
use crate::context::ExecutionContext;
use crate::observability::messages::steps::RouteTaken;
use crate::traits::{Middleware, StepOutcome};

/// Jumps to `target` when the payload contains `contains`.
pub struct JumpWhen {
    name: String,
    contains: String,
    target: String,
}

impl JumpWhen {
    pub fn new(
        name: impl Into<String>,
        contains: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            contains: contains.into(),
            target: target.into(),
        }
    }

    pub fn target(&self) -> &str {
        &self.target
    }
}

#[async_trait]
impl Middleware for JumpWhen {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        let matched = match text_payload(&self.name, ctx) {
            Ok(text) => text.contains(self.contains.as_str()),
            Err(e) => return StepOutcome::Abort(e),
        };

        if matched {
            let action = format!("jump to '{}'", self.target);
            debug!(
                "{}",
                RouteTaken {
                    step_name: &self.name,
                    matched: &self.contains,
                    action: &action,
                }
            );
            ctx.goto(self.target.clone());
        }
        StepOutcome::Continue
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Stops the run when the payload contains `contains`.
pub struct StopWhen {
    name: String,
    contains: String,
}

impl StopWhen {
    pub fn new(name: impl Into<String>, contains: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contains: contains.into(),
        }
    }
}

#[async_trait]
impl Middleware for StopWhen {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        let matched = match text_payload(&self.name, ctx) {
            Ok(text) => text.contains(self.contains.as_str()),
            Err(e) => return StepOutcome::Abort(e),
        };

        if matched {
            debug!(
                "{}",
                RouteTaken {
                    step_name: &self.name,
                    matched: &self.contains,
                    action: "stop",
                }
            );
            ctx.halt();
        }
        StepOutcome::Continue
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_jump_when() {
        let test_cases = vec![
            ("ERROR: disk full", Some("report")),
            ("all good", None),
        ];

        let step = JumpWhen::new("route", "ERROR", "report");
        for (input, expected) in test_cases {
            let mut ctx = ExecutionContext::with_data(input);
            assert!(matches!(step.handle(&mut ctx).await, StepOutcome::Continue));
            assert_eq!(ctx.jump_target.as_deref(), expected, "input {:?}", input);
            assert!(!ctx.stop);
        }
    }

    #[tokio::test]
    async fn test_stop_when() {
        let test_cases = vec![("halt now", true), ("keep going", false)];

        let step = StopWhen::new("halt", "halt");
        for (input, expected) in test_cases {
            let mut ctx = ExecutionContext::with_data(input);
            assert!(matches!(step.handle(&mut ctx).await, StepOutcome::Continue));
            assert_eq!(ctx.stop, expected, "input {:?}", input);
            assert!(ctx.jump_target.is_none());
        }
    }
}
