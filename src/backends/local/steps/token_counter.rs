// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use serde::Serialize;

use super::text_payload;
use crate::context::ExecutionContext;
use crate::traits::{Middleware, StepOutcome};

/// Counts characters, words and lines of the payload.
///
/// The counts are written to the side channel under the step's name; the payload itself is
/// left untouched.
pub struct TokenCounter {
    name: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct TokenCounts {
    pub char_count: usize,
    pub word_count: usize,
    pub line_count: usize,
}

impl TokenCounts {
    pub fn of(input: &str) -> Self {
        Self {
            char_count: input.chars().count(),
            word_count: input.split_whitespace().count(),
            // At least one line, even for empty input
            line_count: input.lines().count().max(1),
        }
    }
}

impl TokenCounter {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for TokenCounter {
    fn default() -> Self {
        Self::new("token_counter")
    }
}

#[async_trait]
impl Middleware for TokenCounter {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        let counts = match text_payload(&self.name, ctx) {
            Ok(text) => TokenCounts::of(text),
            Err(e) => return StepOutcome::Abort(e),
        };

        match serde_json::to_value(&counts) {
            Ok(value) => {
                ctx.side_channel_mut().insert(self.name.clone(), value);
                StepOutcome::Continue
            }
            Err(e) => StepOutcome::fail(self.name.clone(), e),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
