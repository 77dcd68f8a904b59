// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Built-in text steps.
//!
//! Text steps read a string payload and either replace it ([`TextStep`]), analyze it
//! ([`TokenCounter`]) or route on it ([`JumpWhen`], [`StopWhen`]). A payload that is not a
//! string aborts the run.
//!
//! [`TextStep`] also works as a [`StreamHandler`](crate::traits::StreamHandler), so the same
//! operation can run per item in a streaming pipeline.

pub mod change_text_case;
pub mod prefix_suffix_adder;
pub mod reverse_text;
pub mod route;
pub mod token_counter;

pub use change_text_case::*;
pub use prefix_suffix_adder::*;
pub use reverse_text::*;
pub use route::*;
pub use token_counter::*;

use async_trait::async_trait;
use serde_json::Value;
use tracing::warn;

use crate::context::{ExecutionContext, Payload};
use crate::errors::FlowError;
use crate::observability::messages::steps::NonTextPayload;
use crate::traits::{Emit, Middleware, StepOutcome, StreamHandler};

/// A pure string-to-string operation.
pub trait TextOperation: Send + Sync {
    fn apply(&self, input: &str) -> String;

    /// Implementation name, also the default step name.
    fn implementation(&self) -> &'static str;
}

/// Adapts a [`TextOperation`] into a step for either pipeline flavor.
pub struct TextStep<T> {
    name: String,
    op: T,
}

impl<T: TextOperation> TextStep<T> {
    pub fn new(op: T) -> Self {
        Self {
            name: op.implementation().to_string(),
            op,
        }
    }

    pub fn named(name: impl Into<String>, op: T) -> Self {
        Self {
            name: name.into(),
            op,
        }
    }

    pub fn operation(&self) -> &T {
        &self.op
    }
}

#[async_trait]
impl<T: TextOperation> Middleware for TextStep<T> {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        match text_payload(&self.name, ctx) {
            Ok(text) => {
                let result = self.op.apply(text);
                ctx.set_data(result);
                StepOutcome::Continue
            }
            Err(e) => StepOutcome::Abort(e),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[async_trait]
impl<T: TextOperation> StreamHandler for TextStep<T> {
    async fn handle(&self, item: Value, _ctx: &mut ExecutionContext) -> Result<Emit, FlowError> {
        match item {
            Value::String(text) => Ok(Emit::One(Value::String(self.op.apply(&text)))),
            other => Err(non_text(&self.name, value_kind(&other))),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Borrow the payload as text or explain why it is not.
pub(crate) fn text_payload<'a>(step: &str, ctx: &'a ExecutionContext) -> Result<&'a str, FlowError> {
    match ctx.payload() {
        Payload::Data(value) => match value.as_str() {
            Some(text) => Ok(text),
            None => Err(non_text(step, value_kind(value))),
        },
        Payload::Stream(_) => Err(non_text(step, "a stream")),
    }
}

fn non_text(step: &str, found: &str) -> FlowError {
    let msg = NonTextPayload {
        step_name: step,
        found,
    };
    warn!("{}", msg);
    FlowError::abort(step, msg.to_string())
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
