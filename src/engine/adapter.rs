// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Step-kind adapters.
//!
//! * [`handler_to_transform`] promotes a per-item handler to a whole-sequence transform.
//!   Every handler stage of a streaming run is built this way.
//! * [`AsStep`] wraps a built pipeline so it can be registered as one step of an outer
//!   pipeline. Sequential children become [`Middleware`]; streaming children become
//!   [`StreamTransform`]s.
//! * [`StreamCollector`] runs a streaming pipeline as a sequential step, draining its output
//!   into the payload.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::context::{ExecutionContext, SharedContext};
use crate::engine::stage::{HandlerStage, Upstream};
use crate::engine::{SequentialPipeline, StreamInput, StreamPipeline};
use crate::errors::FlowError;
use crate::observability::messages::engine::{
    EmbeddedRunEntered, EmbeddedRunExited, EmbeddedRunFailed,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{ItemSource, Middleware, StepOutcome, StreamHandler, StreamTransform};

/// How a child pipeline sees the outer context.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingMode {
    /// The child runs on the outer context itself.
    #[default]
    Share,
    /// The child runs on a deep copy. The copy replaces the outer state only when the
    /// child succeeds.
    Copy,
}

impl Display for EmbeddingMode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EmbeddingMode::Share => write!(f, "shared"),
            EmbeddingMode::Copy => write!(f, "copied"),
        }
    }
}

/// A handler promoted to a transform.
pub struct HandlerTransform {
    handler: Arc<dyn StreamHandler>,
}

#[async_trait]
impl StreamTransform for HandlerTransform {
    async fn transform(
        &self,
        upstream: Upstream,
        ctx: SharedContext,
    ) -> Result<Box<dyn ItemSource>, FlowError> {
        Ok(Box::new(HandlerStage::new(
            Arc::clone(&self.handler),
            upstream,
            ctx,
        )))
    }

    fn name(&self) -> &str {
        self.handler.name()
    }
}

/// Promote `handler` to a transform that applies it per item, flattens nested sequences,
/// and closes its source exactly once when it finishes or fails.
pub fn handler_to_transform(handler: Arc<dyn StreamHandler>) -> Arc<dyn StreamTransform> {
    Arc::new(HandlerTransform { handler })
}

/// Wrap a built pipeline as a single step of an outer pipeline.
pub trait AsStep {
    type Step;

    fn as_step(&self, mode: EmbeddingMode) -> Self::Step;
}

impl AsStep for Arc<SequentialPipeline> {
    type Step = EmbeddedPipeline;

    fn as_step(&self, mode: EmbeddingMode) -> EmbeddedPipeline {
        EmbeddedPipeline {
            pipeline: Arc::clone(self),
            mode,
        }
    }
}

impl AsStep for Arc<StreamPipeline> {
    type Step = EmbeddedStream;

    fn as_step(&self, mode: EmbeddingMode) -> EmbeddedStream {
        EmbeddedStream {
            pipeline: Arc::clone(self),
            mode,
        }
    }
}

/// A sequential pipeline running as one step of another.
///
/// Jumps inside the child resolve against the child's registry only; the child never hands
/// a pending jump back. A child that stops also stops the parent.
pub struct EmbeddedPipeline {
    pipeline: Arc<SequentialPipeline>,
    mode: EmbeddingMode,
}

#[async_trait]
impl Middleware for EmbeddedPipeline {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        run_embedded(&self.pipeline, ctx, self.mode).await
    }

    fn name(&self) -> &str {
        self.pipeline.name()
    }
}

/// A sequential pipeline registers directly into an outer pipeline using the embedding
/// mode from its own options.
#[async_trait]
impl Middleware for SequentialPipeline {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        run_embedded(self, ctx, self.options().embedding).await
    }

    fn name(&self) -> &str {
        SequentialPipeline::name(self)
    }
}

async fn run_embedded(
    child: &SequentialPipeline,
    ctx: &mut ExecutionContext,
    mode: EmbeddingMode,
) -> StepOutcome {
    let mode_label = mode.to_string();
    EmbeddedRunEntered {
        child: child.name(),
        mode: &mode_label,
    }
    .log();

    let result = match mode {
        EmbeddingMode::Share => child.execute(ctx).await,
        EmbeddingMode::Copy => match ctx.try_clone(child.name()) {
            Ok(mut copy) => {
                let result = child.execute(&mut copy).await;
                if result.is_ok() {
                    ctx.adopt(copy);
                }
                result
            }
            Err(error) => Err(error),
        },
    };

    match result {
        Ok(()) => {
            EmbeddedRunExited {
                child: child.name(),
                stopped: ctx.stop,
            }
            .log();
            StepOutcome::Continue
        }
        Err(error) => {
            EmbeddedRunFailed {
                child: child.name(),
                error: &error,
            }
            .log();
            StepOutcome::Abort(error)
        }
    }
}

/// A streaming pipeline running as one transform of another.
///
/// The outer upstream becomes the child's source. In `Copy` mode the child works on a
/// copy of the context, and changes it makes are not visible to the outer run.
pub struct EmbeddedStream {
    pipeline: Arc<StreamPipeline>,
    mode: EmbeddingMode,
}

#[async_trait]
impl StreamTransform for EmbeddedStream {
    async fn transform(
        &self,
        upstream: Upstream,
        ctx: SharedContext,
    ) -> Result<Box<dyn ItemSource>, FlowError> {
        let ctx = match self.mode {
            EmbeddingMode::Share => ctx,
            EmbeddingMode::Copy => {
                let copy = ctx.lock().await.try_clone(self.pipeline.name())?;
                Arc::new(Mutex::new(copy))
            }
        };
        let source: Box<dyn ItemSource> = Box::new(upstream);
        let stream = self.pipeline.run_shared(StreamInput::Source(source), ctx)?;
        Ok(Box::new(stream))
    }

    fn name(&self) -> &str {
        self.pipeline.name()
    }
}

/// Runs a streaming pipeline as a sequential step.
///
/// The payload is the stream's source (see [`StreamInput::from_payload`]). On success the
/// collected items replace the payload as a JSON array; a stream error aborts the step.
pub struct StreamCollector {
    pipeline: Arc<StreamPipeline>,
}

impl StreamCollector {
    pub fn new(pipeline: Arc<StreamPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Middleware for StreamCollector {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        let input = StreamInput::from_payload(ctx.take_payload());
        let shared: SharedContext = Arc::new(Mutex::new(std::mem::take(ctx)));

        let collected = match self.pipeline.run_shared(input, Arc::clone(&shared)) {
            Ok(stream) => stream.collect_items().await,
            Err(error) => Err(error),
        };

        *ctx = match Arc::try_unwrap(shared) {
            Ok(inner) => inner.into_inner(),
            Err(still_shared) => std::mem::take(&mut *still_shared.lock().await),
        };

        match collected {
            Ok(items) => {
                ctx.set_data(Value::Array(items));
                StepOutcome::Continue
            }
            Err(error) => StepOutcome::Abort(error),
        }
    }

    fn name(&self) -> &str {
        self.pipeline.name()
    }
}

impl StreamPipeline {
    /// Wrap this pipeline as a sequential step that drains it into the payload.
    pub fn into_middleware(self) -> StreamCollector {
        StreamCollector::new(Arc::new(self))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{Appender, TrackedSource};
    use crate::errors::ErrorKind;
    use crate::traits::{handler_fn, sync_middleware_fn, Emit};
    use serde_json::json;

    #[tokio::test]
    async fn test_handler_to_transform_closes_source_once() {
        let handler = Arc::new(handler_fn("upper", |item, _ctx| {
            Ok(Emit::One(json!(item.as_str().unwrap_or_default().to_uppercase())))
        }));
        let transform = handler_to_transform(handler);
        assert_eq!(transform.name(), "upper");

        let (source, probe) = TrackedSource::new("src", vec![json!("a"), json!("b")]);
        let mut arena = crate::engine::stage::StageArena::default();
        let upstream = arena.push("src", Box::new(source));
        let ctx = Arc::new(Mutex::new(ExecutionContext::new()));

        let mut out = transform.transform(upstream, ctx).await.unwrap();
        assert_eq!(out.next_item().await.unwrap().unwrap(), json!("A"));
        assert_eq!(out.next_item().await.unwrap().unwrap(), json!("B"));
        assert!(out.next_item().await.is_none());
        out.close().await.unwrap();
        arena.close_all().await.unwrap();

        assert_eq!(probe.closes(), 1);
    }

    #[tokio::test]
    async fn test_copy_mode_leaves_outer_untouched_on_failure() {
        let mut child = SequentialPipeline::new("child");
        child
            .register(Appender::new("edit", "-child"))
            .register(sync_middleware_fn("boom", |_ctx| {
                StepOutcome::abort("boom", "child gave up")
            }));
        let child = Arc::new(child);

        let mut ctx = ExecutionContext::with_data("outer");
        let outcome = child.as_step(EmbeddingMode::Copy).handle(&mut ctx).await;

        assert!(matches!(outcome, StepOutcome::Abort(ref e) if e.kind() == ErrorKind::Abort));
        assert_eq!(ctx.data(), Some(&json!("outer")));
        assert!(!ctx.stop);
    }

    #[tokio::test]
    async fn test_share_mode_keeps_child_changes_on_failure() {
        let mut child = SequentialPipeline::new("child");
        child
            .register(Appender::new("edit", "-child"))
            .register(sync_middleware_fn("boom", |_ctx| {
                StepOutcome::abort("boom", "child gave up")
            }));
        let child = Arc::new(child);

        let mut ctx = ExecutionContext::with_data("outer");
        let outcome = child.as_step(EmbeddingMode::Share).handle(&mut ctx).await;

        assert!(matches!(outcome, StepOutcome::Abort(_)));
        assert_eq!(ctx.data(), Some(&json!("outer-child")));
        assert!(ctx.stop);
    }

    #[tokio::test]
    async fn test_stream_collector_drains_into_payload() {
        let mut stream = StreamPipeline::new("double");
        stream.register_handler(handler_fn("double", |item, _ctx| {
            Ok(Emit::One(json!(item.as_i64().unwrap_or(0) * 2)))
        }));

        let mut outer = SequentialPipeline::new("outer");
        outer
            .register(stream.into_middleware())
            .register(sync_middleware_fn("sum", |ctx| {
                let total: i64 = ctx
                    .data()
                    .and_then(|v| v.as_array())
                    .map(|items| items.iter().filter_map(|v| v.as_i64()).sum())
                    .unwrap_or(0);
                ctx.set_data(total);
                StepOutcome::Continue
            }));

        let result = outer
            .run(ExecutionContext::with_data(json!([1, 2, 3])).with_session("keep"))
            .await
            .unwrap();

        assert_eq!(result.data(), Some(&json!(12)));
        assert_eq!(result.session_id.as_deref(), Some("keep"));
        assert_eq!(result.trace(), ["double".to_string(), "sum".to_string()]);
    }
}
