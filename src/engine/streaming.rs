// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::{PipelineOptions, StepRegistry};
use crate::context::{ExecutionContext, Payload, SharedContext};
use crate::engine::adapter::handler_to_transform;
use crate::engine::stage::{SourceStage, StageArena, TransformStage, Upstream};
use crate::errors::FlowError;
use crate::observability::messages::stream::{
    BlockingSourceRejected, StreamBuilt, StreamDroppedWithoutClose,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{
    classify, DeclaredStep, ItemSource, IterSource, StreamHandler, StreamItem, StreamStep,
    StreamTransform,
};

/// Anything a streaming run can start from.
pub enum StreamInput {
    /// Already asynchronous; used as-is.
    Source(Box<dyn ItemSource>),
    /// Finite in-memory collection, yielded item by item.
    Items(Vec<Value>),
    /// Any other value, yielded as a one-item sequence.
    Single(Value),
    /// A synchronous producer. Always rejected: pulling it would block the scheduler.
    Blocking(Box<dyn Iterator<Item = Value> + Send>),
}

impl StreamInput {
    pub fn blocking<I>(iter: I) -> Self
    where
        I: IntoIterator<Item = Value>,
        I::IntoIter: Send + 'static,
    {
        StreamInput::Blocking(Box::new(iter.into_iter()))
    }

    /// Interpret a context payload: arrays become item sequences, streams are used as-is.
    pub fn from_payload(payload: Payload) -> Self {
        match payload {
            Payload::Stream(source) => StreamInput::Source(source),
            Payload::Data(value) => {
                StreamInput::from(Arc::try_unwrap(value).unwrap_or_else(|shared| (*shared).clone()))
            }
        }
    }

    fn normalize(self, pipeline: &str) -> Result<Box<dyn ItemSource>, FlowError> {
        match self {
            StreamInput::Source(source) => Ok(source),
            StreamInput::Items(items) => Ok(Box::new(IterSource::new(items))),
            StreamInput::Single(value) => Ok(Box::new(IterSource::labelled("value", vec![value]))),
            StreamInput::Blocking(_) => {
                BlockingSourceRejected { pipeline }.log();
                Err(FlowError::BlockingSourceRejected {
                    detail: format!(
                        "pipeline '{}' was given a synchronous iterator; wrap it in an async source or collect it first",
                        pipeline
                    ),
                })
            }
        }
    }
}

impl From<Vec<Value>> for StreamInput {
    fn from(items: Vec<Value>) -> Self {
        StreamInput::Items(items)
    }
}

impl From<Value> for StreamInput {
    fn from(value: Value) -> Self {
        match value {
            Value::Array(items) => StreamInput::Items(items),
            other => StreamInput::Single(other),
        }
    }
}

impl From<Box<dyn ItemSource>> for StreamInput {
    fn from(source: Box<dyn ItemSource>) -> Self {
        StreamInput::Source(source)
    }
}

impl From<IterSource> for StreamInput {
    fn from(source: IterSource) -> Self {
        StreamInput::Source(Box::new(source))
    }
}

impl From<FlowStream> for StreamInput {
    fn from(stream: FlowStream) -> Self {
        StreamInput::Source(Box::new(stream))
    }
}

/// Streaming pipeline: handlers and transforms layered over an asynchronous sequence.
///
/// `run` builds the stage chain `stage_i = adapt(step_i)(stage_{i-1})` over the normalized
/// source and returns it as a [`FlowStream`]. Nothing executes until the consumer pulls.
///
/// Handlers are promoted to transforms with
/// [`handler_to_transform`](crate::engine::adapter::handler_to_transform), so every stage
/// is a transform stage that owns closing its upstream.
pub struct StreamPipeline {
    name: String,
    registry: StepRegistry<StreamStep>,
    options: PipelineOptions,
}

impl StreamPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, PipelineOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            name: name.into(),
            registry: StepRegistry::with_policy(options.duplicate_names),
            options,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn registry(&self) -> &StepRegistry<StreamStep> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn register_handler<H: StreamHandler + 'static>(&mut self, handler: H) -> &mut Self {
        self.register_step(StreamStep::Handler(Arc::new(handler)), None, None)
    }

    pub fn register_handler_as<H: StreamHandler + 'static>(
        &mut self,
        handler: H,
        name: &str,
        description: Option<&str>,
    ) -> &mut Self {
        self.register_step(StreamStep::Handler(Arc::new(handler)), Some(name), description)
    }

    pub fn register_transform<T: StreamTransform + 'static>(&mut self, transform: T) -> &mut Self {
        self.register_step(StreamStep::Transform(Arc::new(transform)), None, None)
    }

    pub fn register_transform_as<T: StreamTransform + 'static>(
        &mut self,
        transform: T,
        name: &str,
        description: Option<&str>,
    ) -> &mut Self {
        self.register_step(StreamStep::Transform(Arc::new(transform)), Some(name), description)
    }

    /// Register a step that declares its own kind. The declaration is checked once, here.
    pub fn register_declared(&mut self, step: Arc<dyn DeclaredStep>) -> Result<&mut Self, FlowError> {
        let step = classify(step)?;
        Ok(self.register_step(step, None, None))
    }

    pub fn register_step(
        &mut self,
        step: StreamStep,
        name: Option<&str>,
        description: Option<&str>,
    ) -> &mut Self {
        let name = name.unwrap_or_else(|| step.name()).to_string();
        self.registry
            .register(name, description.map(str::to_string), step);
        self
    }

    /// Build the lazy output sequence over `source` with a fresh or given context.
    pub fn run(
        &self,
        source: impl Into<StreamInput>,
        ctx: Option<ExecutionContext>,
    ) -> Result<FlowStream, FlowError> {
        let ctx = Arc::new(Mutex::new(ctx.unwrap_or_default()));
        self.run_shared(source, ctx)
    }

    /// Stream the context's own payload.
    pub fn run_context(&self, mut ctx: ExecutionContext) -> Result<FlowStream, FlowError> {
        let input = StreamInput::from_payload(ctx.take_payload());
        self.run_shared(input, Arc::new(Mutex::new(ctx)))
    }

    pub fn run_shared(
        &self,
        source: impl Into<StreamInput>,
        ctx: SharedContext,
    ) -> Result<FlowStream, FlowError> {
        let source = source.into().normalize(&self.name)?;
        let source_label = source.label().to_string();

        let mut arena = StageArena::default();
        let mut head = arena.push(source_label.clone(), Box::new(SourceStage::new(source)));

        for entry in self.registry.iter() {
            let transform = match &entry.step {
                StreamStep::Handler(handler) => handler_to_transform(Arc::clone(handler)),
                StreamStep::Transform(transform) => Arc::clone(transform),
            };
            let stage = TransformStage::new(transform, head, Arc::clone(&ctx));
            head = arena.push(entry.name.clone(), Box::new(stage));
        }

        StreamBuilt {
            pipeline: &self.name,
            source: &source_label,
            stage_count: arena.len(),
        }
        .log();

        Ok(FlowStream {
            pipeline: self.name.clone(),
            arena,
            head,
            ctx,
            finished: false,
        })
    }
}

impl std::fmt::Debug for StreamPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamPipeline")
            .field("name", &self.name)
            .field("steps", &self.registry.iter().map(|r| &r.step).collect::<Vec<_>>())
            .field("options", &self.options)
            .finish()
    }
}

/// The lazy output of a streaming run.
///
/// Exhaustion, an error, or an explicit [`close`](ItemSource::close) closes every stage
/// exactly once, newest first. A close failure at exhaustion is yielded as a final error.
/// Dropping an unfinished stream schedules that close on the current tokio runtime.
pub struct FlowStream {
    pipeline: String,
    arena: StageArena,
    head: Upstream,
    ctx: SharedContext,
    finished: bool,
}

impl FlowStream {
    pub fn context(&self) -> SharedContext {
        Arc::clone(&self.ctx)
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    async fn finish(&mut self) -> Result<(), FlowError> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.arena.close_all().await
    }

    /// Drain every item. The first error ends the stream and is returned.
    pub async fn collect_items(mut self) -> Result<Vec<Value>, FlowError> {
        let mut items = Vec::new();
        while let Some(item) = self.next_item().await {
            items.push(item?);
        }
        Ok(items)
    }

    pub fn into_stream(self) -> BoxStream<'static, StreamItem> {
        stream::unfold(self, |mut flow| async move {
            flow.next_item().await.map(|item| (item, flow))
        })
        .boxed()
    }
}

#[async_trait]
impl ItemSource for FlowStream {
    async fn next_item(&mut self) -> Option<StreamItem> {
        if self.finished {
            return None;
        }
        match self.head.next_item().await {
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(error)) => {
                // the stage error wins; close failures are logged per stage
                let _ = self.finish().await;
                Some(Err(error))
            }
            None => match self.finish().await {
                Ok(()) => None,
                Err(error) => Some(Err(error)),
            },
        }
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.finish().await
    }

    fn label(&self) -> &str {
        &self.pipeline
    }
}

impl Drop for FlowStream {
    fn drop(&mut self) {
        if self.finished || self.arena.is_empty() {
            return;
        }
        self.finished = true;
        let mut arena = std::mem::take(&mut self.arena);
        let scheduled = match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = arena.close_all().await;
                });
                true
            }
            Err(_) => false,
        };
        StreamDroppedWithoutClose {
            pipeline: &self.pipeline,
            scheduled,
        }
        .log();
    }
}
