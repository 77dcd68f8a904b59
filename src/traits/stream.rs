// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Streaming step abstractions.
//!
//! Streaming pipelines are built from two kinds of steps, decided once at registration:
//!
//! * [`StreamHandler`] runs per item and may emit zero, one, or a nested sequence of items.
//! * [`StreamTransform`] receives the whole upstream sequence and produces its own output.
//!
//! Both read from and produce [`ItemSource`]s: pull-based asynchronous sequences with an
//! explicit, async `close`.

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde_json::Value;

use crate::context::{ExecutionContext, SharedContext};
use crate::engine::Upstream;
use crate::errors::FlowError;

pub type StreamItem = Result<Value, FlowError>;

/// A lazily pulled asynchronous sequence of items.
#[async_trait]
pub trait ItemSource: Send {
    /// Pull the next item. `None` means the sequence is exhausted.
    async fn next_item(&mut self) -> Option<StreamItem>;

    /// Release the resources behind the sequence. Must tolerate being called after
    /// exhaustion.
    async fn close(&mut self) -> Result<(), FlowError> {
        Ok(())
    }

    fn label(&self) -> &str {
        "source"
    }
}

#[async_trait]
impl ItemSource for Box<dyn ItemSource> {
    async fn next_item(&mut self) -> Option<StreamItem> {
        (**self).next_item().await
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        (**self).close().await
    }

    fn label(&self) -> &str {
        (**self).label()
    }
}

/// What a handler produced for one upstream item.
pub enum Emit {
    One(Value),
    /// Flattened: every item is emitted before the next upstream item is pulled.
    Many(Box<dyn ItemSource>),
    Nothing,
}

impl From<Value> for Emit {
    fn from(value: Value) -> Self {
        Emit::One(value)
    }
}

impl From<Option<Value>> for Emit {
    fn from(value: Option<Value>) -> Self {
        value.map(Emit::One).unwrap_or(Emit::Nothing)
    }
}

impl std::fmt::Debug for Emit {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Emit::One(value) => f.debug_tuple("One").field(value).finish(),
            Emit::Many(source) => f.debug_tuple("Many").field(&source.label()).finish(),
            Emit::Nothing => f.write_str("Nothing"),
        }
    }
}

/// Per-item streaming step.
#[async_trait]
pub trait StreamHandler: Send + Sync {
    async fn handle(&self, item: Value, ctx: &mut ExecutionContext) -> Result<Emit, FlowError>;

    fn name(&self) -> &str;
}

/// Whole-sequence streaming step.
///
/// The engine keeps its own handle on `upstream` and closes it when the transform's
/// output ends, fails, or is abandoned; implementations never need to close it.
#[async_trait]
pub trait StreamTransform: Send + Sync {
    async fn transform(
        &self,
        upstream: Upstream,
        ctx: SharedContext,
    ) -> Result<Box<dyn ItemSource>, FlowError>;

    fn name(&self) -> &str;
}

/// The kind a step declares itself to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Middleware,
    Handler,
    Transform,
}

impl Display for StepKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            StepKind::Middleware => write!(f, "middleware"),
            StepKind::Handler => write!(f, "handler"),
            StepKind::Transform => write!(f, "transform"),
        }
    }
}

/// A step that declares its kind and exposes its capabilities for a one-time probe at
/// registration.
pub trait DeclaredStep: Send + Sync {
    fn name(&self) -> &str;

    fn declared_kind(&self) -> StepKind;

    fn as_handler(self: Arc<Self>) -> Option<Arc<dyn StreamHandler>> {
        None
    }

    fn as_transform(self: Arc<Self>) -> Option<Arc<dyn StreamTransform>> {
        None
    }
}

/// Probe a declared step once and fix its kind.
pub fn classify(step: Arc<dyn DeclaredStep>) -> Result<StreamStep, FlowError> {
    let name = step.name().to_string();
    let declared = step.declared_kind();
    let mismatch = |reason: &str| FlowError::TypeMismatch {
        step: name.clone(),
        declared,
        reason: reason.to_string(),
    };

    match declared {
        StepKind::Transform => step
            .as_transform()
            .map(StreamStep::Transform)
            .ok_or_else(|| mismatch("does not accept a source sequence")),
        StepKind::Handler => step
            .as_handler()
            .map(StreamStep::Handler)
            .ok_or_else(|| mismatch("does not accept a single item")),
        StepKind::Middleware => Err(mismatch("cannot run inside a streaming pipeline")),
    }
}

/// A streaming step after its kind has been decided.
#[derive(Clone)]
pub enum StreamStep {
    Handler(Arc<dyn StreamHandler>),
    Transform(Arc<dyn StreamTransform>),
}

impl StreamStep {
    pub fn name(&self) -> &str {
        match self {
            StreamStep::Handler(h) => h.name(),
            StreamStep::Transform(t) => t.name(),
        }
    }

    pub fn kind(&self) -> StepKind {
        match self {
            StreamStep::Handler(_) => StepKind::Handler,
            StreamStep::Transform(_) => StepKind::Transform,
        }
    }
}

impl std::fmt::Debug for StreamStep {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})", self.kind(), self.name())
    }
}

/// Handler backed by a synchronous closure.
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> StreamHandler for FnHandler<F>
where
    F: Fn(Value, &mut ExecutionContext) -> Result<Emit, FlowError> + Send + Sync,
{
    async fn handle(&self, item: Value, ctx: &mut ExecutionContext) -> Result<Emit, FlowError> {
        (self.f)(item, ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn handler_fn<F>(name: impl Into<String>, f: F) -> FnHandler<F>
where
    F: Fn(Value, &mut ExecutionContext) -> Result<Emit, FlowError> + Send + Sync,
{
    FnHandler {
        name: name.into(),
        f,
    }
}

/// Handler backed by an async closure.
pub struct AsyncFnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> StreamHandler for AsyncFnHandler<F>
where
    F: for<'a> Fn(Value, &'a mut ExecutionContext) -> BoxFuture<'a, Result<Emit, FlowError>>
        + Send
        + Sync,
{
    async fn handle(&self, item: Value, ctx: &mut ExecutionContext) -> Result<Emit, FlowError> {
        (self.f)(item, ctx).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn async_handler_fn<F>(name: impl Into<String>, f: F) -> AsyncFnHandler<F>
where
    F: for<'a> Fn(Value, &'a mut ExecutionContext) -> BoxFuture<'a, Result<Emit, FlowError>>
        + Send
        + Sync,
{
    AsyncFnHandler {
        name: name.into(),
        f,
    }
}

/// Transform backed by a closure over `futures` streams.
pub struct FnTransform<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> StreamTransform for FnTransform<F>
where
    F: Fn(BoxStream<'static, StreamItem>, SharedContext) -> BoxStream<'static, StreamItem>
        + Send
        + Sync,
{
    async fn transform(
        &self,
        upstream: Upstream,
        ctx: SharedContext,
    ) -> Result<Box<dyn ItemSource>, FlowError> {
        let output = (self.f)(upstream.into_stream(), ctx);
        Ok(Box::new(StreamSource::new(self.name.clone(), output)))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a transform from a closure mapping the upstream stream to an output stream.
///
/// ```
/// use futures::StreamExt;
/// use yaaf::traits::transform_fn;
///
/// let plus_one = transform_fn("plus_one", |upstream, _ctx| {
///     upstream
///         .map(|item| item.map(|v| serde_json::json!(v.as_i64().unwrap_or(0) + 1)))
///         .boxed()
/// });
/// ```
pub fn transform_fn<F>(name: impl Into<String>, f: F) -> FnTransform<F>
where
    F: Fn(BoxStream<'static, StreamItem>, SharedContext) -> BoxStream<'static, StreamItem>
        + Send
        + Sync,
{
    FnTransform {
        name: name.into(),
        f,
    }
}

/// In-memory sequence, yielded item by item.
pub struct IterSource {
    label: String,
    items: VecDeque<Value>,
}

impl IterSource {
    pub fn new(items: Vec<Value>) -> Self {
        Self::labelled("items", items)
    }

    pub fn labelled(label: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            label: label.into(),
            items: items.into(),
        }
    }
}

#[async_trait]
impl ItemSource for IterSource {
    async fn next_item(&mut self) -> Option<StreamItem> {
        self.items.pop_front().map(Ok)
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.items.clear();
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Adapts any boxed `futures` stream of items. Closing drops the stream.
pub struct StreamSource {
    label: String,
    inner: Option<BoxStream<'static, StreamItem>>,
}

impl StreamSource {
    pub fn new(label: impl Into<String>, stream: BoxStream<'static, StreamItem>) -> Self {
        Self {
            label: label.into(),
            inner: Some(stream),
        }
    }
}

#[async_trait]
impl ItemSource for StreamSource {
    async fn next_item(&mut self) -> Option<StreamItem> {
        match self.inner.as_mut() {
            Some(stream) => stream.next().await,
            None => None,
        }
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.inner = None;
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;
    use serde_json::json;

    struct ShapeShifter {
        declared: StepKind,
    }

    #[async_trait]
    impl StreamHandler for ShapeShifter {
        async fn handle(&self, item: Value, _ctx: &mut ExecutionContext) -> Result<Emit, FlowError> {
            Ok(Emit::One(item))
        }

        fn name(&self) -> &str {
            "shape_shifter"
        }
    }

    impl DeclaredStep for ShapeShifter {
        fn name(&self) -> &str {
            "shape_shifter"
        }

        fn declared_kind(&self) -> StepKind {
            self.declared
        }

        fn as_handler(self: Arc<Self>) -> Option<Arc<dyn StreamHandler>> {
            Some(self)
        }
    }

    #[test]
    fn test_classify_matches_declared_kind() {
        let step = classify(Arc::new(ShapeShifter {
            declared: StepKind::Handler,
        }))
        .unwrap();
        assert_eq!(step.kind(), StepKind::Handler);
        assert_eq!(step.name(), "shape_shifter");
    }

    #[test]
    fn test_classify_rejects_mismatched_shape() {
        for declared in [StepKind::Transform, StepKind::Middleware] {
            let err = classify(Arc::new(ShapeShifter { declared })).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::TypeMismatch);
            assert!(err.to_string().contains(&format!("declared as {}", declared)));
        }
    }

    #[test]
    fn test_emit_from_option() {
        assert!(matches!(Emit::from(None), Emit::Nothing));
        assert!(matches!(Emit::from(Some(json!(3))), Emit::One(v) if v == json!(3)));
    }

    #[tokio::test]
    async fn test_stream_source_close_ends_sequence() {
        let stream = futures::stream::iter(vec![Ok(json!(1)), Ok(json!(2))]).boxed();
        let mut source = StreamSource::new("numbers", stream);

        assert_eq!(source.next_item().await.unwrap().unwrap(), json!(1));
        source.close().await.unwrap();
        assert!(source.next_item().await.is_none());
        source.close().await.unwrap();
    }
}
