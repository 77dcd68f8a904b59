// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Stage plumbing for streaming pipelines.
//!
//! Each stage of a streaming run lives in a [`StageSlot`] owned by a [`StageArena`]. The
//! slot guards its source with a `closed` flag so the source's `close` runs at most once no
//! matter how many paths (the stage below it, the stage's own failure path, the arena's
//! teardown) ask for it. The arena closes every slot in reverse construction order.

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream};
use futures::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::context::SharedContext;
use crate::errors::FlowError;
use crate::observability::messages::stream::{StageCloseFailed, StageClosed, StageFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::{Emit, ItemSource, StreamHandler, StreamItem, StreamTransform};

struct StageSlot {
    label: String,
    source: Mutex<Box<dyn ItemSource>>,
    closed: AtomicBool,
}

impl StageSlot {
    async fn pull(&self) -> Option<StreamItem> {
        if self.closed.load(Ordering::Acquire) {
            return None;
        }
        self.source.lock().await.next_item().await
    }

    async fn close_once(&self) -> Result<(), FlowError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let result = self.source.lock().await.close().await;
        match &result {
            Ok(()) => StageClosed { stage: &self.label }.log(),
            Err(error) => StageCloseFailed {
                stage: &self.label,
                error,
            }
            .log(),
        }
        result
    }
}

/// Close a source no arena slot owns, logging a failure instead of returning it.
pub(crate) async fn close_detached(source: &mut dyn ItemSource) {
    if let Err(error) = source.close().await {
        StageCloseFailed {
            stage: source.label(),
            error: &error,
        }
        .log();
    }
}

/// Handle on the output of the previous stage.
///
/// Pulling after the stage was closed yields `None`. Closing is idempotent: only the first
/// call reaches the underlying source.
#[derive(Clone)]
pub struct Upstream {
    slot: Arc<StageSlot>,
}

impl Upstream {
    pub fn is_closed(&self) -> bool {
        self.slot.closed.load(Ordering::Acquire)
    }

    /// View the upstream as a `futures` stream. Closing remains the engine's job.
    pub fn into_stream(self) -> BoxStream<'static, StreamItem> {
        stream::unfold(self, |upstream| async move {
            upstream.slot.pull().await.map(|item| (item, upstream))
        })
        .boxed()
    }
}

#[async_trait]
impl ItemSource for Upstream {
    async fn next_item(&mut self) -> Option<StreamItem> {
        self.slot.pull().await
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.slot.close_once().await
    }

    fn label(&self) -> &str {
        &self.slot.label
    }
}

/// Every stage of one streaming run, in construction order.
#[derive(Default)]
pub(crate) struct StageArena {
    slots: Vec<Arc<StageSlot>>,
}

impl StageArena {
    pub(crate) fn push(&mut self, label: impl Into<String>, source: Box<dyn ItemSource>) -> Upstream {
        let slot = Arc::new(StageSlot {
            label: label.into(),
            source: Mutex::new(source),
            closed: AtomicBool::new(false),
        });
        self.slots.push(Arc::clone(&slot));
        Upstream { slot }
    }

    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Close every stage, newest first. All stages are closed even if some fail; the first
    /// failure is returned.
    pub(crate) async fn close_all(&mut self) -> Result<(), FlowError> {
        let mut first_error = None;
        while let Some(slot) = self.slots.pop() {
            if let Err(error) = slot.close_once().await {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// The normalized input of a run. Failures are attributed to the source stage.
pub(crate) struct SourceStage {
    label: String,
    inner: Box<dyn ItemSource>,
}

impl SourceStage {
    pub(crate) fn new(inner: Box<dyn ItemSource>) -> Self {
        Self {
            label: inner.label().to_string(),
            inner,
        }
    }
}

#[async_trait]
impl ItemSource for SourceStage {
    async fn next_item(&mut self) -> Option<StreamItem> {
        match self.inner.next_item().await? {
            Ok(value) => Some(Ok(value)),
            Err(error) => Some(Err(FlowError::at_stage(self.label.clone(), error))),
        }
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.inner.close().await
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Applies a handler per upstream item, flattening nested sequences.
///
/// Once it returns `None` or an error it is finished; its upstream has been closed by then.
pub(crate) struct HandlerStage {
    handler: Arc<dyn StreamHandler>,
    upstream: Upstream,
    ctx: SharedContext,
    nested: Option<Box<dyn ItemSource>>,
    finished: bool,
}

impl HandlerStage {
    pub(crate) fn new(handler: Arc<dyn StreamHandler>, upstream: Upstream, ctx: SharedContext) -> Self {
        Self {
            handler,
            upstream,
            ctx,
            nested: None,
            finished: false,
        }
    }

    async fn finish(&mut self) -> Result<(), FlowError> {
        self.finished = true;
        if let Some(mut nested) = self.nested.take() {
            close_detached(nested.as_mut()).await;
        }
        self.upstream.close().await
    }

    async fn fail(&mut self, error: FlowError) -> FlowError {
        // the handler error wins over a close failure, which the slot has logged
        let _ = self.finish().await;
        let error = FlowError::at_stage(self.handler.name(), error);
        StageFailed {
            stage: self.handler.name(),
            error: &error,
        }
        .log();
        error
    }

    async fn pull_nested(&mut self) -> Option<StreamItem> {
        let nested = self.nested.as_mut()?;
        match nested.next_item().await {
            Some(item) => Some(item),
            None => {
                close_detached(nested.as_mut()).await;
                self.nested = None;
                None
            }
        }
    }

    async fn apply(&mut self, item: Value) -> Result<Emit, FlowError> {
        let mut ctx = self.ctx.lock().await;
        AssertUnwindSafe(self.handler.handle(item, &mut ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| Err(FlowError::from_panic(self.handler.name(), payload)))
    }
}

#[async_trait]
impl ItemSource for HandlerStage {
    async fn next_item(&mut self) -> Option<StreamItem> {
        loop {
            if self.finished {
                return None;
            }

            if self.nested.is_some() {
                match self.pull_nested().await {
                    Some(Ok(value)) => return Some(Ok(value)),
                    Some(Err(error)) => return Some(Err(self.fail(error).await)),
                    None => continue,
                }
            }

            let stopped = self.ctx.lock().await.stop;
            if stopped {
                return self.finish().await.err().map(Err);
            }

            let item = match self.upstream.next_item().await {
                Some(Ok(item)) => item,
                Some(Err(error)) => {
                    let _ = self.finish().await;
                    return Some(Err(error));
                }
                None => return self.finish().await.err().map(Err),
            };

            match self.apply(item).await {
                Ok(Emit::One(Value::Null)) | Ok(Emit::Nothing) => continue,
                Ok(Emit::One(value)) => return Some(Ok(value)),
                Ok(Emit::Many(nested)) => self.nested = Some(nested),
                Err(error) => return Some(Err(self.fail(error).await)),
            }
        }
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        if self.finished {
            return Ok(());
        }
        self.finish().await
    }

    fn label(&self) -> &str {
        self.handler.name()
    }
}

enum TransformState {
    Pending,
    Running(Box<dyn ItemSource>),
    Finished,
}

/// Hands the upstream to a transform on first pull and drives its output.
///
/// Whatever the transform does with its upstream, this stage closes it when the output
/// ends, fails, or is closed early.
pub(crate) struct TransformStage {
    transform: Arc<dyn StreamTransform>,
    upstream: Upstream,
    ctx: SharedContext,
    state: TransformState,
}

impl TransformStage {
    pub(crate) fn new(transform: Arc<dyn StreamTransform>, upstream: Upstream, ctx: SharedContext) -> Self {
        Self {
            transform,
            upstream,
            ctx,
            state: TransformState::Pending,
        }
    }

    async fn finish(&mut self) -> Result<(), FlowError> {
        if let TransformState::Running(mut output) =
            std::mem::replace(&mut self.state, TransformState::Finished)
        {
            close_detached(output.as_mut()).await;
        }
        self.upstream.close().await
    }

    async fn fail(&mut self, error: FlowError) -> FlowError {
        let _ = self.finish().await;
        let error = FlowError::at_stage(self.transform.name(), error);
        StageFailed {
            stage: self.transform.name(),
            error: &error,
        }
        .log();
        error
    }

    async fn start(&mut self) -> Result<(), FlowError> {
        let started = AssertUnwindSafe(
            self.transform
                .transform(self.upstream.clone(), Arc::clone(&self.ctx)),
        )
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(FlowError::from_panic(self.transform.name(), payload)))?;
        self.state = TransformState::Running(started);
        Ok(())
    }
}

#[async_trait]
impl ItemSource for TransformStage {
    async fn next_item(&mut self) -> Option<StreamItem> {
        if matches!(self.state, TransformState::Pending) {
            if let Err(error) = self.start().await {
                return Some(Err(self.fail(error).await));
            }
        }

        let output = match &mut self.state {
            TransformState::Running(output) => output,
            _ => return None,
        };

        let pulled = AssertUnwindSafe(output.next_item())
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Some(Err(FlowError::from_panic(self.transform.name(), payload)))
            });

        match pulled {
            Some(Ok(value)) => Some(Ok(value)),
            Some(Err(error)) => Some(Err(self.fail(error).await)),
            None => self.finish().await.err().map(Err),
        }
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.finish().await
    }

    fn label(&self) -> &str {
        self.transform.name()
    }
}
