// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Deferred cleanup tasks and the per-run cleanup phase.
//!
//! Steps push tasks onto a stack carried by the [`ExecutionContext`]. The running pipeline
//! moves them into a stack of its own after every step, so a step that swaps in a whole new
//! context cannot lose them. When the run ends that stack is executed newest first. Tasks
//! already on the context when a run starts belong to an enclosing run and are handed back
//! untouched.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;

use crate::context::ExecutionContext;
use crate::errors::BoxError;
use crate::observability::messages::engine::{CleanupStarted, CleanupTaskFailed};
use crate::observability::messages::StructuredLog;

type CleanupAction = Box<dyn FnOnce() -> BoxFuture<'static, Result<(), BoxError>> + Send>;

/// Reusable cleanup hook registered on a pipeline; invoked once per run.
pub type CleanupHook = Arc<dyn Fn() -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// A zero-argument deferred action, executed exactly once.
pub struct CleanupTask {
    label: String,
    action: CleanupAction,
}

impl CleanupTask {
    pub fn new<F, Fut>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(move || task().boxed()),
        }
    }

    pub fn sync<F>(label: impl Into<String>, task: F) -> Self
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        Self {
            label: label.into(),
            action: Box::new(move || futures::future::ready(task()).boxed()),
        }
    }

    pub(crate) fn from_hook(label: impl Into<String>, hook: CleanupHook) -> Self {
        Self {
            label: label.into(),
            action: Box::new(move || hook()),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    async fn execute(self) -> Result<(), String> {
        let action = self.action;
        let future = match std::panic::catch_unwind(AssertUnwindSafe(action)) {
            Ok(future) => future,
            Err(payload) => return Err(panic_message(payload)),
        };
        match AssertUnwindSafe(future).catch_unwind().await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(panic_message(payload)),
        }
    }
}

impl std::fmt::Debug for CleanupTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupTask")
            .field("label", &self.label)
            .finish()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", text)
    } else if let Some(text) = payload.downcast_ref::<String>() {
        format!("panicked: {}", text)
    } else {
        "panicked".to_string()
    }
}

/// Stack of pending cleanup tasks.
#[derive(Debug, Default)]
pub struct CleanupStack {
    tasks: Vec<CleanupTask>,
}

impl CleanupStack {
    pub fn push(&mut self, task: CleanupTask) {
        self.tasks.push(task);
    }

    pub fn depth(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Move every task of `newer` on top of this stack, keeping their order.
    pub fn absorb(&mut self, mut newer: CleanupStack) {
        self.tasks.append(&mut newer.tasks);
    }
}

/// Execute every task of `stack`, newest first.
///
/// A failing task is logged and recorded as a diagnostic on the context; the remaining
/// tasks still run and the run's outcome is left untouched.
pub(crate) async fn run_cleanup(mut stack: CleanupStack, ctx: &mut ExecutionContext, pipeline: &str) {
    if stack.is_empty() {
        return;
    }

    CleanupStarted {
        pipeline,
        task_count: stack.depth(),
    }
    .log();

    while let Some(task) = stack.tasks.pop() {
        let label = task.label.clone();
        if let Err(message) = task.execute().await {
            CleanupTaskFailed {
                pipeline,
                task: &label,
                error: &message,
            }
            .log();
            ctx.side_channel_mut()
                .record_diagnostic(format!("cleanup:{}", label), message);
        }
    }
}
