// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The mutable state record threaded through every step of a run.
//!
//! A run owns exactly one [`ExecutionContext`] and hands it to each step as `&mut`. The
//! engine never copies it implicitly; the only deep copy happens at a pipeline embedding
//! boundary configured with [`EmbeddingMode::Copy`](crate::engine::EmbeddingMode::Copy).

mod cleanup;
mod side_channel;

use std::future::Future;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::{BoxError, FlowError, LeakPoint};
use crate::traits::ItemSource;

pub use cleanup::{CleanupHook, CleanupStack, CleanupTask};
pub(crate) use cleanup::run_cleanup;
pub use side_channel::{Diagnostic, SideChannel};

/// Context shared between the stages of a streaming run.
pub type SharedContext = Arc<tokio::sync::Mutex<ExecutionContext>>;

/// Business data carried by a context. The engine never looks inside `Data`.
pub enum Payload {
    Data(Arc<Value>),
    /// An active, not yet drained asynchronous sequence.
    Stream(Box<dyn ItemSource>),
}

impl Default for Payload {
    fn default() -> Self {
        Payload::Data(Arc::new(Value::Null))
    }
}

impl std::fmt::Debug for Payload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Payload::Data(value) => f.debug_tuple("Data").field(value).finish(),
            Payload::Stream(source) => f.debug_tuple("Stream").field(&source.label()).finish(),
        }
    }
}

/// State captured before a step runs so a skipped step leaves no trace.
#[derive(Debug)]
pub struct Checkpoint {
    payload: Option<Arc<Value>>,
    stop: bool,
    jump_target: Option<String>,
    error: Option<String>,
    values: Arc<std::collections::HashMap<String, Value>>,
}

impl Checkpoint {
    /// Whether the payload was data when the checkpoint was taken. Restoring such a
    /// checkpoint replaces any stream the step installed, so that stream must be closed first.
    pub fn holds_data(&self) -> bool {
        self.payload.is_some()
    }
}

#[derive(Default)]
pub struct ExecutionContext {
    payload: Payload,
    side_channel: SideChannel,
    cleanup: CleanupStack,
    trace: Vec<String>,
    steps: usize,
    /// Once set, no further step executes in the current run.
    pub stop: bool,
    /// Name of the step to continue at; consumed and cleared by the engine.
    pub jump_target: Option<String>,
    pub session_id: Option<String>,
    /// Message of the failure that halted the last run, if any.
    pub error: Option<String>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(value: impl Into<Value>) -> Self {
        Self {
            payload: Payload::Data(Arc::new(value.into())),
            ..Self::default()
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The data payload, or `None` while the payload is a stream.
    pub fn data(&self) -> Option<&Value> {
        match &self.payload {
            Payload::Data(value) => Some(value),
            Payload::Stream(_) => None,
        }
    }

    pub fn data_mut(&mut self) -> Option<&mut Value> {
        match &mut self.payload {
            Payload::Data(value) => Some(Arc::make_mut(value)),
            Payload::Stream(_) => None,
        }
    }

    pub fn set_data(&mut self, value: impl Into<Value>) {
        self.payload = Payload::Data(Arc::new(value.into()));
    }

    pub fn set_payload(&mut self, payload: Payload) {
        self.payload = payload;
    }

    /// Move the payload out, leaving `Data(null)` behind.
    pub fn take_payload(&mut self) -> Payload {
        std::mem::take(&mut self.payload)
    }

    pub fn set_stream(&mut self, source: Box<dyn ItemSource>) {
        self.payload = Payload::Stream(source);
    }

    pub fn take_stream(&mut self) -> Option<Box<dyn ItemSource>> {
        match self.take_payload() {
            Payload::Stream(source) => Some(source),
            data => {
                self.payload = data;
                None
            }
        }
    }

    pub fn has_active_stream(&self) -> bool {
        matches!(self.payload, Payload::Stream(_))
    }

    /// Request a jump to the named step once the current step returns.
    pub fn goto(&mut self, step: impl Into<String>) {
        self.jump_target = Some(step.into());
    }

    pub fn halt(&mut self) {
        self.stop = true;
    }

    pub fn side_channel(&self) -> &SideChannel {
        &self.side_channel
    }

    pub fn side_channel_mut(&mut self) -> &mut SideChannel {
        &mut self.side_channel
    }

    /// Register a task to run during the cleanup phase of the current run.
    pub fn register_cleanup<F, Fut>(&mut self, label: impl Into<String>, task: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.cleanup.push(CleanupTask::new(label, task));
    }

    pub fn register_cleanup_sync<F>(&mut self, label: impl Into<String>, task: F)
    where
        F: FnOnce() -> Result<(), BoxError> + Send + 'static,
    {
        self.cleanup.push(CleanupTask::sync(label, task));
    }

    pub fn push_cleanup(&mut self, task: CleanupTask) {
        self.cleanup.push(task);
    }

    pub fn pending_cleanup(&self) -> usize {
        self.cleanup.depth()
    }

    /// Move the pending cleanup tasks out, leaving an empty stack.
    pub(crate) fn take_cleanup(&mut self) -> CleanupStack {
        std::mem::take(&mut self.cleanup)
    }

    /// Put `stack` back underneath whatever is pending now.
    pub(crate) fn restore_cleanup(&mut self, stack: CleanupStack) {
        let pending = std::mem::replace(&mut self.cleanup, stack);
        self.cleanup.absorb(pending);
    }

    /// Names of the steps executed so far, in order.
    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub(crate) fn record_step(&mut self, name: &str) {
        self.trace.push(name.to_string());
        self.steps += 1;
    }

    /// Deep copy for an embedding boundary. The copy starts with an empty cleanup stack.
    ///
    /// Fails with `StructuralLeak` when the payload is a live stream, which cannot be
    /// duplicated without one copy abandoning it.
    pub fn try_clone(&self, step: &str) -> Result<Self, FlowError> {
        let payload = match &self.payload {
            Payload::Data(value) => Payload::Data(Arc::new(Value::clone(value))),
            Payload::Stream(_) => {
                return Err(FlowError::StructuralLeak {
                    point: LeakPoint::Copy {
                        step: step.to_string(),
                    },
                })
            }
        };
        Ok(Self {
            payload,
            side_channel: self.side_channel.clone(),
            cleanup: CleanupStack::default(),
            trace: self.trace.clone(),
            steps: self.steps,
            stop: self.stop,
            jump_target: self.jump_target.clone(),
            session_id: self.session_id.clone(),
            error: self.error.clone(),
        })
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            payload: match &self.payload {
                Payload::Data(value) => Some(Arc::clone(value)),
                Payload::Stream(_) => None,
            },
            stop: self.stop,
            jump_target: self.jump_target.clone(),
            error: self.error.clone(),
            values: self.side_channel.snapshot_values(),
        }
    }

    /// Roll back to `checkpoint`. A stream payload present at checkpoint time cannot be
    /// captured, so whatever payload the step left behind is kept in that case.
    pub fn restore(&mut self, checkpoint: Checkpoint) {
        if let Some(value) = checkpoint.payload {
            self.payload = Payload::Data(value);
        }
        self.stop = checkpoint.stop;
        self.jump_target = checkpoint.jump_target;
        self.error = checkpoint.error;
        self.side_channel.restore_values(checkpoint.values);
    }

    /// Take over the state of `other`, keeping this context's own cleanup stack.
    pub fn adopt(&mut self, other: ExecutionContext) {
        let ExecutionContext {
            payload,
            side_channel,
            cleanup: _,
            trace,
            steps,
            stop,
            jump_target,
            session_id,
            error,
        } = other;
        self.payload = payload;
        self.side_channel = side_channel;
        self.trace = trace;
        self.steps = steps;
        self.stop = stop;
        self.jump_target = jump_target;
        self.session_id = session_id;
        self.error = error;
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("payload", &self.payload)
            .field("stop", &self.stop)
            .field("jump_target", &self.jump_target)
            .field("session_id", &self.session_id)
            .field("error", &self.error)
            .field("steps", &self.steps)
            .field("trace", &self.trace)
            .field("side_channel", &self.side_channel)
            .field("pending_cleanup", &self.cleanup.depth())
            .finish()
    }
}
