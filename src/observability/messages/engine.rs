// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for sequential pipeline runs.
//!
//! This module contains message types for logging events related to:
//! * Run lifecycle (start, completion, stop, halt)
//! * Control flow (jumps, skipped and aborted steps, name rebinding)
//! * The cleanup phase
//! * Pipelines embedded as a single step of another pipeline

use crate::errors::FlowError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// Run started.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use yaaf::observability::messages::engine::RunStarted;
///
/// let msg = RunStarted {
///     pipeline: "text",
///     step_count: 5,
///     start_position: 0,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct RunStarted<'a> {
    pub pipeline: &'a str,
    pub step_count: usize,
    pub start_position: usize,
}

impl Display for RunStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Starting pipeline '{}': {} steps, start_position={}",
            self.pipeline, self.step_count, self.start_position
        )
    }
}

impl StructuredLog for RunStarted<'_> {
    fn log(&self) {
        tracing::info!(
            pipeline = self.pipeline,
            step_count = self.step_count,
            start_position = self.start_position,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run",
            span_name = name,
            pipeline = self.pipeline,
            step_count = self.step_count,
            start_position = self.start_position,
        )
    }
}

/// Run finished by walking off the end of the registry.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunCompleted<'a> {
    pub pipeline: &'a str,
    pub steps_executed: usize,
    pub duration: Duration,
}

impl Display for RunCompleted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' completed: {} steps executed in {:?}",
            self.pipeline, self.steps_executed, self.duration
        )
    }
}

impl StructuredLog for RunCompleted<'_> {
    fn log(&self) {
        tracing::info!(
            pipeline = self.pipeline,
            steps_executed = self.steps_executed,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_completed",
            span_name = name,
            pipeline = self.pipeline,
            steps_executed = self.steps_executed,
            duration = ?self.duration,
        )
    }
}

/// A step set `stop`; remaining steps are not executed.
///
/// # Log Level
/// `info!` - Important operational event
pub struct RunStopped<'a> {
    pub pipeline: &'a str,
    pub step: &'a str,
}

impl Display for RunStopped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' stopped by step '{}'",
            self.pipeline, self.step
        )
    }
}

impl StructuredLog for RunStopped<'_> {
    fn log(&self) {
        tracing::info!(pipeline = self.pipeline, step = self.step, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "run_stopped",
            span_name = name,
            pipeline = self.pipeline,
            step = self.step,
        )
    }
}

/// Run halted with an error. Cleanup has already executed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use yaaf::errors::FlowError;
/// use yaaf::observability::messages::engine::RunHalted;
///
/// let error = FlowError::abort("validate", "empty input");
/// let msg = RunHalted {
///     pipeline: "text",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct RunHalted<'a> {
    pub pipeline: &'a str,
    pub error: &'a FlowError,
}

impl Display for RunHalted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Pipeline '{}' halted: {}", self.pipeline, self.error)
    }
}

impl StructuredLog for RunHalted<'_> {
    fn log(&self) {
        tracing::error!(
            pipeline = self.pipeline,
            kind = %self.error.kind(),
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "run_halted",
            span_name = name,
            pipeline = self.pipeline,
            kind = %self.error.kind(),
        )
    }
}

/// A jump target was resolved.
///
/// # Log Level
/// `debug!` - Control flow detail
pub struct JumpResolved<'a> {
    pub pipeline: &'a str,
    pub from: &'a str,
    pub target: &'a str,
    pub position: usize,
}

impl Display for JumpResolved<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' jumping from '{}' to '{}' (position {})",
            self.pipeline, self.from, self.target, self.position
        )
    }
}

impl StructuredLog for JumpResolved<'_> {
    fn log(&self) {
        tracing::debug!(
            pipeline = self.pipeline,
            from = self.from,
            target = self.target,
            position = self.position,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "jump",
            span_name = name,
            pipeline = self.pipeline,
            from = self.from,
            target = self.target,
        )
    }
}

/// A step declined to run and its changes were rolled back.
///
/// # Log Level
/// `debug!` - Control flow detail
pub struct StepSkipped<'a> {
    pub pipeline: &'a str,
    pub step: &'a str,
}

impl Display for StepSkipped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Step '{}' in pipeline '{}' skipped",
            self.step, self.pipeline
        )
    }
}

impl StructuredLog for StepSkipped<'_> {
    fn log(&self) {
        tracing::debug!(pipeline = self.pipeline, step = self.step, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "step_skipped",
            span_name = name,
            pipeline = self.pipeline,
            step = self.step,
        )
    }
}

/// A step ended the run.
///
/// # Log Level
/// `warn!` - The run will halt
pub struct StepAborted<'a> {
    pub pipeline: &'a str,
    pub step: &'a str,
    pub error: &'a FlowError,
}

impl Display for StepAborted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Step '{}' in pipeline '{}' aborted: {}",
            self.step, self.pipeline, self.error
        )
    }
}

impl StructuredLog for StepAborted<'_> {
    fn log(&self) {
        tracing::warn!(
            pipeline = self.pipeline,
            step = self.step,
            kind = %self.error.kind(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "step_aborted",
            span_name = name,
            pipeline = self.pipeline,
            step = self.step,
        )
    }
}

/// A name was registered twice and now resolves to the newer step.
///
/// # Log Level
/// `warn!` - Usually a configuration mistake
pub struct StepNameRebound<'a> {
    pub name: &'a str,
    pub previous_position: usize,
    pub position: usize,
}

impl Display for StepNameRebound<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Step name '{}' rebound from position {} to {}; the earlier step stays registered",
            self.name, self.previous_position, self.position
        )
    }
}

impl StructuredLog for StepNameRebound<'_> {
    fn log(&self) {
        tracing::warn!(
            step = self.name,
            previous_position = self.previous_position,
            position = self.position,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "step_rebound",
            span_name = name,
            step = self.name,
            position = self.position,
        )
    }
}

/// Cleanup phase started.
///
/// # Log Level
/// `debug!`
pub struct CleanupStarted<'a> {
    pub pipeline: &'a str,
    pub task_count: usize,
}

impl Display for CleanupStarted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Running {} cleanup tasks for pipeline '{}'",
            self.task_count, self.pipeline
        )
    }
}

impl StructuredLog for CleanupStarted<'_> {
    fn log(&self) {
        tracing::debug!(
            pipeline = self.pipeline,
            task_count = self.task_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "cleanup",
            span_name = name,
            pipeline = self.pipeline,
            task_count = self.task_count,
        )
    }
}

/// A cleanup task failed. Remaining tasks still run.
///
/// # Log Level
/// `warn!`
pub struct CleanupTaskFailed<'a> {
    pub pipeline: &'a str,
    pub task: &'a str,
    pub error: &'a str,
}

impl Display for CleanupTaskFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Cleanup task '{}' for pipeline '{}' failed: {}",
            self.task, self.pipeline, self.error
        )
    }
}

impl StructuredLog for CleanupTaskFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            pipeline = self.pipeline,
            task = self.task,
            error = self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "cleanup_task_failed",
            span_name = name,
            pipeline = self.pipeline,
            task = self.task,
        )
    }
}

/// Entering a pipeline embedded as a step.
///
/// # Log Level
/// `debug!`
pub struct EmbeddedRunEntered<'a> {
    pub child: &'a str,
    pub mode: &'a str,
}

impl Display for EmbeddedRunEntered<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Entering nested pipeline '{}' ({} context)",
            self.child, self.mode
        )
    }
}

impl StructuredLog for EmbeddedRunEntered<'_> {
    fn log(&self) {
        tracing::debug!(child = self.child, mode = self.mode, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "nested",
            span_name = name,
            child = self.child,
            mode = self.mode,
        )
    }
}

pub struct EmbeddedRunExited<'a> {
    pub child: &'a str,
    pub stopped: bool,
}

impl Display for EmbeddedRunExited<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Exiting nested pipeline '{}' (stopped={})",
            self.child, self.stopped
        )
    }
}

impl StructuredLog for EmbeddedRunExited<'_> {
    fn log(&self) {
        tracing::debug!(child = self.child, stopped = self.stopped, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("nested_exit", span_name = name, child = self.child)
    }
}

pub struct EmbeddedRunFailed<'a> {
    pub child: &'a str,
    pub error: &'a FlowError,
}

impl Display for EmbeddedRunFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Nested pipeline '{}' failed: {}", self.child, self.error)
    }
}

impl StructuredLog for EmbeddedRunFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            child = self.child,
            kind = %self.error.kind(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("nested_failed", span_name = name, child = self.child)
    }
}
