// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for streaming pipelines.
//!
//! This module contains message types for logging events related to:
//! * Stage chain construction
//! * Stage failures
//! * Cascading close, including closes scheduled from `Drop`
//! * Rejected sources

use crate::errors::FlowError;
use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Stage chain built for a streaming run.
///
/// # Log Level
/// `debug!`
///
/// # Example
/// ```
/// use yaaf::observability::messages::stream::StreamBuilt;
///
/// let msg = StreamBuilt {
///     pipeline: "numbers",
///     source: "items",
///     stage_count: 3,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct StreamBuilt<'a> {
    pub pipeline: &'a str,
    pub source: &'a str,
    pub stage_count: usize,
}

impl Display for StreamBuilt<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Built streaming pipeline '{}' over source '{}' with {} stages",
            self.pipeline, self.source, self.stage_count
        )
    }
}

impl StructuredLog for StreamBuilt<'_> {
    fn log(&self) {
        tracing::debug!(
            pipeline = self.pipeline,
            source = self.source,
            stage_count = self.stage_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "stream",
            span_name = name,
            pipeline = self.pipeline,
            stage_count = self.stage_count,
        )
    }
}

/// A stage raised an error; upstream has been closed.
///
/// # Log Level
/// `warn!` - The consumer receives the error
pub struct StageFailed<'a> {
    pub stage: &'a str,
    pub error: &'a FlowError,
}

impl Display for StageFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}' failed: {}", self.stage, self.error)
    }
}

impl StructuredLog for StageFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            stage = self.stage,
            kind = %self.error.kind(),
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("stage_failed", span_name = name, stage = self.stage)
    }
}

/// A stage received its one close call.
///
/// # Log Level
/// `trace!`
pub struct StageClosed<'a> {
    pub stage: &'a str,
}

impl Display for StageClosed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Stage '{}' closed", self.stage)
    }
}

impl StructuredLog for StageClosed<'_> {
    fn log(&self) {
        tracing::trace!(stage = self.stage, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::trace_span!("stage_closed", span_name = name, stage = self.stage)
    }
}

/// A stage's close raised an error. The cascade continues.
///
/// # Log Level
/// `warn!`
pub struct StageCloseFailed<'a> {
    pub stage: &'a str,
    pub error: &'a FlowError,
}

impl Display for StageCloseFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Closing stage '{}' failed: {}", self.stage, self.error)
    }
}

impl StructuredLog for StageCloseFailed<'_> {
    fn log(&self) {
        tracing::warn!(stage = self.stage, error = %self.error, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("stage_close_failed", span_name = name, stage = self.stage)
    }
}

/// An output stream was dropped before it was exhausted or closed.
///
/// # Log Level
/// `debug!` when the close could be scheduled, `warn!` when no runtime was available
pub struct StreamDroppedWithoutClose<'a> {
    pub pipeline: &'a str,
    pub scheduled: bool,
}

impl Display for StreamDroppedWithoutClose<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        if self.scheduled {
            write!(
                f,
                "Output of pipeline '{}' dropped while open; close scheduled on the runtime",
                self.pipeline
            )
        } else {
            write!(
                f,
                "Output of pipeline '{}' dropped outside a runtime; stages released without close",
                self.pipeline
            )
        }
    }
}

impl StructuredLog for StreamDroppedWithoutClose<'_> {
    fn log(&self) {
        if self.scheduled {
            tracing::debug!(pipeline = self.pipeline, "{}", self);
        } else {
            tracing::warn!(pipeline = self.pipeline, "{}", self);
        }
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("stream_dropped", span_name = name, pipeline = self.pipeline)
    }
}

/// A blocking producer was handed to a streaming pipeline.
///
/// # Log Level
/// `error!`
pub struct BlockingSourceRejected<'a> {
    pub pipeline: &'a str,
}

impl Display for BlockingSourceRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Pipeline '{}' rejected a blocking source; provide an asynchronous source or an in-memory collection",
            self.pipeline
        )
    }
}

impl StructuredLog for BlockingSourceRejected<'_> {
    fn log(&self) {
        tracing::error!(pipeline = self.pipeline, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("blocking_source", span_name = name, pipeline = self.pipeline)
    }
}
