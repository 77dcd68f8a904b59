// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for human-readable output. Messages emitted from
//! the engines also implement [`StructuredLog`], which logs the message at its level with
//! its fields attached and can open a span carrying the same fields.
//!
//! # Organization
//!
//! * `engine` - sequential run lifecycle, control flow, cleanup, and embedding events
//! * `stream` - streaming pipeline construction, stage failures, and cascading close
//! * `steps` - built-in step creation and input handling
//!
//! # Usage Pattern
//!
//! ```rust
//! use yaaf::observability::messages::engine::RunStarted;
//! use yaaf::observability::messages::StructuredLog;
//!
//! let msg = RunStarted {
//!     pipeline: "text",
//!     step_count: 3,
//!     start_position: 0,
//! };
//!
//! msg.log();
//! let _span = msg.span("run");
//! ```

use tracing::Span;

pub mod engine;
pub mod steps;
pub mod stream;

/// A message that knows its own level and structured fields.
pub trait StructuredLog: std::fmt::Display {
    /// Emit the message as a tracing event.
    fn log(&self);

    /// Open a span carrying the message's fields.
    fn span(&self, name: &str) -> Span;
}
