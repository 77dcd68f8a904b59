// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! This module provides centralized message types for all diagnostic and operational
//! logging in the engine. Message types follow a struct-based pattern with `Display`
//! implementations to:
//!
//! * Keep log text out of the engine code paths
//! * Attach the same structured fields to every emission of an event
//! * Provide consistent logging output across both pipeline flavors
//!
//! Subscriber setup is left to the embedding application. The `yaaf` binary installs a
//! `tracing-subscriber` fmt layer filtered by `RUST_LOG`.
//!
//! # Usage
//!
//! ```rust
//! use yaaf::observability::messages::engine::StepAborted;
//!
//! let error = yaaf::errors::FlowError::abort("validate", "empty input");
//! let msg = StepAborted {
//!     pipeline: "text",
//!     step: "validate",
//!     error: &error,
//! };
//!
//! tracing::error!("{}", msg);
//! ```

pub mod messages;
