// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Step implementations shipped with yaaf.
//!
//! # Available Backends
//!
//! ## Local Backend
//! In-process text steps that declarative pipeline files can name:
//! - **Text Transformation**: case conversion, reversal, prefix/suffix addition
//! - **Text Analysis**: token counting into the side channel
//! - **Routing**: `jump_when` and `stop_when`
//!
//! ## Stub Backend (Test-Only)
//! Helpers for engine tests (only available in test builds):
//! - **Appender**: appends a fixed suffix to the payload
//! - **Failing** / **Panicking**: exercise the abort paths
//! - **TrackedSource**: a stream source that counts pulls and closes
//!
//! # Architecture
//!
//! ```text
//! StepConfig → LocalStepFactory → Arc<dyn Middleware> → SequentialPipeline
//! ```
//!
//! # Examples
//!
//! ```rust
//! use yaaf::backends::local::LocalStepFactory;
//! use yaaf::config::StepConfig;
//! use std::collections::HashMap;
//!
//! let config = StepConfig {
//!     name: "flip".to_string(),
//!     step: "reverse_text".to_string(),
//!     description: None,
//!     options: HashMap::new(),
//! };
//!
//! let step = LocalStepFactory::create_step(&config)?;
//! assert_eq!(step.name(), "flip");
//! # Ok::<(), yaaf::errors::ConfigError>(())
//! ```

pub mod local;
#[cfg(test)]
pub mod stub;
