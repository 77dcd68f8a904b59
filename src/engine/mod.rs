// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod adapter;
pub mod sequential;
mod stage;
pub mod streaming;

pub use adapter::{
    handler_to_transform, AsStep, EmbeddedPipeline, EmbeddedStream, EmbeddingMode,
    HandlerTransform, StreamCollector,
};
pub use sequential::SequentialPipeline;
pub use stage::Upstream;
pub use streaming::{FlowStream, StreamInput, StreamPipeline};
