// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod middleware;
pub mod stream;

pub use middleware::{middleware_fn, sync_middleware_fn, Middleware, StepOutcome};
pub use stream::{
    async_handler_fn, classify, handler_fn, transform_fn, DeclaredStep, Emit, ItemSource,
    IterSource, StepKind, StreamHandler, StreamItem, StreamSource, StreamStep, StreamTransform,
};
