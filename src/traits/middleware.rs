// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use async_trait::async_trait;
use futures::future::BoxFuture;

use crate::context::ExecutionContext;
use crate::errors::{BoxError, FlowError};

/// What a step asks the sequential engine to do next.
#[derive(Debug)]
pub enum StepOutcome {
    /// Keep the step's changes and follow `stop`/`jump_target`.
    Continue,
    /// Treat the step as a no-op: the pre-step context is restored and the run advances.
    Skip,
    /// End the run. Cleanup executes before the error reaches the caller.
    Abort(FlowError),
}

impl StepOutcome {
    pub fn abort(step: impl Into<String>, reason: impl Into<String>) -> Self {
        StepOutcome::Abort(FlowError::abort(step, reason))
    }

    /// Report an arbitrary failure. The engine reclassifies it as an abort.
    pub fn fail(step: impl Into<String>, error: impl Into<BoxError>) -> Self {
        StepOutcome::Abort(FlowError::unclassified(step, error))
    }
}

impl From<FlowError> for StepOutcome {
    fn from(error: FlowError) -> Self {
        StepOutcome::Abort(error)
    }
}

impl From<Result<(), FlowError>> for StepOutcome {
    fn from(result: Result<(), FlowError>) -> Self {
        match result {
            Ok(()) => StepOutcome::Continue,
            Err(e) => StepOutcome::Abort(e),
        }
    }
}

/// A step of a sequential pipeline.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome;

    /// Default registration name.
    fn name(&self) -> &str;

    fn description(&self) -> Option<&str> {
        None
    }
}

/// Middleware backed by an async closure.
pub struct FnMiddleware<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, StepOutcome> + Send + Sync,
{
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        (self.f)(ctx).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a middleware from a closure returning a boxed future.
///
/// ```
/// use futures::FutureExt;
/// use yaaf::traits::{middleware_fn, StepOutcome};
///
/// let bump = middleware_fn("bump", |ctx| {
///     async move {
///         if let Some(n) = ctx.data().and_then(|v| v.as_i64()) {
///             ctx.set_data(n + 1);
///         }
///         StepOutcome::Continue
///     }
///     .boxed()
/// });
/// ```
pub fn middleware_fn<F>(name: impl Into<String>, f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut ExecutionContext) -> BoxFuture<'a, StepOutcome> + Send + Sync,
{
    FnMiddleware {
        name: name.into(),
        f,
    }
}

/// Middleware backed by a synchronous closure.
pub struct SyncFnMiddleware<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F> Middleware for SyncFnMiddleware<F>
where
    F: Fn(&mut ExecutionContext) -> StepOutcome + Send + Sync,
{
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        (self.f)(ctx)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

pub fn sync_middleware_fn<F>(name: impl Into<String>, f: F) -> SyncFnMiddleware<F>
where
    F: Fn(&mut ExecutionContext) -> StepOutcome + Send + Sync,
{
    SyncFnMiddleware {
        name: name.into(),
        f,
    }
}
