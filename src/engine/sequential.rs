// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use crate::config::{PipelineOptions, Registered, StepRegistry};
use crate::context::{run_cleanup, CleanupHook, CleanupStack, CleanupTask, ExecutionContext};
use crate::errors::{BoxError, FlowError, LeakPoint, RunError};
use crate::observability::messages::engine::{
    JumpResolved, RunCompleted, RunHalted, RunStarted, RunStopped, StepAborted, StepSkipped,
};
use crate::observability::messages::StructuredLog;
use crate::traits::{Middleware, StepOutcome};

use super::stage::close_detached;

/// What one call to [`SequentialPipeline::execute`] owns, independent of the context.
#[derive(Default)]
struct RunScope {
    cleanup: CleanupStack,
    executed: usize,
}

/// Sequential control-flow pipeline.
///
/// Steps run one at a time, in registration order, against a single mutable
/// [`ExecutionContext`]. After each step the engine inspects the context:
///
/// 1. `stop` set: the run ends immediately.
/// 2. `jump_target` set: the name is resolved against the registry, the cursor moves there
///    and the target is cleared. Unknown names fail with `InvalidJump`.
/// 3. Otherwise the cursor advances by one.
///
/// ## Failure Handling
///
/// A step returning [`StepOutcome::Abort`] (or panicking) ends the run. Unclassified
/// failures are reclassified as aborts. [`StepOutcome::Skip`] restores the context captured
/// right before the step and advances normally.
///
/// ## Cleanup
///
/// Tasks registered on the context during a run, plus the pipeline's own hooks, execute
/// exactly once when the run ends, newest first, whatever the outcome. The run moves them off
/// the context after every step, so a step may replace the context wholesale. A failing task is
/// recorded as a diagnostic and never changes the outcome.
///
/// ## Structural Leaks
///
/// A stream payload still active at a jump or when the run completes is an error: nothing
/// downstream would ever drain or close it.
pub struct SequentialPipeline {
    name: String,
    description: Option<String>,
    registry: StepRegistry<Arc<dyn Middleware>>,
    cleanup_hooks: Vec<(String, CleanupHook)>,
    options: PipelineOptions,
}

impl SequentialPipeline {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_options(name, PipelineOptions::default())
    }

    pub fn with_options(name: impl Into<String>, options: PipelineOptions) -> Self {
        Self {
            name: name.into(),
            description: None,
            registry: StepRegistry::with_policy(options.duplicate_names),
            cleanup_hooks: Vec::new(),
            options,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn registry(&self) -> &StepRegistry<Arc<dyn Middleware>> {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    /// Register a step under its own name.
    pub fn register<M: Middleware + 'static>(&mut self, step: M) -> &mut Self {
        self.register_shared(Arc::new(step), None, None)
    }

    /// Register a step under an explicit name and optional description.
    pub fn register_as<M: Middleware + 'static>(
        &mut self,
        step: M,
        name: impl Into<String>,
        description: Option<&str>,
    ) -> &mut Self {
        let name = name.into();
        self.register_shared(Arc::new(step), Some(name.as_str()), description)
    }

    pub fn register_shared(
        &mut self,
        step: Arc<dyn Middleware>,
        name: Option<&str>,
        description: Option<&str>,
    ) -> &mut Self {
        let name = name.unwrap_or_else(|| step.name()).to_string();
        let description = description
            .or_else(|| step.description())
            .map(str::to_string);
        self.registry.register(name, description, step);
        self
    }

    /// Register a hook that runs once during the cleanup phase of every run.
    ///
    /// Hooks are pushed before the first step, so they run after every task registered by
    /// the steps themselves.
    pub fn register_cleanup<F, Fut>(&mut self, label: impl Into<String>, task: F) -> &mut Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        let hook: CleanupHook = Arc::new(move || task().boxed());
        self.cleanup_hooks.push((label.into(), hook));
        self
    }

    /// Run the pipeline, consuming the context and handing it back.
    ///
    /// On failure the context travels inside the [`RunError`] with `stop` set.
    pub async fn run(&self, mut ctx: ExecutionContext) -> Result<ExecutionContext, RunError> {
        match self.execute(&mut ctx).await {
            Ok(()) => Ok(ctx),
            Err(error) => Err(RunError {
                pipeline: self.name.clone(),
                error,
                context: Box::new(ctx),
            }),
        }
    }

    /// Run against a fresh, default context.
    pub async fn run_default(&self) -> Result<ExecutionContext, RunError> {
        self.run(ExecutionContext::new()).await
    }

    /// Run in place. This is what embedding uses; the cleanup phase only covers tasks
    /// registered during this call.
    pub async fn execute(&self, ctx: &mut ExecutionContext) -> Result<(), FlowError> {
        let enclosing = ctx.take_cleanup();
        let mut scope = RunScope::default();
        for (label, hook) in &self.cleanup_hooks {
            scope
                .cleanup
                .push(CleanupTask::from_hook(label.clone(), Arc::clone(hook)));
        }

        let started = Instant::now();
        let outcome = self.drive(ctx, &mut scope).await;
        scope.cleanup.absorb(ctx.take_cleanup());

        ctx.jump_target = None;
        if let Err(error) = &outcome {
            ctx.stop = true;
            ctx.error = Some(error.to_string());
        }

        run_cleanup(scope.cleanup, ctx, &self.name).await;
        ctx.restore_cleanup(enclosing);

        match &outcome {
            Ok(()) => RunCompleted {
                pipeline: &self.name,
                steps_executed: scope.executed,
                duration: started.elapsed(),
            }
            .log(),
            Err(error) => RunHalted {
                pipeline: &self.name,
                error,
            }
            .log(),
        }

        outcome
    }

    async fn drive(&self, ctx: &mut ExecutionContext, scope: &mut RunScope) -> Result<(), FlowError> {
        let mut cursor = match ctx.jump_target.take() {
            Some(target) => self.registry.resolve(&target)?,
            None => 0,
        };

        RunStarted {
            pipeline: &self.name,
            step_count: self.registry.len(),
            start_position: cursor,
        }
        .log();

        if ctx.stop {
            return Ok(());
        }

        while let Some(entry) = self.registry.get(cursor) {
            let checkpoint = ctx.checkpoint();
            let outcome = self.invoke(entry, ctx).await;
            ctx.record_step(&entry.name);
            scope.cleanup.absorb(ctx.take_cleanup());
            scope.executed += 1;

            match outcome {
                StepOutcome::Continue => {}
                StepOutcome::Skip => {
                    if checkpoint.holds_data() {
                        if let Some(mut stream) = ctx.take_stream() {
                            close_detached(stream.as_mut()).await;
                        }
                    }
                    ctx.restore(checkpoint);
                    StepSkipped {
                        pipeline: &self.name,
                        step: &entry.name,
                    }
                    .log();
                    cursor += 1;
                    continue;
                }
                StepOutcome::Abort(error) => {
                    let error = error.into_abort(&entry.name);
                    StepAborted {
                        pipeline: &self.name,
                        step: &entry.name,
                        error: &error,
                    }
                    .log();
                    return Err(error);
                }
            }

            if ctx.stop {
                RunStopped {
                    pipeline: &self.name,
                    step: &entry.name,
                }
                .log();
                return Ok(());
            }

            if let Some(target) = ctx.jump_target.take() {
                if ctx.has_active_stream() {
                    return Err(FlowError::StructuralLeak {
                        point: LeakPoint::Jump {
                            step: entry.name.clone(),
                            target,
                        },
                    });
                }
                let position = self.registry.resolve(&target)?;
                JumpResolved {
                    pipeline: &self.name,
                    from: &entry.name,
                    target: &target,
                    position,
                }
                .log();
                cursor = position;
                continue;
            }

            cursor += 1;
        }

        if ctx.has_active_stream() {
            return Err(FlowError::StructuralLeak {
                point: LeakPoint::Completion {
                    pipeline: self.name.clone(),
                },
            });
        }

        Ok(())
    }

    async fn invoke(
        &self,
        entry: &Registered<Arc<dyn Middleware>>,
        ctx: &mut ExecutionContext,
    ) -> StepOutcome {
        AssertUnwindSafe(entry.step.handle(ctx))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| StepOutcome::Abort(FlowError::from_panic(&entry.name, payload)))
    }
}

impl std::fmt::Debug for SequentialPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequentialPipeline")
            .field("name", &self.name)
            .field("steps", &self.registry.names())
            .field("cleanup_hooks", &self.cleanup_hooks.len())
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{Appender, Failing, Panicking};
    use crate::errors::ErrorKind;
    use crate::traits::sync_middleware_fn;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_registry_returns_context_unchanged() {
        let pipeline = SequentialPipeline::new("empty");
        let mut ctx = ExecutionContext::with_data("untouched").with_session("s-1");
        ctx.side_channel_mut().insert("k", 1);

        let result = pipeline.run(ctx).await.unwrap();

        assert_eq!(result.data(), Some(&json!("untouched")));
        assert_eq!(result.session_id.as_deref(), Some("s-1"));
        assert_eq!(result.side_channel().get("k"), Some(&json!(1)));
        assert_eq!(result.jump_target, None);
        assert!(!result.stop);
        assert!(result.trace().is_empty());
    }

    #[tokio::test]
    async fn test_initial_jump_target_sets_start_and_is_cleared() {
        let mut pipeline = SequentialPipeline::new("start");
        pipeline
            .register(Appender::new("a", "A"))
            .register(Appender::new("b", "B"))
            .register(Appender::new("c", "C"));

        let mut ctx = ExecutionContext::with_data("");
        ctx.goto("b");
        let result = pipeline.run(ctx).await.unwrap();

        assert_eq!(result.data(), Some(&json!("BC")));
        assert_eq!(result.trace(), ["b".to_string(), "c".to_string()]);
        assert_eq!(result.jump_target, None);
    }

    #[tokio::test]
    async fn test_initial_jump_to_unknown_name_runs_nothing() {
        let mut pipeline = SequentialPipeline::new("start");
        pipeline.register(Appender::new("a", "A"));

        let mut ctx = ExecutionContext::with_data("");
        ctx.goto("zzz");
        let err = pipeline.run(ctx).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::InvalidJump);
        let ctx = err.into_context();
        assert!(ctx.stop);
        assert_eq!(ctx.jump_target, None);
        assert_eq!(ctx.steps(), 0);
        assert_eq!(ctx.data(), Some(&json!("")));
    }

    #[tokio::test]
    async fn test_entering_with_stop_executes_no_step() {
        let mut pipeline = SequentialPipeline::new("stopped");
        pipeline.register(Appender::new("a", "A"));

        let mut ctx = ExecutionContext::with_data("");
        ctx.halt();
        let result = pipeline.run(ctx).await.unwrap();

        assert_eq!(result.data(), Some(&json!("")));
        assert_eq!(result.steps(), 0);
    }

    #[tokio::test]
    async fn test_failures_become_aborts_with_stop_set() {
        struct TestCase {
            name: &'static str,
            step: Arc<dyn Middleware>,
        }

        let test_cases = vec![
            TestCase {
                name: "unclassified failure",
                step: Arc::new(Failing::new("bad", "socket closed")),
            },
            TestCase {
                name: "panic",
                step: Arc::new(Panicking::new("bad")),
            },
            TestCase {
                name: "explicit abort",
                step: Arc::new(sync_middleware_fn("bad", |_ctx| {
                    StepOutcome::abort("bad", "refusing")
                })),
            },
        ];

        for case in test_cases {
            let mut pipeline = SequentialPipeline::new("failing");
            pipeline
                .register(Appender::new("before", "1"))
                .register_shared(case.step, None, None)
                .register(Appender::new("after", "2"));

            let err = pipeline.run(ExecutionContext::with_data("")).await.unwrap_err();

            assert_eq!(err.kind(), ErrorKind::Abort, "{}", case.name);
            let ctx = err.into_context();
            assert!(ctx.stop, "{}", case.name);
            assert!(ctx.error.is_some(), "{}", case.name);
            assert_eq!(ctx.data(), Some(&json!("1")), "{}", case.name);
        }
    }

    #[tokio::test]
    async fn test_skip_restores_pre_step_context() {
        let mut pipeline = SequentialPipeline::new("skip");
        pipeline
            .register(Appender::new("a", "A"))
            .register(sync_middleware_fn("meddler", |ctx| {
                ctx.set_data("garbage");
                ctx.side_channel_mut().insert("meddled", true);
                ctx.halt();
                StepOutcome::Skip
            }))
            .register(Appender::new("c", "C"));

        let result = pipeline.run(ExecutionContext::with_data("")).await.unwrap();

        assert_eq!(result.data(), Some(&json!("AC")));
        assert!(!result.side_channel().contains_key("meddled"));
        assert!(!result.stop);
    }

    #[tokio::test]
    async fn test_jump_with_active_stream_is_structural_leak() {
        use crate::traits::IterSource;

        let mut pipeline = SequentialPipeline::new("leaky");
        pipeline
            .register(sync_middleware_fn("streamer", |ctx| {
                ctx.set_stream(Box::new(IterSource::new(vec![json!(1)])));
                ctx.goto("end");
                StepOutcome::Continue
            }))
            .register(Appender::new("end", "!"));

        let err = pipeline.run_default().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::StructuralLeak);
        assert!(matches!(
            err.error,
            FlowError::StructuralLeak {
                point: LeakPoint::Jump { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_stream_left_at_completion_is_structural_leak() {
        use crate::traits::IterSource;

        let mut pipeline = SequentialPipeline::new("leaky");
        pipeline.register(sync_middleware_fn("streamer", |ctx| {
            ctx.set_stream(Box::new(IterSource::new(vec![])));
            StepOutcome::Continue
        }));

        let err = pipeline.run_default().await.unwrap_err();
        assert!(matches!(
            err.error,
            FlowError::StructuralLeak {
                point: LeakPoint::Completion { .. }
            }
        ));
        assert!(err.context.stop);
    }

    #[tokio::test]
    async fn test_pipeline_hooks_run_after_step_tasks() {
        use std::sync::Mutex;

        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut pipeline = SequentialPipeline::new("hooks");

        let hook_log = Arc::clone(&log);
        pipeline.register_cleanup("pipeline-hook", move || {
            let log = Arc::clone(&hook_log);
            async move {
                log.lock().unwrap().push("hook".to_string());
                Ok(())
            }
        });

        let step_log = Arc::clone(&log);
        pipeline.register(sync_middleware_fn("registers", move |ctx| {
            let log = Arc::clone(&step_log);
            ctx.register_cleanup_sync("step-task", move || {
                log.lock().unwrap().push("step".to_string());
                Ok(())
            });
            StepOutcome::Continue
        }));

        pipeline.run_default().await.unwrap();
        pipeline.run_default().await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["step", "hook", "step", "hook"]);
    }

    #[tokio::test]
    async fn test_step_replacing_a_reused_context() {
        let mut warmup = SequentialPipeline::new("warmup");
        warmup
            .register(Appender::new("a", "A"))
            .register(Appender::new("b", "B"));
        let ctx = warmup.run(ExecutionContext::with_data("")).await.unwrap();
        assert_eq!(ctx.steps(), 2);

        let mut pipeline = SequentialPipeline::new("replacing");
        pipeline.register(sync_middleware_fn("fresh", |ctx| {
            *ctx = ExecutionContext::with_data("fresh");
            StepOutcome::Continue
        }));

        let result = pipeline.run(ctx).await.unwrap();
        assert_eq!(result.data(), Some(&json!("fresh")));
        assert_eq!(result.trace(), ["fresh".to_string()]);
        assert!(!result.stop);
    }

    #[tokio::test]
    async fn test_cleanup_survives_context_replacement() {
        use std::sync::Mutex;

        let log = Arc::new(Mutex::new(Vec::<String>::new()));
        let mut pipeline = SequentialPipeline::new("replacing");

        let first = Arc::clone(&log);
        pipeline
            .register(sync_middleware_fn("reg", move |ctx| {
                let log = Arc::clone(&first);
                ctx.register_cleanup_sync("reg", move || {
                    log.lock().unwrap().push("reg".to_string());
                    Ok(())
                });
                StepOutcome::Continue
            }))
            .register(sync_middleware_fn("fresh", {
                let log = Arc::clone(&log);
                move |ctx: &mut ExecutionContext| {
                    let log = Arc::clone(&log);
                    let mut replacement = ExecutionContext::with_data("fresh");
                    replacement.register_cleanup_sync("fresh", move || {
                        log.lock().unwrap().push("fresh".to_string());
                        Ok(())
                    });
                    *ctx = replacement;
                    StepOutcome::Continue
                }
            }));

        let ctx = pipeline.run(ExecutionContext::with_data("")).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["fresh", "reg"]);
        assert_eq!(ctx.pending_cleanup(), 0);
    }

    #[tokio::test]
    async fn test_skip_closes_stream_installed_by_step() {
        use crate::backends::stub::TrackedSource;
        use std::sync::Mutex;

        let (source, probe) = TrackedSource::new("abandoned", vec![json!(1), json!(2)]);
        let source = Mutex::new(Some(source));

        let mut pipeline = SequentialPipeline::new("skip");
        pipeline
            .register(sync_middleware_fn("streamer", move |ctx| {
                if let Some(source) = source.lock().unwrap().take() {
                    ctx.set_stream(Box::new(source));
                }
                StepOutcome::Skip
            }))
            .register(Appender::new("after", "!"));

        let ctx = pipeline.run(ExecutionContext::with_data("")).await.unwrap();

        assert_eq!(probe.closes(), 1);
        assert_eq!(probe.pulls(), 0);
        assert_eq!(ctx.data(), Some(&json!("!")));
        assert!(!ctx.has_active_stream());
    }
}
