// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Test-only steps and sources.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::ExecutionContext;
use crate::errors::FlowError;
use crate::traits::{ItemSource, Middleware, StepOutcome, StreamItem};

/// Appends a fixed suffix to a string payload. Non-string payloads are replaced by the suffix.
pub struct Appender {
    name: String,
    suffix: String,
}

impl Appender {
    pub fn new(name: &str, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            suffix: suffix.to_string(),
        }
    }
}

#[async_trait]
impl Middleware for Appender {
    async fn handle(&self, ctx: &mut ExecutionContext) -> StepOutcome {
        let current = ctx.data().and_then(Value::as_str).unwrap_or_default();
        let next = format!("{}{}", current, self.suffix);
        ctx.set_data(next);
        StepOutcome::Continue
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A step that always reports an unclassified failure
pub struct Failing {
    name: String,
    message: String,
}

impl Failing {
    pub fn new(name: &str, message: &str) -> Self {
        Self {
            name: name.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Middleware for Failing {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> StepOutcome {
        StepOutcome::fail(self.name.clone(), self.message.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A step that panics
pub struct Panicking {
    name: String,
}

impl Panicking {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait]
impl Middleware for Panicking {
    async fn handle(&self, _ctx: &mut ExecutionContext) -> StepOutcome {
        panic!("step '{}' panicked", self.name)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Counters shared between a [`TrackedSource`] and the test observing it.
#[derive(Clone, Default)]
pub struct SourceProbe {
    pulls: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl SourceProbe {
    /// Number of `next_item` calls, including the ones that returned nothing.
    pub fn pulls(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closes() > 0
    }
}

/// In-memory source that records how it is pulled and closed.
pub struct TrackedSource {
    label: String,
    items: VecDeque<Value>,
    fail_at: Option<usize>,
    fail_close: bool,
    pulled: usize,
    probe: SourceProbe,
}

impl TrackedSource {
    pub fn new(label: &str, items: Vec<Value>) -> (Self, SourceProbe) {
        let probe = SourceProbe::default();
        let source = Self {
            label: label.to_string(),
            items: items.into(),
            fail_at: None,
            fail_close: false,
            pulled: 0,
            probe: probe.clone(),
        };
        (source, probe)
    }

    /// Yield an error instead of the item at `index` (zero-based).
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Report a failure from `close` (the close is still counted).
    pub fn failing_close(mut self) -> Self {
        self.fail_close = true;
        self
    }
}

#[async_trait]
impl ItemSource for TrackedSource {
    async fn next_item(&mut self) -> Option<StreamItem> {
        self.probe.pulls.fetch_add(1, Ordering::SeqCst);
        let index = self.pulled;
        let item = self.items.pop_front()?;
        self.pulled += 1;

        if self.fail_at == Some(index) {
            return Some(Err(FlowError::abort(
                self.label.clone(),
                format!("source failed at item {}", index),
            )));
        }
        Some(Ok(item))
    }

    async fn close(&mut self) -> Result<(), FlowError> {
        self.probe.closes.fetch_add(1, Ordering::SeqCst);
        self.items.clear();
        if self.fail_close {
            return Err(FlowError::abort(self.label.clone(), "close failed"));
        }
        Ok(())
    }

    fn label(&self) -> &str {
        &self.label
    }
}
