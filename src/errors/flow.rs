// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for pipeline execution.
//!
//! Every failure a step or stage can produce is a [`FlowError`]. The variants map one to
//! one onto the engine's failure taxonomy (see [`ErrorKind`]); the only exception is
//! [`FlowError::Stage`], a step-identifying wrapper added by the streaming engine that
//! never changes the category of the failure it wraps.
//!
//! Skipping a step is not an error. It is expressed through
//! [`StepOutcome::Skip`](crate::traits::StepOutcome::Skip).

use std::any::Any;
use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::context::ExecutionContext;
use crate::traits::StepKind;

/// Boxed error used for failures that originate outside the engine.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Failure category of a [`FlowError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Explicit termination requested by a step (or a reclassified unclassified failure).
    Abort,
    /// A jump named a step that is not registered.
    InvalidJump,
    /// A live stream payload was left behind at a jump or at completion.
    StructuralLeak,
    /// A blocking producer was handed to the streaming engine.
    BlockingSourceRejected,
    /// A registered step's declared kind does not match its capabilities.
    TypeMismatch,
    /// Any other step failure.
    Unclassified,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            ErrorKind::Abort => "abort",
            ErrorKind::InvalidJump => "invalid_jump",
            ErrorKind::StructuralLeak => "structural_leak",
            ErrorKind::BlockingSourceRejected => "blocking_source_rejected",
            ErrorKind::TypeMismatch => "type_mismatch",
            ErrorKind::Unclassified => "unclassified",
        };
        f.write_str(label)
    }
}

/// Where a structural leak was detected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeakPoint {
    /// A step requested a jump while the payload was an active stream.
    Jump { step: String, target: String },
    /// The pipeline finished while the payload was an active stream.
    Completion { pipeline: String },
    /// A context holding an active stream was deep-copied at an embedding boundary.
    Copy { step: String },
}

impl Display for LeakPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            LeakPoint::Jump { step, target } => {
                write!(f, "at jump from '{}' to '{}'", step, target)
            }
            LeakPoint::Completion { pipeline } => {
                write!(f, "at completion of pipeline '{}'", pipeline)
            }
            LeakPoint::Copy { step } => {
                write!(f, "while copying the context into '{}'", step)
            }
        }
    }
}

/// Comprehensive error type for pipeline execution.
#[derive(Debug, Error)]
pub enum FlowError {
    /// A step deliberately ended the run.
    #[error("step '{step}' aborted the run: {reason}")]
    Aborted {
        step: String,
        reason: String,
        #[source]
        cause: Option<Box<FlowError>>,
    },

    /// Jump target not present in the registry.
    #[error("invalid jump: '{target}' is not a registered step (available: [{}])", .available.join(", "))]
    InvalidJump {
        target: String,
        available: Vec<String>,
    },

    /// An active stream payload would have been abandoned.
    #[error("structural leak: active stream payload {point}")]
    StructuralLeak { point: LeakPoint },

    /// Synchronous producers would stall the cooperative scheduler.
    #[error("blocking source rejected: {detail}")]
    BlockingSourceRejected { detail: String },

    /// Declared step kind and actual capabilities disagree.
    #[error("step '{step}' is declared as {declared} but {reason}")]
    TypeMismatch {
        step: String,
        declared: StepKind,
        reason: String,
    },

    /// Any other failure raised by a step.
    #[error("step '{step}' failed: {message}")]
    Unclassified {
        step: String,
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// Step-identifying context added by the streaming engine.
    #[error("stage '{step}' failed: {source}")]
    Stage {
        step: String,
        #[source]
        source: Box<FlowError>,
    },
}

impl FlowError {
    /// Explicit abort raised by `step`.
    pub fn abort(step: impl Into<String>, reason: impl Into<String>) -> Self {
        FlowError::Aborted {
            step: step.into(),
            reason: reason.into(),
            cause: None,
        }
    }

    /// Wrap an arbitrary error raised by `step`.
    pub fn unclassified(step: impl Into<String>, error: impl Into<BoxError>) -> Self {
        let error = error.into();
        FlowError::Unclassified {
            step: step.into(),
            message: error.to_string(),
            source: Some(error),
        }
    }

    /// Convert a caught panic payload into an unclassified failure.
    pub fn from_panic(step: impl Into<String>, payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(text) = payload.downcast_ref::<&str>() {
            format!("panicked: {}", text)
        } else if let Some(text) = payload.downcast_ref::<String>() {
            format!("panicked: {}", text)
        } else {
            "panicked".to_string()
        };
        FlowError::Unclassified {
            step: step.into(),
            message,
            source: None,
        }
    }

    /// Attach step-identifying context. Errors that already carry a stage are returned
    /// untouched so a failure is attributed to the stage that raised it.
    pub fn at_stage(step: impl Into<String>, error: FlowError) -> Self {
        match error {
            FlowError::Stage { .. } => error,
            other => FlowError::Stage {
                step: step.into(),
                source: Box::new(other),
            },
        }
    }

    /// Reclassify unclassified failures as aborts. Every other category keeps its identity.
    pub fn into_abort(self, step: &str) -> Self {
        match self.kind() {
            ErrorKind::Unclassified => FlowError::Aborted {
                step: step.to_string(),
                reason: "unhandled step failure".to_string(),
                cause: Some(Box::new(self)),
            },
            _ => self,
        }
    }

    /// The failure category, looking through [`FlowError::Stage`] wrappers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            FlowError::Aborted { .. } => ErrorKind::Abort,
            FlowError::InvalidJump { .. } => ErrorKind::InvalidJump,
            FlowError::StructuralLeak { .. } => ErrorKind::StructuralLeak,
            FlowError::BlockingSourceRejected { .. } => ErrorKind::BlockingSourceRejected,
            FlowError::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            FlowError::Unclassified { .. } => ErrorKind::Unclassified,
            FlowError::Stage { source, .. } => source.kind(),
        }
    }

    /// The innermost error beneath any stage wrappers.
    pub fn root(&self) -> &FlowError {
        match self {
            FlowError::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    /// Name of the stage this error is attributed to, if the streaming engine wrapped it.
    pub fn stage(&self) -> Option<&str> {
        match self {
            FlowError::Stage { step, .. } => Some(step),
            _ => None,
        }
    }
}

/// A sequential run that ended in failure.
///
/// Cleanup has already executed when this is returned. The carried context always has
/// `stop == true` and no pending jump target.
#[derive(Debug, Error)]
#[error("pipeline '{pipeline}' halted: {error}")]
pub struct RunError {
    pub pipeline: String,
    #[source]
    pub error: FlowError,
    pub context: Box<ExecutionContext>,
}

impl RunError {
    pub fn kind(&self) -> ErrorKind {
        self.error.kind()
    }

    pub fn into_context(self) -> ExecutionContext {
        *self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_wrapper_preserves_kind() {
        let cases = vec![
            (FlowError::abort("a", "no"), ErrorKind::Abort),
            (
                FlowError::InvalidJump {
                    target: "x".into(),
                    available: vec![],
                },
                ErrorKind::InvalidJump,
            ),
            (FlowError::unclassified("b", "boom"), ErrorKind::Unclassified),
            (
                FlowError::BlockingSourceRejected {
                    detail: "sync".into(),
                },
                ErrorKind::BlockingSourceRejected,
            ),
        ];

        for (error, expected) in cases {
            let wrapped = FlowError::at_stage("stage", error);
            assert_eq!(wrapped.kind(), expected);
            assert_eq!(wrapped.stage(), Some("stage"));
        }
    }

    #[test]
    fn test_at_stage_does_not_double_wrap() {
        let inner = FlowError::at_stage("first", FlowError::abort("first", "stop"));
        let outer = FlowError::at_stage("second", inner);
        assert_eq!(outer.stage(), Some("first"));
        assert!(matches!(outer.root(), FlowError::Aborted { .. }));
    }

    #[test]
    fn test_unclassified_reclassified_as_abort() {
        let error = FlowError::unclassified("step", "io broke").into_abort("step");
        assert_eq!(error.kind(), ErrorKind::Abort);
        match error {
            FlowError::Aborted { cause: Some(cause), .. } => {
                assert_eq!(cause.kind(), ErrorKind::Unclassified);
                assert!(cause.to_string().contains("io broke"));
            }
            other => panic!("Expected Aborted with cause, got {:?}", other),
        }

        let jump = FlowError::InvalidJump {
            target: "x".into(),
            available: vec!["a".into()],
        };
        assert_eq!(jump.into_abort("step").kind(), ErrorKind::InvalidJump);
    }

    #[test]
    fn test_invalid_jump_lists_available_targets() {
        let error = FlowError::InvalidJump {
            target: "nowhere".into(),
            available: vec!["mw1".into(), "mw2".into()],
        };
        let message = error.to_string();
        assert!(message.contains("'nowhere'"));
        assert!(message.contains("mw1, mw2"));
    }

    #[test]
    fn test_panic_payload_message() {
        let error = FlowError::from_panic("p", Box::new("kaboom"));
        assert!(error.to_string().contains("panicked: kaboom"));
        let error = FlowError::from_panic("p", Box::new(String::from("owned")));
        assert!(error.to_string().contains("panicked: owned"));
    }
}
