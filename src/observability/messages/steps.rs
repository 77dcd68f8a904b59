// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for the built-in local steps.
//!
//! This module contains message types for logging events related to:
//! * Step instantiation from configuration
//! * Payloads a text step cannot work with

use std::fmt::{Display, Formatter};

/// Step instantiation failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use yaaf::observability::messages::steps::StepCreationFailed;
///
/// let msg = StepCreationFailed {
///     step_name: "shout",
///     implementation: "change_text_case",
///     reason: "unknown case 'loud'",
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct StepCreationFailed<'a> {
    pub step_name: &'a str,
    pub implementation: &'a str,
    pub reason: &'a str,
}

impl Display for StepCreationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to create step '{}' ({}): {}",
            self.step_name, self.implementation, self.reason
        )
    }
}

/// A text step received a payload that is not a string.
///
/// # Log Level
/// `warn!`
pub struct NonTextPayload<'a> {
    pub step_name: &'a str,
    pub found: &'a str,
}

impl Display for NonTextPayload<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Step '{}' expects a text payload but found {}",
            self.step_name, self.found
        )
    }
}

/// A routing step changed control flow.
///
/// # Log Level
/// `debug!`
pub struct RouteTaken<'a> {
    pub step_name: &'a str,
    pub matched: &'a str,
    pub action: &'a str,
}

impl Display for RouteTaken<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Step '{}' matched '{}': {}",
            self.step_name, self.matched, self.action
        )
    }
}
