// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod flow;

pub use config::{ConfigError, ValidationError};
pub use flow::{BoxError, ErrorKind, FlowError, LeakPoint, RunError};
