// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod backends;   // built-in steps
pub mod config;     // config, validation + registry
pub mod context;    // execution context, side channel, cleanup
pub mod engine;     // sequential + streaming engines
pub mod errors;     // error handling
pub mod observability;
pub mod traits;     // step abstractions
