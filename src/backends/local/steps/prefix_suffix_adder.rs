// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::TextOperation;
use crate::config::consts::{DEFAULT_PREFIX, DEFAULT_SUFFIX};

/// Wraps text in a prefix and a suffix.
#[derive(Debug, Clone)]
pub struct PrefixSuffixAdder {
    prefix: String,
    suffix: String,
}

impl PrefixSuffixAdder {
    pub fn new(prefix: impl Into<String>, suffix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            suffix: suffix.into(),
        }
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(prefix, "")
    }

    pub fn with_suffix(suffix: impl Into<String>) -> Self {
        Self::new("", suffix)
    }
}

impl Default for PrefixSuffixAdder {
    fn default() -> Self {
        Self::new(DEFAULT_PREFIX, DEFAULT_SUFFIX)
    }
}

impl TextOperation for PrefixSuffixAdder {
    fn apply(&self, input: &str) -> String {
        format!("{}{}{}", self.prefix, input, self.suffix)
    }

    fn implementation(&self) -> &'static str {
        "prefix_suffix_adder"
    }
}
