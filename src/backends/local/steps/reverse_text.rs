// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::TextOperation;

/// Reverses text by characters.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReverseText;

impl TextOperation for ReverseText {
    fn apply(&self, input: &str) -> String {
        input.chars().rev().collect()
    }

    fn implementation(&self) -> &'static str {
        "reverse_text"
    }
}
