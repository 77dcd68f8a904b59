// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

/// Pipeline name used when a config file does not set one
pub const DEFAULT_PIPELINE_NAME: &str = "pipeline";
/// Side-channel key under which the binary records the input text
pub const INPUT_KEY: &str = "input";
/// Prefix used by `prefix_suffix_adder` when no `prefix` option is given
pub const DEFAULT_PREFIX: &str = "[";
/// Suffix used by `prefix_suffix_adder` when no `suffix` option is given
pub const DEFAULT_SUFFIX: &str = "]";
/// Words `change_text_case` leaves lowercase in title case unless they lead the text
pub const TITLE_CASE_SMALL_WORDS: &[&str] = &[
    "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
];
