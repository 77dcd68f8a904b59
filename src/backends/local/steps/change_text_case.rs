// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::TextOperation;
use crate::config::consts::TITLE_CASE_SMALL_WORDS;

/// Target case for [`ChangeTextCase`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TextCase {
    Upper,
    Lower,
    /// First letter of every word capitalized
    Proper,
    /// Like proper, but articles, conjunctions and short prepositions stay lowercase
    Title,
}

impl FromStr for TextCase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upper" => Ok(TextCase::Upper),
            "lower" => Ok(TextCase::Lower),
            "proper" => Ok(TextCase::Proper),
            "title" => Ok(TextCase::Title),
            other => Err(format!("unknown case '{}'", other)),
        }
    }
}

impl Display for TextCase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TextCase::Upper => "upper",
            TextCase::Lower => "lower",
            TextCase::Proper => "proper",
            TextCase::Title => "title",
        };
        write!(f, "{}", s)
    }
}

/// Converts text to a different case.
#[derive(Debug, Clone)]
pub struct ChangeTextCase {
    case: TextCase,
}

impl ChangeTextCase {
    pub fn new(case: TextCase) -> Self {
        Self { case }
    }

    pub fn case(&self) -> TextCase {
        self.case
    }
}

impl TextOperation for ChangeTextCase {
    fn apply(&self, input: &str) -> String {
        match self.case {
            TextCase::Upper => input.to_uppercase(),
            TextCase::Lower => input.to_lowercase(),
            TextCase::Proper => input
                .split_whitespace()
                .map(capitalize)
                .collect::<Vec<_>>()
                .join(" "),
            TextCase::Title => input
                .split_whitespace()
                .enumerate()
                .map(|(i, word)| {
                    let lower = word.to_lowercase();
                    if i > 0 && TITLE_CASE_SMALL_WORDS.contains(&lower.as_str()) {
                        lower
                    } else {
                        capitalize(word)
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
        }
    }

    fn implementation(&self) -> &'static str {
        "change_text_case"
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase(),
    }
}
