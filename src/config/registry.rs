// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use serde::Deserialize;

use crate::errors::FlowError;
use crate::observability::messages::engine::StepNameRebound;
use crate::observability::messages::StructuredLog;

/// What registering a name that is already taken does.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    /// Append the new step; the name now resolves to it while the earlier step stays live
    /// at its own position.
    #[default]
    Rebind,
    /// The new step takes over the earlier step's position. The registry does not grow.
    Replace,
}

/// A registered step with its lookup metadata.
#[derive(Debug, Clone)]
pub struct Registered<S> {
    pub name: String,
    pub description: Option<String>,
    pub step: S,
}

/// Ordered steps plus a name → position lookup, built incrementally.
///
/// The registry is only mutated while a pipeline is being assembled; runs hold it by
/// shared reference.
#[derive(Debug, Clone)]
pub struct StepRegistry<S> {
    entries: Vec<Registered<S>>,
    index: HashMap<String, usize>,
    names: Vec<String>,
    policy: DuplicateNamePolicy,
}

impl<S> Default for StepRegistry<S> {
    fn default() -> Self {
        Self::with_policy(DuplicateNamePolicy::default())
    }
}

impl<S> StepRegistry<S> {
    pub fn with_policy(policy: DuplicateNamePolicy) -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
            names: Vec::new(),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicateNamePolicy {
        self.policy
    }

    /// Register `step` under `name` and return the position it occupies.
    pub fn register(&mut self, name: String, description: Option<String>, step: S) -> usize {
        let entry = Registered {
            name: name.clone(),
            description,
            step,
        };

        match (self.index.get(&name).copied(), self.policy) {
            (Some(position), DuplicateNamePolicy::Replace) => {
                self.entries[position] = entry;
                position
            }
            (existing, _) => {
                let position = self.entries.len();
                self.entries.push(entry);
                match existing {
                    Some(previous) => StepNameRebound {
                        name: &name,
                        previous_position: previous,
                        position,
                    }
                    .log(),
                    None => self.names.push(name.clone()),
                }
                self.index.insert(name, position);
                position
            }
        }
    }

    /// Position the name currently resolves to, or `InvalidJump` listing every valid name.
    pub fn resolve(&self, name: &str) -> Result<usize, FlowError> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| FlowError::InvalidJump {
                target: name.to_string(),
                available: self.names.clone(),
            })
    }

    /// Position and description registered under `name`.
    pub fn lookup(&self, name: &str) -> Option<(usize, Option<&str>)> {
        let position = *self.index.get(name)?;
        let description = self.entries[position].description.as_deref();
        Some((position, description))
    }

    pub fn get(&self, position: usize) -> Option<&Registered<S>> {
        self.entries.get(position)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Registered<S>> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, in first-registration order.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ErrorKind;

    #[test]
    fn test_duplicate_name_policies() {
        struct TestCase {
            name: &'static str,
            policy: DuplicateNamePolicy,
            expected_len: usize,
            expected_order: Vec<&'static str>,
            expected_position: usize,
        }

        let test_cases = vec![
            TestCase {
                name: "rebind keeps earlier step live",
                policy: DuplicateNamePolicy::Rebind,
                expected_len: 3,
                expected_order: vec!["first", "second", "third"],
                expected_position: 2,
            },
            TestCase {
                name: "replace overwrites in place",
                policy: DuplicateNamePolicy::Replace,
                expected_len: 2,
                expected_order: vec!["third", "second"],
                expected_position: 0,
            },
        ];

        for case in test_cases {
            let mut registry = StepRegistry::with_policy(case.policy);
            registry.register("a".into(), None, "first");
            registry.register("b".into(), None, "second");
            registry.register("a".into(), Some("newer".into()), "third");

            assert_eq!(registry.len(), case.expected_len, "{}", case.name);
            let order: Vec<_> = registry.iter().map(|r| r.step).collect();
            assert_eq!(order, case.expected_order, "{}", case.name);
            assert_eq!(
                registry.lookup("a"),
                Some((case.expected_position, Some("newer"))),
                "{}",
                case.name
            );
            assert_eq!(registry.names(), ["a".to_string(), "b".to_string()], "{}", case.name);
        }
    }

    #[test]
    fn test_resolve_unknown_lists_names() {
        let mut registry = StepRegistry::default();
        registry.register("mw1".into(), None, ());
        registry.register("mw2".into(), None, ());

        let err = registry.resolve("mw9").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidJump);
        match err {
            FlowError::InvalidJump { target, available } => {
                assert_eq!(target, "mw9");
                assert_eq!(available, vec!["mw1", "mw2"]);
            }
            other => panic!("Expected InvalidJump, got {:?}", other),
        }
        assert_eq!(registry.resolve("mw2").unwrap(), 1);
    }
}
