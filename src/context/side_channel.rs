// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

/// A non-fatal problem recorded during a run, such as a failed cleanup task.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub source: String,
    pub message: String,
}

/// Cross-step shared state: opaque values keyed by string, plus run diagnostics.
///
/// Values are held behind an `Arc` so taking a checkpoint before each step is a
/// pointer copy; the map is only cloned when a step writes to it.
#[derive(Debug, Clone, Default)]
pub struct SideChannel {
    values: Arc<HashMap<String, Value>>,
    diagnostics: Vec<Diagnostic>,
}

impl SideChannel {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        Arc::make_mut(&mut self.values).insert(key.into(), value.into())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        if !self.values.contains_key(key) {
            return None;
        }
        Arc::make_mut(&mut self.values).remove(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn record_diagnostic(&mut self, source: impl Into<String>, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic {
            source: source.into(),
            message: message.into(),
        });
    }

    pub(crate) fn snapshot_values(&self) -> Arc<HashMap<String, Value>> {
        Arc::clone(&self.values)
    }

    pub(crate) fn restore_values(&mut self, values: Arc<HashMap<String, Value>>) {
        self.values = values;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_snapshot_is_unaffected_by_later_writes() {
        let mut channel = SideChannel::default();
        channel.insert("count", 1);

        let snapshot = channel.snapshot_values();
        channel.insert("count", 2);
        channel.insert("extra", json!({"a": true}));

        assert_eq!(snapshot.get("count"), Some(&json!(1)));
        assert_eq!(snapshot.len(), 1);

        channel.restore_values(snapshot);
        assert_eq!(channel.get("count"), Some(&json!(1)));
        assert!(!channel.contains_key("extra"));
    }

    #[test]
    fn test_remove_missing_key_does_not_clone() {
        let mut channel = SideChannel::default();
        channel.insert("k", "v");
        let snapshot = channel.snapshot_values();

        assert_eq!(channel.remove("absent"), None);
        assert!(Arc::ptr_eq(&snapshot, &channel.snapshot_values()));
    }
}
