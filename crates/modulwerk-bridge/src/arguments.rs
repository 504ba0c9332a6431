// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ReadableArguments — keyed accessor over an options map passed from script.

use std::collections::HashMap;

use modulwerk_core::DynamicValue;

/// Read-only view over a string-keyed options argument.
///
/// Providers declare a `ReadableArguments` parameter when they take an
/// options object whose keys are optional.  Typed getters return `None` for
/// a missing key *or* a value of the wrong dynamic type; the `_or` variants
/// fall back to a default in both cases.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadableArguments {
    entries: HashMap<String, DynamicValue>,
}

impl ReadableArguments {
    pub fn new(entries: HashMap<String, DynamicValue>) -> Self {
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.entries.get(key)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(DynamicValue::as_bool)
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(DynamicValue::as_f64)
    }

    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    /// Integral read with the same truncating narrowing as method arguments.
    pub fn get_i32(&self, key: &str) -> Option<i32> {
        self.get_f64(key).map(|n| n as i32)
    }

    pub fn get_i32_or(&self, key: &str, default: i32) -> i32 {
        self.get_i32(key).unwrap_or(default)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(DynamicValue::as_str)
    }

    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_str(key).unwrap_or(default).to_string()
    }

    pub fn get_list(&self, key: &str) -> Option<&[DynamicValue]> {
        self.get(key).and_then(DynamicValue::as_array)
    }

    /// A nested options object.
    pub fn get_arguments(&self, key: &str) -> Option<ReadableArguments> {
        self.get(key)
            .and_then(DynamicValue::as_map)
            .map(|entries| Self::new(entries.clone()))
    }

    pub fn into_inner(self) -> HashMap<String, DynamicValue> {
        self.entries
    }
}

impl From<HashMap<String, DynamicValue>> for ReadableArguments {
    fn from(entries: HashMap<String, DynamicValue>) -> Self {
        Self::new(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ReadableArguments {
        let value = DynamicValue::from_json_str(
            r#"{"accuracy": 3.7, "label": "fix", "watch": true, "nested": {"x": 1}}"#,
        )
        .unwrap();
        ReadableArguments::new(value.as_map().unwrap().clone())
    }

    #[test]
    fn typed_getters_read_matching_values() {
        let args = options();
        assert_eq!(args.get_i32("accuracy"), Some(3));
        assert_eq!(args.get_f64("accuracy"), Some(3.7));
        assert_eq!(args.get_str("label"), Some("fix"));
        assert!(args.get_bool_or("watch", false));
        assert_eq!(args.get_arguments("nested").unwrap().get_i32("x"), Some(1));
    }

    #[test]
    fn missing_or_mistyped_keys_fall_back() {
        let args = options();
        assert_eq!(args.get_bool("label"), None);
        assert_eq!(args.get_i32_or("timeout", 500), 500);
        assert_eq!(args.get_string_or("accuracy", "none"), "none");
        assert!(!args.contains_key("timeout"));
        assert_eq!(args.len(), 4);
    }
}
