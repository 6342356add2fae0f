//! Type-checked access to loosely typed JSON objects.
//!
//! Every getter performs an explicit check-and-extract step: a missing key is
//! `None` without an issue (unless the getter is `required_*`), a present but
//! wrong-typed value is reported and also yields `None`. Nothing is coerced.

use std::collections::HashSet;

use serde_json::{Map, Value};

use super::issues::{IssueCode, IssueCollector};
use super::registry::{ArrayKind, Registry, describe, resolve_index};

/// Keys accepted on every glTF object.
const COMMON_KEYS: [&str; 3] = ["name", "extensions", "extras"];

/// Escape a key for use as a JSON pointer segment.
pub(super) fn escape_pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Read-only view over one JSON object plus its location in the document.
#[derive(Debug, Clone)]
pub(super) struct ObjectReader<'a> {
    object: &'a Map<String, Value>,
    pointer: String,
}

impl<'a> ObjectReader<'a> {
    /// Wrap `value`, reporting `TYPE_MISMATCH` when it is not an object.
    pub(super) fn new(
        value: &'a Value,
        pointer: impl Into<String>,
        issues: &mut IssueCollector,
    ) -> Option<Self> {
        let pointer = pointer.into();
        match value {
            Value::Object(object) => Some(Self { object, pointer }),
            other => {
                issues.record(
                    IssueCode::TypeMismatch,
                    pointer_or_root(&pointer),
                    format!("Type mismatch. {} is not an object", describe(other)),
                );
                None
            }
        }
    }

    pub(super) fn from_map(object: &'a Map<String, Value>, pointer: impl Into<String>) -> Self {
        Self {
            object,
            pointer: pointer.into(),
        }
    }

    pub(super) fn pointer(&self) -> &str {
        pointer_or_root(&self.pointer)
    }

    /// Pointer to `key` inside this object.
    pub(super) fn child(&self, key: &str) -> String {
        format!("{}/{}", self.pointer, escape_pointer_segment(key))
    }

    pub(super) fn raw(&self, key: &str) -> Option<&'a Value> {
        self.object.get(key)
    }

    pub(super) fn has(&self, key: &str) -> bool {
        self.object.contains_key(key)
    }

    pub(super) fn entries(&self) -> impl Iterator<Item = (&'a String, &'a Value)> {
        self.object.iter()
    }

    /// True when `key` is present but its getter rejected the value.
    pub(super) fn rejected<T>(&self, key: &str, parsed: &Option<T>) -> bool {
        self.has(key) && parsed.is_none()
    }

    /// Report every key outside `known` and the common keys.
    pub(super) fn check_keys(&self, known: &[&str], issues: &mut IssueCollector) {
        for key in self.object.keys() {
            if known.contains(&key.as_str()) || COMMON_KEYS.contains(&key.as_str()) {
                continue;
            }
            issues.record(
                IssueCode::UnexpectedProperty,
                self.child(key),
                "Unexpected property",
            );
        }
    }

    fn missing(&self, key: &str, issues: &mut IssueCollector) {
        issues.record(
            IssueCode::UndefinedProperty,
            self.pointer(),
            format!("Property '{key}' must be defined"),
        );
    }

    fn mismatch(&self, key: &str, value: &Value, expected: &str, issues: &mut IssueCollector) {
        issues.record(
            IssueCode::TypeMismatch,
            self.child(key),
            format!("Type mismatch. {} is not a {expected}", describe(value)),
        );
    }

    /// Non-negative integer.
    pub(super) fn uint(&self, key: &str, issues: &mut IssueCollector) -> Option<u64> {
        let value = self.raw(key)?;
        if let Some(number) = value.as_u64() {
            return Some(number);
        }
        if let Some(number) = value.as_i64() {
            issues.record(
                IssueCode::ValueNotInRange,
                self.child(key),
                format!("Value {number} is out of range"),
            );
            return None;
        }
        self.mismatch(key, value, "non-negative integer", issues);
        None
    }

    pub(super) fn required_uint(&self, key: &str, issues: &mut IssueCollector) -> Option<u64> {
        if !self.has(key) {
            self.missing(key, issues);
            return None;
        }
        self.uint(key, issues)
    }

    /// Integer with a lower bound; values below `min` are `VALUE_NOT_IN_RANGE`.
    pub(super) fn uint_at_least(
        &self,
        key: &str,
        min: u64,
        required: bool,
        issues: &mut IssueCollector,
    ) -> Option<u64> {
        let value = if required {
            self.required_uint(key, issues)?
        } else {
            self.uint(key, issues)?
        };
        if value < min {
            issues.record(
                IssueCode::ValueNotInRange,
                self.child(key),
                format!("Value {value} is out of range"),
            );
            return None;
        }
        Some(value)
    }

    pub(super) fn boolean(&self, key: &str, issues: &mut IssueCollector) -> Option<bool> {
        let value = self.raw(key)?;
        match value {
            Value::Bool(flag) => Some(*flag),
            other => {
                self.mismatch(key, other, "boolean", issues);
                None
            }
        }
    }

    pub(super) fn string(&self, key: &str, issues: &mut IssueCollector) -> Option<&'a str> {
        let value = self.raw(key)?;
        match value {
            Value::String(text) => Some(text.as_str()),
            other => {
                self.mismatch(key, other, "string", issues);
                None
            }
        }
    }

    pub(super) fn required_string(
        &self,
        key: &str,
        issues: &mut IssueCollector,
    ) -> Option<&'a str> {
        if !self.has(key) {
            self.missing(key, issues);
            return None;
        }
        self.string(key, issues)
    }

    pub(super) fn array(&self, key: &str, issues: &mut IssueCollector) -> Option<&'a [Value]> {
        let value = self.raw(key)?;
        match value {
            Value::Array(items) => Some(items.as_slice()),
            other => {
                self.mismatch(key, other, "array", issues);
                None
            }
        }
    }

    pub(super) fn required_array(
        &self,
        key: &str,
        issues: &mut IssueCollector,
    ) -> Option<&'a [Value]> {
        if !self.has(key) {
            self.missing(key, issues);
            return None;
        }
        self.array(key, issues)
    }

    /// Array of numbers. Each non-numeric element is reported; the whole array
    /// is then rejected.
    pub(super) fn number_array(&self, key: &str, issues: &mut IssueCollector) -> Option<Vec<f64>> {
        let items = self.array(key, issues)?;
        let mut numbers = Vec::with_capacity(items.len());
        let mut all_numeric = true;
        for (position, item) in items.iter().enumerate() {
            match item.as_f64() {
                Some(number) => numbers.push(number),
                _ => {
                    all_numeric = false;
                    issues.record(
                        IssueCode::TypeMismatch,
                        format!("{}/{position}", self.child(key)),
                        format!("Type mismatch. {} is not a number", describe(item)),
                    );
                }
            }
        }
        all_numeric.then_some(numbers)
    }

    /// Number array whose length must be exactly `length`.
    pub(super) fn fixed_number_array(
        &self,
        key: &str,
        length: usize,
        issues: &mut IssueCollector,
    ) -> Option<Vec<f64>> {
        let numbers = self.number_array(key, issues)?;
        if numbers.len() != length {
            issues.record(
                IssueCode::InvalidArrayLength,
                self.child(key),
                format!(
                    "Invalid array length {}. Valid lengths are: {length}",
                    numbers.len()
                ),
            );
            return None;
        }
        Some(numbers)
    }

    pub(super) fn object(
        &self,
        key: &str,
        issues: &mut IssueCollector,
    ) -> Option<ObjectReader<'a>> {
        let value = self.raw(key)?;
        ObjectReader::new(value, self.child(key), issues)
    }

    pub(super) fn required_object(
        &self,
        key: &str,
        issues: &mut IssueCollector,
    ) -> Option<ObjectReader<'a>> {
        if !self.has(key) {
            self.missing(key, issues);
            return None;
        }
        self.object(key, issues)
    }

    /// Reference into a top-level array, resolved through the registry.
    pub(super) fn index(
        &self,
        key: &str,
        kind: ArrayKind,
        registry: &Registry,
        issues: &mut IssueCollector,
    ) -> Option<usize> {
        let value = self.raw(key)?;
        registry.resolve(kind, value, &self.child(key), issues)
    }

    pub(super) fn required_index(
        &self,
        key: &str,
        kind: ArrayKind,
        registry: &Registry,
        issues: &mut IssueCollector,
    ) -> Option<usize> {
        if !self.has(key) {
            self.missing(key, issues);
            return None;
        }
        self.index(key, kind, registry, issues)
    }

    /// Reference into an array owned by the enclosing object (e.g. animation
    /// samplers) rather than the document root.
    pub(super) fn required_local_index(
        &self,
        key: &str,
        len: usize,
        issues: &mut IssueCollector,
    ) -> Option<usize> {
        let Some(value) = self.raw(key) else {
            self.missing(key, issues);
            return None;
        };
        resolve_index(len, value, &self.child(key), issues)
    }

    pub(super) fn required_index_array(
        &self,
        key: &str,
        kind: ArrayKind,
        registry: &Registry,
        issues: &mut IssueCollector,
    ) -> Vec<(usize, usize)> {
        if !self.has(key) {
            self.missing(key, issues);
            return Vec::new();
        }
        self.index_array(key, kind, registry, issues)
    }

    /// Array of references. Returns `(position, index)` for each element that
    /// resolved; duplicates are reported as `DUPLICATE_ELEMENTS`.
    pub(super) fn index_array(
        &self,
        key: &str,
        kind: ArrayKind,
        registry: &Registry,
        issues: &mut IssueCollector,
    ) -> Vec<(usize, usize)> {
        let Some(items) = self.array(key, issues) else {
            return Vec::new();
        };

        let mut resolved = Vec::<(usize, usize)>::with_capacity(items.len());
        let mut seen = HashSet::with_capacity(items.len());
        for (position, item) in items.iter().enumerate() {
            let pointer = format!("{}/{position}", self.child(key));
            let Some(index) = registry.resolve(kind, item, &pointer, issues) else {
                continue;
            };
            if !seen.insert(index) {
                issues.record(
                    IssueCode::DuplicateElements,
                    pointer,
                    format!("Array contains duplicate element {index}"),
                );
                continue;
            }
            resolved.push((position, index));
        }
        resolved
    }
}

fn pointer_or_root(pointer: &str) -> &str {
    if pointer.is_empty() { "/" } else { pointer }
}
