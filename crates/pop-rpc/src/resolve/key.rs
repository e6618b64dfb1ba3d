// SPDX-License-Identifier: GPL-3.0

//! Canonical identity keys for node lookups.

use serde_json::{Map, Value};
use std::fmt;

/// Canonical identity of a lookup: method name plus normalized parameters.
///
/// Object keys are sorted and `null` fields dropped at every depth, so requests that
/// differ only in the order or presence of unset optional fields share one key. Array
/// order is significant and kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(String);

impl IdentityKey {
	/// Build the key of `method` called with `params`.
	pub fn new(method: &str, params: &Value) -> Self {
		Self(format!("{method}:{}", canonicalize(params)))
	}

	/// The key as a string.
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for IdentityKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

fn canonicalize(value: &Value) -> Value {
	match value {
		Value::Object(object) => {
			let mut entries: Vec<(&String, &Value)> =
				object.iter().filter(|(_, value)| !value.is_null()).collect();
			entries.sort_by(|(a, _), (b, _)| a.cmp(b));
			// Insertion order is preserved by the map, so the sorted order is what gets printed.
			let mut sorted = Map::new();
			for (key, value) in entries {
				sorted.insert(key.clone(), canonicalize(value));
			}
			Value::Object(sorted)
		},
		Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
		other => other.clone(),
	}
}
