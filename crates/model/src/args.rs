//! Canonical query arguments.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde_json::{Map, Value};

/// Pagination parameters, excluded from the identity of windowed queries.
pub const PAGINATION_KEYS: &[&str] = &["page", "limit", "offset"];

#[derive(Debug, thiserror::Error)]
pub enum ArgsError {
	#[error("query arguments must be a JSON object, got {0}")]
	NotAnObject(&'static str),
}

/// Query arguments in canonical form.
///
/// Object keys are sorted recursively and top-level `null` values dropped, so
/// logically identical argument sets compare, hash and render identically
/// regardless of the order they were built in.
#[derive(Clone)]
pub struct QueryArgs {
	map: Map<String, Value>,
	canonical: String,
}

impl Default for QueryArgs {
	fn default() -> Self {
		Self::new()
	}
}

impl QueryArgs {
	pub fn new() -> Self {
		Self::from_map(Map::new())
	}

	/// Builds arguments from a JSON object (or `null` for no arguments).
	pub fn from_value(value: Value) -> Result<Self, ArgsError> {
		match value {
			Value::Object(map) => Ok(Self::from_map(map)),
			Value::Null => Ok(Self::new()),
			Value::Bool(_) => Err(ArgsError::NotAnObject("a boolean")),
			Value::Number(_) => Err(ArgsError::NotAnObject("a number")),
			Value::String(_) => Err(ArgsError::NotAnObject("a string")),
			Value::Array(_) => Err(ArgsError::NotAnObject("an array")),
		}
	}

	pub fn from_map(map: Map<String, Value>) -> Self {
		let mut entries: Vec<(String, Value)> = map.into_iter().filter(|(_, v)| !v.is_null()).collect();
		entries.sort_by(|a, b| a.0.cmp(&b.0));
		let map: Map<String, Value> = entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect();
		let canonical = Value::Object(map.clone()).to_string();
		Self { map, canonical }
	}

	/// Returns a copy with `key` set to `value`.
	#[must_use]
	pub fn with(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		let mut map = self.map.clone();
		map.insert(key.into(), value.into());
		Self::from_map(map)
	}

	/// Returns a copy without pagination parameters.
	#[must_use]
	pub fn without_pagination(&self) -> Self {
		let map = self
			.map
			.iter()
			.filter(|(k, _)| !PAGINATION_KEYS.contains(&k.as_str()))
			.map(|(k, v)| (k.clone(), v.clone()))
			.collect();
		Self::from_map(map)
	}

	pub fn get(&self, key: &str) -> Option<&Value> {
		self.map.get(key)
	}

	pub fn get_i64(&self, key: &str) -> Option<i64> {
		match self.map.get(key)? {
			Value::Number(n) => n.as_i64(),
			Value::String(s) => s.parse().ok(),
			_ => None,
		}
	}

	pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
		self.map.iter()
	}

	pub fn is_empty(&self) -> bool {
		self.map.is_empty()
	}

	pub fn as_map(&self) -> &Map<String, Value> {
		&self.map
	}

	/// Canonical JSON rendering, the identity of these arguments.
	pub fn canonical(&self) -> &str {
		&self.canonical
	}

	/// Flattens the arguments into URL query pairs.
	///
	/// Arrays repeat their key once per element.
	pub fn to_query_pairs(&self) -> Vec<(String, String)> {
		let mut pairs = Vec::new();
		for (key, value) in &self.map {
			match value {
				Value::Array(items) => {
					pairs.extend(items.iter().map(|item| (key.clone(), scalar_to_string(item))));
				}
				other => pairs.push((key.clone(), scalar_to_string(other))),
			}
		}
		pairs
	}
}

fn canonicalize(value: Value) -> Value {
	match value {
		Value::Object(map) => {
			let mut entries: Vec<(String, Value)> = map.into_iter().collect();
			entries.sort_by(|a, b| a.0.cmp(&b.0));
			Value::Object(entries.into_iter().map(|(k, v)| (k, canonicalize(v))).collect())
		}
		Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
		other => other,
	}
}

fn scalar_to_string(value: &Value) -> String {
	match value {
		Value::String(s) => s.clone(),
		Value::Null => String::new(),
		other => other.to_string(),
	}
}

impl PartialEq for QueryArgs {
	fn eq(&self, other: &Self) -> bool {
		self.canonical == other.canonical
	}
}

impl Eq for QueryArgs {}

impl Hash for QueryArgs {
	fn hash<H: Hasher>(&self, state: &mut H) {
		self.canonical.hash(state);
	}
}

impl PartialOrd for QueryArgs {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

impl Ord for QueryArgs {
	fn cmp(&self, other: &Self) -> Ordering {
		self.canonical.cmp(&other.canonical)
	}
}

impl fmt::Debug for QueryArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_tuple("QueryArgs").field(&self.canonical).finish()
	}
}

impl fmt::Display for QueryArgs {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.canonical)
	}
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for QueryArgs {
	fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
		Self::from_map(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
	}
}
