//! Query predicates derived from query arguments.
//!
//! A cached list holds the resources the server returned for its arguments.
//! When a resource changes locally or through a push event, the cache needs to
//! decide whether the new state still belongs in that list. The default rule
//! treats every argument that names a field of the resource as an equality
//! filter; array-valued arguments match any of their elements.

use serde_json::Value;

use crate::args::PAGINATION_KEYS;
use crate::{QueryArgs, Resource};

/// Arguments that never filter by field.
const NON_FILTER_KEYS: &[&str] = &["ordering", "search", "q", "tree", "include"];

/// Returns whether `resource` satisfies the field filters in `args`.
///
/// Arguments naming a field the resource does not have are ignored.
pub fn matches_args(args: &QueryArgs, resource: &Resource) -> bool {
	if args.is_empty() {
		return true;
	}
	let Ok(Value::Object(fields)) = serde_json::to_value(resource) else {
		return false;
	};

	args.iter()
		.filter(|(key, _)| !PAGINATION_KEYS.contains(&key.as_str()) && !NON_FILTER_KEYS.contains(&key.as_str()))
		.all(|(key, expected)| match fields.get(key.as_str()) {
			None => true,
			Some(actual) => match expected {
				Value::Array(candidates) => candidates.iter().any(|c| loosely_equal(c, actual)),
				single => loosely_equal(single, actual),
			},
		})
}

/// Equality as the query string sees it: `"1"` equals `1`, `"true"` equals `true`.
fn loosely_equal(expected: &Value, actual: &Value) -> bool {
	match (expected, actual) {
		(Value::Number(a), Value::Number(b)) => a.as_f64() == b.as_f64(),
		(Value::String(a), Value::Number(b)) | (Value::Number(b), Value::String(a)) => {
			a.parse::<f64>().ok() == b.as_f64()
		}
		(Value::String(a), Value::Bool(b)) | (Value::Bool(b), Value::String(a)) => {
			a.eq_ignore_ascii_case(if *b { "true" } else { "false" })
		}
		(a, b) => a == b,
	}
}
