//! Serde adapter for `H:MM:SS` durations.
//!
//! The server reports run and setup lengths as clock strings. Integer seconds
//! are accepted on input as well.

use std::fmt;

use chrono::TimeDelta;
use serde::de::{self, Visitor};
use serde::{Deserializer, Serializer};

/// Zero-length duration, used as the serde default.
pub fn zero() -> TimeDelta {
	TimeDelta::zero()
}

/// Formats a duration as `H:MM:SS`.
pub fn format(value: &TimeDelta) -> String {
	let total = value.num_seconds();
	let sign = if total < 0 { "-" } else { "" };
	let total = total.unsigned_abs();
	format!("{sign}{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

/// Parses `H:MM:SS`, `MM:SS` or bare seconds.
pub fn parse(input: &str) -> Option<TimeDelta> {
	let input = input.trim();
	let (negative, body) = match input.strip_prefix('-') {
		Some(rest) => (true, rest),
		None => (false, input),
	};
	if body.is_empty() {
		return None;
	}

	let mut seconds: i64 = 0;
	let mut parts = 0;
	for part in body.split(':') {
		parts += 1;
		if parts > 3 || part.is_empty() {
			return None;
		}
		let value: i64 = part.parse().ok()?;
		if value < 0 {
			return None;
		}
		seconds = seconds.checked_mul(60)?.checked_add(value)?;
	}

	let delta = TimeDelta::try_seconds(seconds)?;
	Some(if negative { -delta } else { delta })
}

pub fn serialize<S: Serializer>(value: &TimeDelta, serializer: S) -> Result<S::Ok, S::Error> {
	serializer.serialize_str(&format(value))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TimeDelta, D::Error> {
	deserializer.deserialize_any(HmsVisitor)
}

struct HmsVisitor;

impl Visitor<'_> for HmsVisitor {
	type Value = TimeDelta;

	fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("a duration as H:MM:SS or whole seconds")
	}

	fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
		parse(v).ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
	}

	fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
		TimeDelta::try_seconds(v).ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
	}

	fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
		i64::try_from(v)
			.ok()
			.and_then(TimeDelta::try_seconds)
			.ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
	}

	fn visit_unit<E: de::Error>(self) -> Result<Self::Value, E> {
		Ok(TimeDelta::zero())
	}
}
