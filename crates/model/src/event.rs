//! Events (marathons).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub id: i64,
	pub short: String,
	#[serde(default)]
	pub name: String,
	pub datetime: DateTime<Utc>,
	/// Running donation total.
	#[serde(default)]
	pub amount: f64,
	#[serde(default)]
	pub donation_count: u32,
	#[serde(default)]
	pub locked: bool,
}
