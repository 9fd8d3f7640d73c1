//! Prizes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrizeState {
	#[default]
	Pending,
	Accepted,
	Denied,
	Flagged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prize {
	pub id: i64,
	pub event: i64,
	pub name: String,
	#[serde(default)]
	pub state: PrizeState,
	#[serde(default)]
	pub starttime: Option<DateTime<Utc>>,
	#[serde(default)]
	pub endtime: Option<DateTime<Utc>>,
}
