//! Scheduled runs.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

/// One scheduled item of an event's run order.
///
/// Runs without an `order` are unscheduled and carry no times. A run with an
/// `anchor_time` is pinned to that wall-clock start and acts as a barrier for
/// schedule cascades.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
	pub id: i64,
	pub event: i64,
	pub name: String,
	#[serde(default)]
	pub display_name: String,
	#[serde(default)]
	pub order: Option<i64>,
	#[serde(default)]
	pub starttime: Option<DateTime<Utc>>,
	#[serde(default)]
	pub endtime: Option<DateTime<Utc>>,
	#[serde(default)]
	pub anchor_time: Option<DateTime<Utc>>,
	#[serde(with = "crate::hms", default = "crate::hms::zero")]
	pub run_time: TimeDelta,
	#[serde(with = "crate::hms", default = "crate::hms::zero")]
	pub setup_time: TimeDelta,
}

impl Run {
	/// Total slot length: run time plus trailing setup.
	pub fn span(&self) -> TimeDelta {
		self.run_time + self.setup_time
	}

	pub fn is_anchored(&self) -> bool {
		self.anchor_time.is_some()
	}

	pub fn is_scheduled(&self) -> bool {
		self.order.is_some()
	}

	/// Moves start and end by `delta`.
	pub fn shift(&mut self, delta: TimeDelta) {
		self.starttime = self.starttime.map(|t| t + delta);
		self.endtime = self.endtime.map(|t| t + delta);
	}

	/// Places the run at `start` and derives its end from the span.
	pub fn place_at(&mut self, start: DateTime<Utc>) {
		self.starttime = Some(start);
		self.endtime = Some(start + self.span());
	}

	/// Rederives `endtime` from `starttime` and the span.
	pub fn recompute_end(&mut self) {
		self.endtime = self.starttime.map(|t| t + self.span());
	}
}
