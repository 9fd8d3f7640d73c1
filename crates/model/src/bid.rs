//! Bids (donation incentives) and their chained sub-goals.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BidState {
	#[default]
	Pending,
	Denied,
	Hidden,
	Opened,
	Closed,
}

impl BidState {
	/// States whose count and total feed the parent aggregate.
	pub const fn is_counted(self) -> bool {
		matches!(self, Self::Opened | Self::Closed)
	}
}

/// One step of a chained bid after the first goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainStep {
	pub id: i64,
	pub name: String,
	pub goal: f64,
	#[serde(default)]
	pub remaining: f64,
}

/// A donation incentive.
///
/// Parents own a set of options (children). In flat listings children refer
/// to their parent through `parent`; tree listings nest them under `options`.
/// A parent's `count` and `total` are derived from its counted children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
	pub id: i64,
	pub event: i64,
	#[serde(default)]
	pub speedrun: Option<i64>,
	#[serde(default)]
	pub parent: Option<i64>,
	pub name: String,
	#[serde(default)]
	pub state: BidState,
	#[serde(default)]
	pub goal: Option<f64>,
	#[serde(default)]
	pub chain: bool,
	#[serde(default)]
	pub chain_remaining: Option<f64>,
	#[serde(default)]
	pub count: u32,
	#[serde(default)]
	pub total: f64,
	#[serde(default)]
	pub istarget: bool,
	#[serde(default)]
	pub allowuseroptions: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub options: Option<Vec<Bid>>,
	#[serde(default, skip_serializing_if = "Vec::is_empty")]
	pub chain_steps: Vec<ChainStep>,
}

impl Bid {
	/// `(count, total)` this bid contributes to its parent.
	pub fn contribution(&self) -> (u32, f64) {
		if self.state.is_counted() { (self.count, self.total) } else { (0, 0.0) }
	}

	pub fn option(&self, id: i64) -> Option<&Bid> {
		self.options.as_ref()?.iter().find(|b| b.id == id)
	}

	pub fn option_mut(&mut self, id: i64) -> Option<&mut Bid> {
		self.options.as_mut()?.iter_mut().find(|b| b.id == id)
	}
}
