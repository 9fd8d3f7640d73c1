//! Donations and donation groups.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommentState {
	#[default]
	Absent,
	Pending,
	Denied,
	Approved,
	Flagged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReadState {
	#[default]
	Pending,
	Ready,
	Ignored,
	Read,
	Flagged,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionState {
	#[default]
	Pending,
	Completed,
	Cancelled,
	Flagged,
}

/// Link between a donation and a bid it contributes to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DonationBid {
	pub id: i64,
	pub bid: i64,
	pub amount: f64,
	#[serde(default)]
	pub bid_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Donation {
	pub id: i64,
	pub event: i64,
	#[serde(default)]
	pub donor_name: String,
	pub amount: f64,
	#[serde(default = "default_currency")]
	pub currency: String,
	pub timereceived: DateTime<Utc>,
	#[serde(default)]
	pub comment: Option<String>,
	#[serde(default)]
	pub commentstate: CommentState,
	#[serde(default)]
	pub readstate: ReadState,
	#[serde(default)]
	pub transactionstate: TransactionState,
	#[serde(default)]
	pub pinned: bool,
	#[serde(default)]
	pub bids: Vec<DonationBid>,
	#[serde(default)]
	pub groups: Vec<String>,
}

fn default_currency() -> String {
	"USD".to_string()
}

/// A named bucket donations can be sorted into by processors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DonationGroup {
	pub id: String,
	#[serde(default)]
	pub name: String,
}
