//! Resource identity.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Server-assigned identifier of a resource.
///
/// Most resources use integer primary keys; donation groups are addressed by
/// a string slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceId {
	Int(i64),
	Str(String),
}

impl fmt::Display for ResourceId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Int(id) => write!(f, "{id}"),
			Self::Str(id) => f.write_str(id),
		}
	}
}

impl From<i64> for ResourceId {
	fn from(id: i64) -> Self {
		Self::Int(id)
	}
}

impl From<&str> for ResourceId {
	fn from(id: &str) -> Self {
		Self::Str(id.to_string())
	}
}

impl From<String> for ResourceId {
	fn from(id: String) -> Self {
		Self::Str(id)
	}
}

/// The `type` discriminator of a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
	#[serde(rename = "speedrun")]
	Run,
	Donation,
	Bid,
	Event,
	#[serde(rename = "donationgroup")]
	DonationGroup,
	Prize,
}

impl ResourceKind {
	/// Wire name of the kind, as found in the `type` field.
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Run => "speedrun",
			Self::Donation => "donation",
			Self::Bid => "bid",
			Self::Event => "event",
			Self::DonationGroup => "donationgroup",
			Self::Prize => "prize",
		}
	}
}

impl fmt::Display for ResourceKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Identity of a resource across all kinds.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
	pub kind: ResourceKind,
	pub id: ResourceId,
}

impl ResourceKey {
	pub fn new(kind: ResourceKind, id: impl Into<ResourceId>) -> Self {
		Self { kind, id: id.into() }
	}
}

impl fmt::Display for ResourceKey {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}#{}", self.kind, self.id)
	}
}
