//! The tagged union of every server-owned record.

use serde::{Deserialize, Serialize};

use crate::{Bid, Donation, DonationGroup, Event, Prize, ResourceId, ResourceKey, ResourceKind, Run};

/// A client-side projection of one server record.
///
/// Deserialized from the API's `type`-discriminated objects. Values are only
/// ever changed through the query cache's patch entry points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Resource {
	#[serde(rename = "speedrun")]
	Run(Run),
	Donation(Donation),
	Bid(Bid),
	Event(Event),
	#[serde(rename = "donationgroup")]
	DonationGroup(DonationGroup),
	Prize(Prize),
}

impl Resource {
	pub fn kind(&self) -> ResourceKind {
		match self {
			Self::Run(_) => ResourceKind::Run,
			Self::Donation(_) => ResourceKind::Donation,
			Self::Bid(_) => ResourceKind::Bid,
			Self::Event(_) => ResourceKind::Event,
			Self::DonationGroup(_) => ResourceKind::DonationGroup,
			Self::Prize(_) => ResourceKind::Prize,
		}
	}

	pub fn id(&self) -> ResourceId {
		match self {
			Self::Run(r) => ResourceId::Int(r.id),
			Self::Donation(d) => ResourceId::Int(d.id),
			Self::Bid(b) => ResourceId::Int(b.id),
			Self::Event(e) => ResourceId::Int(e.id),
			Self::DonationGroup(g) => ResourceId::Str(g.id.clone()),
			Self::Prize(p) => ResourceId::Int(p.id),
		}
	}

	/// Identity extractor: kind plus id.
	pub fn key(&self) -> ResourceKey {
		ResourceKey {
			kind: self.kind(),
			id: self.id(),
		}
	}

	/// Owning event, for kinds scoped to one.
	pub fn event_id(&self) -> Option<i64> {
		match self {
			Self::Run(r) => Some(r.event),
			Self::Donation(d) => Some(d.event),
			Self::Bid(b) => Some(b.event),
			Self::Event(e) => Some(e.id),
			Self::Prize(p) => Some(p.event),
			Self::DonationGroup(_) => None,
		}
	}

	pub fn as_run(&self) -> Option<&Run> {
		match self {
			Self::Run(r) => Some(r),
			_ => None,
		}
	}

	pub fn as_run_mut(&mut self) -> Option<&mut Run> {
		match self {
			Self::Run(r) => Some(r),
			_ => None,
		}
	}

	pub fn as_donation(&self) -> Option<&Donation> {
		match self {
			Self::Donation(d) => Some(d),
			_ => None,
		}
	}

	pub fn as_donation_mut(&mut self) -> Option<&mut Donation> {
		match self {
			Self::Donation(d) => Some(d),
			_ => None,
		}
	}

	pub fn as_bid(&self) -> Option<&Bid> {
		match self {
			Self::Bid(b) => Some(b),
			_ => None,
		}
	}

	pub fn as_bid_mut(&mut self) -> Option<&mut Bid> {
		match self {
			Self::Bid(b) => Some(b),
			_ => None,
		}
	}

	pub fn as_event_mut(&mut self) -> Option<&mut Event> {
		match self {
			Self::Event(e) => Some(e),
			_ => None,
		}
	}
}

#[cfg(test)]
mod tests {
	use pretty_assertions::assert_eq;
	use serde_json::json;

	use super::*;

	#[test]
	fn decodes_type_discriminated_objects() {
		let value = json!({
			"type": "speedrun",
			"id": 7,
			"event": 1,
			"name": "Any%",
			"order": 3,
			"run_time": "0:10:00",
			"setup_time": "0:05:00",
			"starttime": "2024-01-07T16:00:00Z",
		});
		let resource: Resource = serde_json::from_value(value).expect("valid run");
		let run = resource.as_run().expect("run variant");
		assert_eq!(resource.key(), ResourceKey::new(ResourceKind::Run, 7));
		assert_eq!(run.order, Some(3));
		assert_eq!(run.span().num_minutes(), 15);
	}

	#[test]
	fn group_ids_are_strings() {
		let value = json!({"type": "donationgroup", "id": "featured", "name": "Featured"});
		let resource: Resource = serde_json::from_value(value).expect("valid group");
		assert_eq!(resource.id(), ResourceId::Str("featured".into()));
		assert_eq!(resource.event_id(), None);
	}

	#[test]
	fn round_trips_through_json() {
		let value = json!({
			"type": "donation",
			"id": 5,
			"event": 1,
			"donor_name": "Alice",
			"amount": 25.0,
			"timereceived": "2024-01-07T16:00:00Z",
			"commentstate": "APPROVED",
			"pinned": true,
		});
		let resource: Resource = serde_json::from_value(value).expect("valid donation");
		let encoded = serde_json::to_value(&resource).expect("encodes");
		assert_eq!(encoded["type"], "donation");
		assert_eq!(encoded["commentstate"], "APPROVED");
		let decoded: Resource = serde_json::from_value(encoded).expect("decodes again");
		assert_eq!(decoded, resource);
	}
}
