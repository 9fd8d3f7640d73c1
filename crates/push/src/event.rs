//! Wire events.

use serde::Deserialize;
use serde_json::Value;
use tracker_model::{Donation, DonationGroup, Resource, ResourceKey, ResourceKind};

use crate::Result;

/// A decoded push frame.
#[derive(Debug, Clone, PartialEq)]
pub enum PushEvent {
	/// A new donation arrived, with the event's updated aggregates.
	DonationReceived {
		donation: Donation,
		donation_count: Option<u32>,
		event_total: Option<f64>,
	},
	/// A processor changed a donation's state.
	ProcessingAction {
		action: String,
		donation: Donation,
		actor_name: Option<String>,
		actor_id: Option<i64>,
	},
	GroupCreated(DonationGroup),
	GroupDeleted(DonationGroup),
	/// Generic change notification carrying the full resource.
	ResourceChanged(Resource),
	/// Anything else; ignored by consumers.
	Unknown(Value),
}

/// One resource-level effect of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum ResourceChange {
	Upsert(Resource),
	Delete(ResourceKey),
}

impl ResourceChange {
	pub fn key(&self) -> ResourceKey {
		match self {
			Self::Upsert(resource) => resource.key(),
			Self::Delete(key) => key.clone(),
		}
	}
}

#[derive(Deserialize)]
struct DonationReceivedWire {
	donation: Donation,
	#[serde(default)]
	donation_count: Option<u32>,
	#[serde(default)]
	event_total: Option<f64>,
}

#[derive(Deserialize)]
struct ProcessingActionWire {
	action: String,
	donation: Donation,
	#[serde(default)]
	actor_name: Option<String>,
	#[serde(default)]
	actor_id: Option<i64>,
}

#[derive(Deserialize)]
struct GroupWire {
	group: DonationGroup,
}

#[derive(Deserialize)]
struct ResourceChangedWire {
	resource: Resource,
}

impl PushEvent {
	/// Decodes one text frame.
	///
	/// Frames are dispatched on `type` first and on `action` second. Frames
	/// matching neither decode to [`PushEvent::Unknown`]; a known frame with a
	/// malformed payload is an error.
	pub fn decode(text: &str) -> Result<Self> {
		let value: Value = serde_json::from_str(text)?;
		let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);
		let action = value.get("action").and_then(Value::as_str).map(str::to_owned);

		let event = match (kind.as_deref(), action.as_deref()) {
			(Some("donation_received"), _) => {
				let wire: DonationReceivedWire = serde_json::from_value(value)?;
				Self::DonationReceived {
					donation: wire.donation,
					donation_count: wire.donation_count,
					event_total: wire.event_total,
				}
			}
			(Some("processing_action"), _) => {
				let wire: ProcessingActionWire = serde_json::from_value(value)?;
				Self::ProcessingAction {
					action: wire.action,
					donation: wire.donation,
					actor_name: wire.actor_name,
					actor_id: wire.actor_id,
				}
			}
			(Some("resource_changed"), _) => {
				let wire: ResourceChangedWire = serde_json::from_value(value)?;
				Self::ResourceChanged(wire.resource)
			}
			(_, Some("group_created")) => Self::GroupCreated(serde_json::from_value::<GroupWire>(value)?.group),
			(_, Some("group_deleted")) => Self::GroupDeleted(serde_json::from_value::<GroupWire>(value)?.group),
			_ => Self::Unknown(value),
		};
		Ok(event)
	}

	/// The resource-level changes this event implies.
	pub fn resource_changes(&self) -> Vec<ResourceChange> {
		match self {
			Self::DonationReceived { donation, .. } | Self::ProcessingAction { donation, .. } => {
				vec![ResourceChange::Upsert(Resource::Donation(donation.clone()))]
			}
			Self::GroupCreated(group) => vec![ResourceChange::Upsert(Resource::DonationGroup(group.clone()))],
			Self::GroupDeleted(group) => {
				vec![ResourceChange::Delete(ResourceKey::new(ResourceKind::DonationGroup, group.id.clone()))]
			}
			Self::ResourceChanged(resource) => vec![ResourceChange::Upsert(resource.clone())],
			Self::Unknown(_) => Vec::new(),
		}
	}

	/// Short label for logs.
	pub fn name(&self) -> &'static str {
		match self {
			Self::DonationReceived { .. } => "donation_received",
			Self::ProcessingAction { .. } => "processing_action",
			Self::GroupCreated(_) => "group_created",
			Self::GroupDeleted(_) => "group_deleted",
			Self::ResourceChanged(_) => "resource_changed",
			Self::Unknown(_) => "unknown",
		}
	}
}
