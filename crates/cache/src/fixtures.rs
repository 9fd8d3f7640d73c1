//! Resource builders shared by the cache tests.

use chrono::{TimeZone, Utc};
use tracker_model::{Donation, Resource, ResourceId};

/// A donation received `minute` minutes after noon.
pub fn donation(id: i64, minute: u32) -> Resource {
	Resource::Donation(Donation {
		id,
		event: 1,
		donor_name: format!("donor {id}"),
		amount: 5.0,
		currency: "USD".into(),
		timereceived: Utc.with_ymd_and_hms(2024, 1, 7, 12, minute, 0).unwrap(),
		comment: None,
		commentstate: Default::default(),
		readstate: Default::default(),
		transactionstate: Default::default(),
		pinned: false,
		bids: Vec::new(),
		groups: Vec::new(),
	})
}

pub fn pinned(resource: &Resource, pinned: bool) -> Resource {
	let mut resource = resource.clone();
	if let Some(d) = resource.as_donation_mut() {
		d.pinned = pinned;
	}
	resource
}

pub fn ids(items: &[Resource]) -> Vec<i64> {
	items
		.iter()
		.map(|r| match r.id() {
			ResourceId::Int(id) => id,
			ResourceId::Str(_) => -1,
		})
		.collect()
}
