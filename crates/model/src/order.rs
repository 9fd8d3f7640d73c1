//! Total orders per resource kind.
//!
//! Every cached page is kept sorted by the comparator of its kind. Each
//! comparator ends in an id tiebreak so it is a strict total order over
//! distinct resources.

use std::cmp::Ordering;

use crate::{Bid, Donation, DonationGroup, Event, Prize, Resource, ResourceKind, Run};

/// Ordering function over resources of one kind.
pub type Comparator = fn(&Resource, &Resource) -> Ordering;

impl ResourceKind {
	/// Comparator used for collections of this kind.
	pub fn comparator(self) -> Comparator {
		compare
	}
}

/// Orders two resources.
///
/// Resources of different kinds never share a collection; they order by kind
/// so the function stays total.
pub fn compare(a: &Resource, b: &Resource) -> Ordering {
	match (a, b) {
		(Resource::Run(a), Resource::Run(b)) => runs(a, b),
		(Resource::Donation(a), Resource::Donation(b)) => donations(a, b),
		(Resource::Bid(a), Resource::Bid(b)) => bids(a, b),
		(Resource::Event(a), Resource::Event(b)) => events(a, b),
		(Resource::DonationGroup(a), Resource::DonationGroup(b)) => groups(a, b),
		(Resource::Prize(a), Resource::Prize(b)) => prizes(a, b),
		_ => a.kind().cmp(&b.kind()),
	}
}

/// Newest first, id ascending on ties.
pub fn donations(a: &Donation, b: &Donation) -> Ordering {
	b.timereceived.cmp(&a.timereceived).then(a.id.cmp(&b.id))
}

/// Scheduled runs by `order`, unscheduled runs last.
pub fn runs(a: &Run, b: &Run) -> Ordering {
	nulls_last(a.order, b.order).then(a.id.cmp(&b.id))
}

pub fn bids(a: &Bid, b: &Bid) -> Ordering {
	a.name
		.to_lowercase()
		.cmp(&b.name.to_lowercase())
		.then(a.id.cmp(&b.id))
}

pub fn events(a: &Event, b: &Event) -> Ordering {
	a.datetime.cmp(&b.datetime).then(a.id.cmp(&b.id))
}

pub fn groups(a: &DonationGroup, b: &DonationGroup) -> Ordering {
	a.id.cmp(&b.id)
}

pub fn prizes(a: &Prize, b: &Prize) -> Ordering {
	nulls_last(a.starttime, b.starttime)
		.then_with(|| a.name.cmp(&b.name))
		.then(a.id.cmp(&b.id))
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
	match (a, b) {
		(Some(a), Some(b)) => a.cmp(&b),
		(Some(_), None) => Ordering::Less,
		(None, Some(_)) => Ordering::Greater,
		(None, None) => Ordering::Equal,
	}
}
