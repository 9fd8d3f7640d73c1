//! Bid aggregates.
//!
//! A parent bid's `count` and `total` are derived from its options. The server
//! recomputes them on every change; these helpers replay that locally so
//! cached parents stay consistent with the children the cache has seen.

use tracker_cache::{CacheData, Reconciled, ShapeError};
use tracker_model::{Bid, DonationBid, Resource, ResourceKey, ResourceKind, compare, order};

/// Sets `parent`'s count and total to the sum over its counted children.
pub fn aggregate<'a>(parent: &mut Bid, children: impl IntoIterator<Item = &'a Bid>) {
	let (count, total) = children
		.into_iter()
		.map(Bid::contribution)
		.fold((0, 0.0), |(count, total), (c, t)| (count + c, total + t));
	parent.count = count;
	parent.total = total;
	recompute_chain(parent);
}

/// Recomputes a tree-shaped bid from its nested options. Bids without
/// options keep their own totals.
pub fn aggregate_tree(bid: &mut Bid) {
	match bid.options.take() {
		Some(options) => {
			aggregate(bid, &options);
			bid.options = Some(options);
		}
		None => recompute_chain(bid),
	}
}

/// Distributes a chained bid's total over its steps.
///
/// The bid's own goal is the first step. Each step shows how far the running
/// total exceeds its goal, and the running total then drops by that goal.
pub fn recompute_chain(bid: &mut Bid) {
	if !bid.chain {
		return;
	}
	let mut running = bid.total - bid.goal.unwrap_or(0.0);
	bid.chain_remaining = Some(running.max(0.0));
	for step in &mut bid.chain_steps {
		step.remaining = (running - step.goal).max(0.0);
		running -= step.goal;
	}
}

/// Merges `resource` into a flat bid listing.
///
/// When a child changes its contribution, the difference is carried over to
/// its cached parent. A child entering the listing contributed nothing before;
/// one that stays out of it is left to the server's copy of the parent.
pub fn merge_flat(data: &mut CacheData, resource: &Resource, matches: bool) -> Result<Reconciled, ShapeError> {
	let Some(bid) = resource.as_bid() else {
		return data.reconcile(resource.clone(), matches, compare);
	};
	let cached = data.get(&resource.key()).and_then(Resource::as_bid).map(Bid::contribution);
	let outcome = data.reconcile(resource.clone(), matches, compare)?;
	let before = match (cached, outcome) {
		(Some(before), _) => Some(before),
		(None, Reconciled::Inserted) => Some((0, 0.0)),
		(None, _) => None,
	};

	if let (Some(parent), Some(before)) = (bid.parent, before) {
		let after = bid.contribution();
		let delta = (i64::from(after.0) - i64::from(before.0), after.1 - before.1);
		if delta != (0, 0.0) {
			adjust(data, parent, delta)?;
		}
	}
	Ok(outcome)
}

/// Merges `resource` into a bid tree.
///
/// Top-level bids replace their cached copy but keep its nested options when
/// the incoming copy has none. Children are folded into their parent's
/// options and the parent re-aggregated.
pub fn merge_tree(data: &mut CacheData, resource: &Resource, matches: bool) -> Result<Reconciled, ShapeError> {
	let Some(bid) = resource.as_bid() else {
		return Ok(Reconciled::Unchanged);
	};
	match bid.parent {
		None => {
			let mut incoming = bid.clone();
			if incoming.options.is_none() {
				incoming.options = data.get(&resource.key()).and_then(Resource::as_bid).and_then(|b| b.options.clone());
			}
			if incoming.options.is_some() {
				aggregate_tree(&mut incoming);
			}
			data.reconcile(Resource::Bid(incoming), matches, compare)
		}
		Some(parent) => {
			let mut option = bid.clone();
			option.options = None;
			let found = data.update(&bid_key(parent), compare, |r| {
				if let Some(parent) = r.as_bid_mut() {
					upsert_option(parent, option);
					aggregate_tree(parent);
				}
			})?;
			Ok(if found { Reconciled::Replaced } else { Reconciled::Unchanged })
		}
	}
}

/// Adds a new donation's bid links to the cached bids.
///
/// Each linked bid gains one donation and the linked amount. In a flat
/// listing a counted child passes the increment on to its parent; in a tree
/// the parent is re-aggregated.
pub fn apply_donation_bids(data: &mut CacheData, links: &[DonationBid]) -> Result<(), ShapeError> {
	for link in links {
		let key = bid_key(link.bid);
		let mut parent = None;
		let found = data.update(&key, compare, |r| {
			if let Some(bid) = r.as_bid_mut() {
				bid.count += 1;
				bid.total += link.amount;
				recompute_chain(bid);
				if bid.state.is_counted() {
					parent = bid.parent;
				}
			}
		})?;
		if found {
			if let Some(parent) = parent {
				adjust(data, parent, (1, link.amount))?;
			}
			continue;
		}

		let owner = data
			.iter()
			.filter_map(Resource::as_bid)
			.find(|b| b.option(link.bid).is_some())
			.map(|b| b.id);
		if let Some(owner) = owner {
			data.update(&bid_key(owner), compare, |r| {
				if let Some(parent) = r.as_bid_mut() {
					if let Some(option) = parent.option_mut(link.bid) {
						option.count += 1;
						option.total += link.amount;
						recompute_chain(option);
					}
					aggregate_tree(parent);
				}
			})?;
		}
	}
	Ok(())
}

fn adjust(data: &mut CacheData, parent: i64, (count, total): (i64, f64)) -> Result<bool, ShapeError> {
	data.update(&bid_key(parent), compare, |r| {
		if let Some(parent) = r.as_bid_mut() {
			parent.count = u32::try_from(i64::from(parent.count) + count).unwrap_or(0);
			parent.total += total;
			recompute_chain(parent);
		}
	})
}

fn upsert_option(parent: &mut Bid, option: Bid) {
	let options = parent.options.get_or_insert_with(Vec::new);
	options.retain(|o| o.id != option.id);
	let at = options.partition_point(|o| order::bids(o, &option).is_lt());
	options.insert(at, option);
}

fn bid_key(id: i64) -> ResourceKey {
	ResourceKey::new(ResourceKind::Bid, id)
}
