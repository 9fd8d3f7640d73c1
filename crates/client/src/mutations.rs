//! The tracker's mutations.
//!
//! Each function builds a [`MutationDef`] once; run it with
//! [`crate::Client::mutate`].

use serde_json::json;
use tracker_cache::{CacheData, ShapeError};
use tracker_model::{
	BidState, CommentState, Donation, DonationGroup, QueryArgs, ReadState, Resource, ResourceKey, ResourceKind, Run, hms,
};

use crate::endpoint::{BID_TREE, BIDS, DONATION_GROUPS, DONATIONS, Endpoint, RUNS, tags};
use crate::mutation::{MutationDef, PatchTarget};
use crate::reconcile::schedule;
use crate::rest::{Method, RestRequest};

/// Processing actions on a donation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonationAction {
	Pin,
	Unpin,
	/// Approve the comment without sending it to the reader.
	ApproveComment,
	DenyComment,
	Flag,
	SendToReader,
	Read,
	Ignore,
	/// Back to unprocessed.
	Unprocess,
}

impl DonationAction {
	/// URL segment of the action endpoint.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Pin => "pin",
			Self::Unpin => "unpin",
			Self::ApproveComment => "approve_comment",
			Self::DenyComment => "deny_comment",
			Self::Flag => "flag",
			Self::SendToReader => "send_to_reader",
			Self::Read => "read",
			Self::Ignore => "ignore",
			Self::Unprocess => "unprocess",
		}
	}

	/// Moves `donation` into the state the server will report.
	pub fn apply(self, donation: &mut Donation) {
		match self {
			Self::Pin => donation.pinned = true,
			Self::Unpin => donation.pinned = false,
			Self::ApproveComment => {
				donation.commentstate = CommentState::Approved;
				donation.readstate = ReadState::Ignored;
			}
			Self::DenyComment => {
				donation.commentstate = CommentState::Denied;
				donation.readstate = ReadState::Ignored;
			}
			Self::Flag => {
				donation.commentstate = CommentState::Approved;
				donation.readstate = ReadState::Flagged;
			}
			Self::SendToReader => {
				donation.commentstate = CommentState::Approved;
				donation.readstate = ReadState::Ready;
			}
			Self::Read => donation.readstate = ReadState::Read,
			Self::Ignore => donation.readstate = ReadState::Ignored,
			Self::Unprocess => {
				donation.commentstate = CommentState::Pending;
				donation.readstate = ReadState::Pending;
			}
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DonationActionArgs {
	pub donation: i64,
	pub action: DonationAction,
}

/// Pins, unpins or moves a donation through comment and read processing.
pub fn donation_action() -> MutationDef<DonationActionArgs> {
	MutationDef::new("donation_action", |a: &DonationActionArgs| {
		RestRequest::patch(format!("donations/{}/{}/", a.donation, a.action.as_str()), json!({}))
	})
	.target(PatchTarget::new(&DONATIONS).optimistic(|a: &DonationActionArgs, query, data| {
		edit(&DONATIONS, query, data, &key(ResourceKind::Donation, a.donation), |r| {
			if let Some(donation) = r.as_donation_mut() {
				a.action.apply(donation);
			}
		})
	}))
	.fallback(&[tags::DONATIONS])
}

/// A run as edited by the consumer, replacing the cached copy.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEdit {
	pub run: Run,
}

/// Saves a run's name, durations and anchor; later runs follow the new
/// timing up to the next anchor.
pub fn update_run() -> MutationDef<RunEdit> {
	MutationDef::new("update_run", |a: &RunEdit| {
		let run = &a.run;
		RestRequest::patch(
			format!("speedruns/{}/", run.id),
			json!({
				"name": run.name,
				"display_name": run.display_name,
				"run_time": hms::format(&run.run_time),
				"setup_time": hms::format(&run.setup_time),
				"anchor_time": run.anchor_time,
			}),
		)
	})
	.target(PatchTarget::new(&RUNS).optimistic(|a: &RunEdit, query, data| {
		let Some(previous) = data.get(&a.run_key()).and_then(Resource::as_run).cloned() else {
			return Ok(());
		};
		let runs = runs_of(data);
		write_runs(query, data, schedule::cascade(&runs, &previous, &a.run))
	}))
	.fallback(&[tags::RUNS])
}

impl RunEdit {
	fn run_key(&self) -> ResourceKey {
		key(ResourceKind::Run, self.run.id)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveRun {
	pub run: i64,
	/// New position; `None` unschedules the run.
	pub order: Option<i64>,
}

/// Moves a run within its event's schedule.
pub fn move_run() -> MutationDef<MoveRun> {
	MutationDef::new("move_run", |a: &MoveRun| {
		RestRequest::patch(format!("speedruns/{}/move/", a.run), json!({ "order": a.order }))
	})
	.target(PatchTarget::new(&RUNS).optimistic(|a: &MoveRun, query, data| {
		let runs = runs_of(data);
		write_runs(query, data, schedule::move_run(&runs, a.run, a.order))
	}))
	.fallback(&[tags::RUNS])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BidStateChange {
	pub bid: i64,
	pub state: BidState,
}

/// Changes a bid's state in both the flat listing and the tree; parents are
/// re-aggregated in each.
pub fn set_bid_state() -> MutationDef<BidStateChange> {
	MutationDef::new("set_bid_state", |a: &BidStateChange| {
		RestRequest::patch(format!("bids/{}/", a.bid), json!({ "state": a.state }))
	})
	.target(PatchTarget::new(&BIDS).optimistic(|a: &BidStateChange, query, data| {
		edit(&BIDS, query, data, &key(ResourceKind::Bid, a.bid), |r| {
			if let Some(bid) = r.as_bid_mut() {
				bid.state = a.state;
			}
		})
	}))
	.target(PatchTarget::new(&BID_TREE).optimistic(|a: &BidStateChange, query, data| {
		let nested = data.iter().filter_map(Resource::as_bid).find_map(|b| b.option(a.bid)).cloned();
		match nested {
			Some(mut option) => {
				option.state = a.state;
				BID_TREE.merge(query, data, &Resource::Bid(option))?;
				Ok(())
			}
			None => edit(&BID_TREE, query, data, &key(ResourceKind::Bid, a.bid), |r| {
				if let Some(bid) = r.as_bid_mut() {
					bid.state = a.state;
				}
			}),
		}
	}))
	.fallback(&[tags::BIDS])
}

/// Creates a donation group, or renames an existing one.
pub fn save_donation_group() -> MutationDef<DonationGroup> {
	MutationDef::new("save_donation_group", |g: &DonationGroup| {
		RestRequest::new(Method::Put, format!("donation_groups/{}/", g.id)).with_body(json!({ "name": g.name }))
	})
	.target(PatchTarget::new(&DONATION_GROUPS).optimistic(|g: &DonationGroup, query, data| {
		DONATION_GROUPS.merge(query, data, &Resource::DonationGroup(g.clone()))?;
		Ok(())
	}))
	.fallback(&[tags::DONATION_GROUPS])
}

/// Deletes a donation group and drops it from every cached donation.
pub fn delete_donation_group() -> MutationDef<String> {
	MutationDef::new("delete_donation_group", |id: &String| RestRequest::delete(format!("donation_groups/{id}/")))
		.target(PatchTarget::new(&DONATION_GROUPS).optimistic(|id: &String, _, data| {
			data.remove(&key(ResourceKind::DonationGroup, id.as_str()))?;
			Ok(())
		}))
		.target(PatchTarget::new(&DONATIONS).optimistic(|id: &String, query, data| {
			let members: Vec<ResourceKey> = data
				.iter()
				.filter(|r| r.as_donation().is_some_and(|d| d.groups.contains(id)))
				.map(Resource::key)
				.collect();
			for member in members {
				edit(&DONATIONS, query, data, &member, |r| {
					if let Some(donation) = r.as_donation_mut() {
						donation.groups.retain(|g| g != id);
					}
				})?;
			}
			Ok(())
		}))
		.fallback(&[tags::DONATION_GROUPS, tags::DONATIONS])
}

/// Applies `f` to the cached copy of `key` and folds the result back in,
/// dropping it if it no longer matches the query.
fn edit(
	endpoint: &'static Endpoint,
	query: &QueryArgs,
	data: &mut CacheData,
	key: &ResourceKey,
	f: impl FnOnce(&mut Resource),
) -> Result<(), ShapeError> {
	let Some(mut resource) = data.get(key).cloned() else {
		return Ok(());
	};
	f(&mut resource);
	endpoint.merge(query, data, &resource)?;
	Ok(())
}

fn runs_of(data: &CacheData) -> Vec<Run> {
	data.iter().filter_map(Resource::as_run).cloned().collect()
}

fn write_runs(query: &QueryArgs, data: &mut CacheData, runs: Vec<Run>) -> Result<(), ShapeError> {
	for run in runs {
		RUNS.merge(query, data, &Resource::Run(run))?;
	}
	Ok(())
}

fn key(kind: ResourceKind, id: impl Into<tracker_model::ResourceId>) -> ResourceKey {
	ResourceKey::new(kind, id)
}
