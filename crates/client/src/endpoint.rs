//! Endpoint catalog.
//!
//! An [`Endpoint`] ties a REST collection to the cache: how results are
//! shaped, which tags invalidate them, which push topic reports changes to
//! them, and which resources belong to a given set of query arguments.

use std::fmt;

use tracker_cache::{CacheData, Reconciled, ShapeError, Tag};
use tracker_model::{QueryArgs, Resource, ResourceKind, compare, predicate};

use crate::reconcile::bids;
use crate::rest::RestRequest;

/// Folds one resource into a cached value: `(data, resource, matches)`.
type MergeFn = fn(&mut CacheData, &Resource, bool) -> Result<Reconciled, ShapeError>;

/// Invalidation tags.
pub mod tags {
	use tracker_cache::Tag;

	pub const DONATIONS: Tag = Tag::from_static("donations");
	pub const RUNS: Tag = Tag::from_static("runs");
	pub const BIDS: Tag = Tag::from_static("bids");
	pub const EVENTS: Tag = Tag::from_static("events");
	pub const DONATION_GROUPS: Tag = Tag::from_static("donation_groups");
	pub const PRIZES: Tag = Tag::from_static("prizes");
	/// The current user; invalidated when the server refuses a request.
	pub const ME: Tag = Tag::from_static("me");
}

/// How an endpoint's results are cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
	/// One resource.
	Single,
	/// The whole collection in one response.
	List,
	/// Paginated; pages accumulate into a window.
	Windowed,
	/// Opaque payload.
	Raw,
}

pub struct Endpoint {
	pub name: &'static str,
	/// Resource kind of the results; `None` for raw endpoints.
	pub kind: Option<ResourceKind>,
	pub shape: Shape,
	pub tags: &'static [Tag],
	/// Push topic reporting changes to this collection.
	pub topic: Option<&'static str>,
	path: fn(&QueryArgs) -> String,
	/// Arguments consumed by the path instead of the query string.
	path_keys: &'static [&'static str],
	predicate: fn(&QueryArgs, &Resource) -> bool,
	merge: MergeFn,
}

impl Endpoint {
	/// The fetch request for `args`.
	pub fn request(&self, args: &QueryArgs) -> RestRequest {
		let query = args
			.to_query_pairs()
			.into_iter()
			.filter(|(k, _)| !self.path_keys.contains(&k.as_str()))
			.collect();
		RestRequest::get((self.path)(args)).with_query(query)
	}

	/// Whether `resource` belongs in the results for `args`.
	pub fn matches(&self, args: &QueryArgs, resource: &Resource) -> bool {
		self.kind == Some(resource.kind()) && (self.predicate)(args, resource)
	}

	/// Folds `resource` into a value cached for `args`, following the
	/// `(found, matches)` table of [`CacheData::reconcile`]. Resources of other
	/// kinds are ignored.
	pub fn merge(&self, args: &QueryArgs, data: &mut CacheData, resource: &Resource) -> Result<Reconciled, ShapeError> {
		if self.kind != Some(resource.kind()) {
			return Ok(Reconciled::Unchanged);
		}
		(self.merge)(data, resource, self.matches(args, resource))
	}

	pub fn by_name(name: &str) -> Option<&'static Endpoint> {
		ALL.iter().copied().find(|e| e.name == name)
	}
}

impl fmt::Debug for Endpoint {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Endpoint")
			.field("name", &self.name)
			.field("kind", &self.kind)
			.field("shape", &self.shape)
			.finish_non_exhaustive()
	}
}

fn event_scoped(args: &QueryArgs, collection: &str) -> String {
	match args.get_i64("event") {
		Some(event) => format!("events/{event}/{collection}/"),
		None => format!("{collection}/"),
	}
}

fn by_fields(args: &QueryArgs, resource: &Resource) -> bool {
	predicate::matches_args(args, resource)
}

fn by_identity(data: &mut CacheData, resource: &Resource, matches: bool) -> Result<Reconciled, ShapeError> {
	data.reconcile(resource.clone(), matches, compare)
}

pub static DONATIONS: Endpoint = Endpoint {
	name: "donations",
	kind: Some(ResourceKind::Donation),
	shape: Shape::Windowed,
	tags: &[tags::DONATIONS],
	topic: Some("ws/processing/"),
	path: |args| event_scoped(args, "donations"),
	path_keys: &["event"],
	predicate: by_fields,
	merge: by_identity,
};

pub static RUNS: Endpoint = Endpoint {
	name: "runs",
	kind: Some(ResourceKind::Run),
	shape: Shape::List,
	tags: &[tags::RUNS],
	topic: None,
	path: |args| event_scoped(args, "runs"),
	path_keys: &["event"],
	predicate: by_fields,
	merge: by_identity,
};

/// Flat bid list: parents and children side by side.
pub static BIDS: Endpoint = Endpoint {
	name: "bids",
	kind: Some(ResourceKind::Bid),
	shape: Shape::List,
	tags: &[tags::BIDS],
	topic: Some("ws/donations/"),
	path: |args| event_scoped(args, "bids"),
	path_keys: &["event"],
	predicate: by_fields,
	merge: bids::merge_flat,
};

/// Bid tree: top-level bids with their options nested.
pub static BID_TREE: Endpoint = Endpoint {
	name: "bid_tree",
	kind: Some(ResourceKind::Bid),
	shape: Shape::List,
	tags: &[tags::BIDS],
	topic: Some("ws/donations/"),
	path: |args| format!("{}tree/", event_scoped(args, "bids")),
	path_keys: &["event"],
	predicate: |args, resource| {
		resource.as_bid().is_some_and(|b| b.parent.is_none()) && predicate::matches_args(args, resource)
	},
	merge: bids::merge_tree,
};

pub static EVENTS: Endpoint = Endpoint {
	name: "events",
	kind: Some(ResourceKind::Event),
	shape: Shape::List,
	tags: &[tags::EVENTS],
	topic: None,
	path: |_| "events/".to_string(),
	path_keys: &[],
	predicate: by_fields,
	merge: by_identity,
};

/// One event by `id`, with its donation totals.
pub static EVENT: Endpoint = Endpoint {
	name: "event",
	kind: Some(ResourceKind::Event),
	shape: Shape::Single,
	tags: &[tags::EVENTS],
	topic: Some("ws/donations/"),
	path: |args| match args.get_i64("id") {
		Some(id) => format!("events/{id}/"),
		None => "events/current/".to_string(),
	},
	path_keys: &["id"],
	predicate: by_fields,
	merge: by_identity,
};

pub static DONATION_GROUPS: Endpoint = Endpoint {
	name: "donation_groups",
	kind: Some(ResourceKind::DonationGroup),
	shape: Shape::List,
	tags: &[tags::DONATION_GROUPS],
	topic: Some("ws/processing/"),
	path: |_| "donation_groups/".to_string(),
	path_keys: &[],
	predicate: by_fields,
	merge: by_identity,
};

pub static PRIZES: Endpoint = Endpoint {
	name: "prizes",
	kind: Some(ResourceKind::Prize),
	shape: Shape::Windowed,
	tags: &[tags::PRIZES],
	topic: None,
	path: |args| event_scoped(args, "prizes"),
	path_keys: &["event"],
	predicate: by_fields,
	merge: by_identity,
};

/// The signed-in user and their permissions.
pub static ME: Endpoint = Endpoint {
	name: "me",
	kind: None,
	shape: Shape::Raw,
	tags: &[tags::ME],
	topic: None,
	path: |_| "me/".to_string(),
	path_keys: &[],
	predicate: |_, _| false,
	merge: by_identity,
};

pub static ALL: &[&Endpoint] = &[&DONATIONS, &RUNS, &BIDS, &BID_TREE, &EVENTS, &EVENT, &DONATION_GROUPS, &PRIZES, &ME];
