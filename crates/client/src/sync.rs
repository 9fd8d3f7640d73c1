//! Live queries kept current by push events.
//!
//! A [`SyncSubscription`] pairs a query with the push channel of its
//! endpoint's topic. Every event is turned into resource changes and folded
//! into each cached key of the endpoint, so sibling queries with other
//! arguments follow along. Subscriptions of one endpoint share a scope on the
//! channel and handle each event once between them.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;
use tracker_cache::{CacheData, QueryCache, ShapeError, Tag};
use tracker_model::{DonationBid, QueryArgs, ResourceKey, ResourceKind, compare};
use tracker_push::{ConnectionState, PushEvent, ResourceChange, SubscriberSpec, Subscription};
use url::Url;

use crate::client::Client;
use crate::endpoint::Endpoint;
use crate::query::QueryHandle;
use crate::reconcile::bids;
use crate::{Error, Result};

/// A query plus the push subscription keeping it current.
///
/// Dropping it releases the query and detaches from the channel; the channel
/// closes with its last subscriber.
pub struct SyncSubscription {
	query: QueryHandle,
	push: Subscription,
}

impl SyncSubscription {
	pub fn query(&self) -> &QueryHandle {
		&self.query
	}

	pub fn query_mut(&mut self) -> &mut QueryHandle {
		&mut self.query
	}

	pub fn url(&self) -> &Url {
		self.push.url()
	}

	pub fn connection(&self) -> ConnectionState {
		self.push.state()
	}

	/// Waits until the channel is open. Returns `false` if it closed instead.
	pub async fn opened(&self) -> bool {
		self.push.opened().await
	}
}

impl Client {
	/// Opens `endpoint` with `args` and follows its push topic.
	///
	/// `tags` are invalidated when the channel reconnects after a drop; empty
	/// means the endpoint's own tags. Fails for endpoints without a topic.
	pub fn subscribe(&self, endpoint: &'static Endpoint, args: QueryArgs, tags: &[Tag]) -> Result<SyncSubscription> {
		let topic = endpoint
			.topic
			.ok_or_else(|| Error::Config(format!("endpoint {} has no push topic", endpoint.name)))?;
		let url = self.inner.config.ws_url(topic)?;
		let tags = if tags.is_empty() { endpoint.tags.to_vec() } else { tags.to_vec() };

		let sink = Arc::new(EventSink::new(endpoint, self.inner.cache.clone()));
		let spec = SubscriberSpec {
			tags,
			scope: Some(endpoint.name.to_string()),
			callback: Arc::new(move |event: &PushEvent| sink.apply(event)),
		};
		let query = self.query(endpoint, args);
		let push = self.inner.push.subscribe(url, spec);
		Ok(SyncSubscription { query, push })
	}
}

/// How many recent donations a sink remembers as already counted.
const COUNTED_DONATIONS: usize = 1024;

/// Applies push events to the cached keys of one endpoint.
pub(crate) struct EventSink {
	endpoint: &'static Endpoint,
	cache: Arc<QueryCache>,
	/// Donations whose bid links were already counted.
	counted: Mutex<RecentIds>,
}

impl EventSink {
	pub(crate) fn new(endpoint: &'static Endpoint, cache: Arc<QueryCache>) -> Self {
		Self {
			endpoint,
			cache,
			counted: Mutex::new(RecentIds::new(COUNTED_DONATIONS)),
		}
	}

	/// Folds `event` into every cached key of the endpoint. Keys whose value
	/// does not take the change are invalidated.
	pub(crate) fn apply(&self, event: &PushEvent) {
		let changes = event.resource_changes();
		let links = self.new_bid_links(event);
		let totals = match event {
			PushEvent::DonationReceived {
				donation,
				donation_count,
				event_total,
			} => Some(Totals {
				event: donation.event,
				count: *donation_count,
				amount: *event_total,
			}),
			_ => None,
		};

		for key in self.cache.select_keys_for_endpoint(self.endpoint.name) {
			self.cache.patch_or_invalidate(&key, |data| {
				for change in &changes {
					self.apply_change(&key.args, data, change)?;
				}
				if !links.is_empty() {
					bids::apply_donation_bids(data, &links)?;
				}
				if let Some(totals) = &totals
					&& self.endpoint.kind == Some(ResourceKind::Event)
				{
					totals.apply(data)?;
				}
				Ok(())
			});
		}
		trace!(endpoint = self.endpoint.name, event = event.name(), "push event applied");
	}

	fn apply_change(&self, args: &QueryArgs, data: &mut CacheData, change: &ResourceChange) -> Result<(), ShapeError> {
		match change {
			ResourceChange::Upsert(resource) => {
				self.endpoint.merge(args, data, resource)?;
			}
			ResourceChange::Delete(key) if self.endpoint.kind == Some(key.kind) => {
				data.remove(key)?;
			}
			ResourceChange::Delete(_) => {}
		}
		Ok(())
	}

	/// Bid links of a donation seen for the first time, for bid endpoints.
	/// Repeated deliveries of the same donation carry no new contribution.
	fn new_bid_links(&self, event: &PushEvent) -> Vec<DonationBid> {
		let PushEvent::DonationReceived { donation, .. } = event else {
			return Vec::new();
		};
		if self.endpoint.kind != Some(ResourceKind::Bid) || donation.bids.is_empty() {
			return Vec::new();
		}
		if !self.counted.lock().insert(donation.id) {
			return Vec::new();
		}
		donation.bids.clone()
	}
}

/// Insertion-ordered id set that forgets its oldest entries past `capacity`.
struct RecentIds {
	capacity: usize,
	ids: HashSet<i64>,
	order: VecDeque<i64>,
}

impl RecentIds {
	fn new(capacity: usize) -> Self {
		Self {
			capacity,
			ids: HashSet::new(),
			order: VecDeque::new(),
		}
	}

	/// Records `id`. Returns `false` if it was already known.
	fn insert(&mut self, id: i64) -> bool {
		if !self.ids.insert(id) {
			return false;
		}
		self.order.push_back(id);
		while self.order.len() > self.capacity {
			if let Some(oldest) = self.order.pop_front() {
				self.ids.remove(&oldest);
			}
		}
		true
	}

	fn len(&self) -> usize {
		self.ids.len()
	}
}

/// Event aggregates reported with a new donation. Both are absolute values.
struct Totals {
	event: i64,
	count: Option<u32>,
	amount: Option<f64>,
}

impl Totals {
	fn apply(&self, data: &mut CacheData) -> Result<(), ShapeError> {
		data.update(&ResourceKey::new(ResourceKind::Event, self.event), compare, |resource| {
			if let Some(event) = resource.as_event_mut() {
				if let Some(amount) = self.amount {
					event.amount = amount;
				}
				if let Some(count) = self.count {
					event.donation_count = count;
				}
			}
		})?;
		Ok(())
	}
}
