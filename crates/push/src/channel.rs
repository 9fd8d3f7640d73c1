//! Reconnecting push channels, one per URL.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracker_cache::{QueryCache, Tag};
use url::Url;

use crate::backoff::Backoff;
use crate::event::PushEvent;
use crate::transport::{Frame, PushConnection, PushConnector};

/// Lifecycle of one push connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
	Connecting,
	Open,
	/// The last subscriber detached; the socket is being shut down.
	Closing,
	/// Closed cleanly by the peer or after the last subscriber detached.
	Closed,
	/// Dropped; waiting out the backoff before reconnect attempt `attempt`.
	Down { attempt: u32 },
}

pub type EventCallback = Arc<dyn Fn(&PushEvent) + Send + Sync>;

/// What a subscriber attaches to a channel.
pub struct SubscriberSpec {
	/// Invalidated after a reconnect that followed a drop.
	pub tags: Vec<Tag>,
	/// Subscribers sharing a scope receive each event once between them.
	pub scope: Option<String>,
	pub callback: EventCallback,
}

struct Subscriber {
	id: u64,
	tags: Vec<Tag>,
	scope: Option<String>,
	callback: EventCallback,
}

struct ChannelInner {
	subscribers: Vec<Subscriber>,
	running: bool,
}

struct ChannelShared {
	url: Url,
	inner: Mutex<ChannelInner>,
	state_tx: watch::Sender<ConnectionState>,
	cancel: CancellationToken,
	next_id: AtomicU64,
}

impl ChannelShared {
	fn new(url: Url) -> Self {
		let (state_tx, _) = watch::channel(ConnectionState::Connecting);
		Self {
			url,
			inner: Mutex::new(ChannelInner {
				subscribers: Vec::new(),
				running: false,
			}),
			state_tx,
			cancel: CancellationToken::new(),
			next_id: AtomicU64::new(0),
		}
	}

	fn set_state(&self, state: ConnectionState) {
		let changed = self.state_tx.send_if_modified(|current| {
			let changed = *current != state;
			*current = state;
			changed
		});
		if changed {
			info!(url = %self.url, state = ?state, "push channel state");
		}
	}

	/// Removes subscriber `id`, returning whether none are left.
	fn detach(&self, id: u64) -> bool {
		let mut inner = self.inner.lock();
		inner.subscribers.retain(|s| s.id != id);
		inner.subscribers.is_empty()
	}

	fn shutdown(&self) {
		self.state_tx.send_if_modified(|state| {
			if *state == ConnectionState::Closed {
				return false;
			}
			*state = ConnectionState::Closing;
			true
		});
		self.cancel.cancel();
	}

	fn tags(&self) -> Vec<Tag> {
		let inner = self.inner.lock();
		let tags: BTreeSet<Tag> = inner.subscribers.iter().flat_map(|s| s.tags.iter().cloned()).collect();
		tags.into_iter().collect()
	}

	fn dispatch(&self, text: &str) {
		let event = match PushEvent::decode(text) {
			Ok(PushEvent::Unknown(value)) => {
				debug!(url = %self.url, frame = %value, "ignoring unknown push frame");
				return;
			}
			Ok(event) => event,
			Err(error) => {
				warn!(url = %self.url, %error, "dropping undecodable push frame");
				return;
			}
		};

		let callbacks: Vec<EventCallback> = {
			let inner = self.inner.lock();
			let mut scopes = BTreeSet::new();
			inner
				.subscribers
				.iter()
				.filter(|s| s.scope.as_ref().is_none_or(|scope| scopes.insert(scope.clone())))
				.map(|s| s.callback.clone())
				.collect()
		};
		debug!(url = %self.url, event = event.name(), subscribers = callbacks.len(), "push event");
		for callback in callbacks {
			callback(&event);
		}
	}
}

struct RegistryInner {
	connector: Arc<dyn PushConnector>,
	cache: Arc<QueryCache>,
	backoff: Backoff,
	channels: Mutex<HashMap<Url, Weak<ChannelShared>>>,
}

/// Registry of live push channels.
///
/// Guarantees one physical connection per URL. Channels are reference
/// counted by their [`Subscription`]s: dropping the last one cancels the
/// connection task and removes the registry entry before `drop` returns.
///
/// # Concurrency
///
/// The URL map lock is always taken before a channel's subscriber lock.
#[derive(Clone)]
pub struct ChannelRegistry {
	inner: Arc<RegistryInner>,
}

impl ChannelRegistry {
	pub fn new(connector: Arc<dyn PushConnector>, cache: Arc<QueryCache>, backoff: Backoff) -> Self {
		Self {
			inner: Arc::new(RegistryInner {
				connector,
				cache,
				backoff,
				channels: Mutex::new(HashMap::new()),
			}),
		}
	}

	/// Attaches a subscriber to the channel for `url`, opening it if needed.
	///
	/// Must be called within a Tokio runtime.
	pub fn subscribe(&self, url: Url, spec: SubscriberSpec) -> Subscription {
		let mut channels = self.inner.channels.lock();
		let channel = match channels.get(&url).and_then(Weak::upgrade) {
			Some(channel) if !channel.cancel.is_cancelled() => channel,
			_ => {
				let channel = Arc::new(ChannelShared::new(url.clone()));
				channels.insert(url.clone(), Arc::downgrade(&channel));
				channel
			}
		};

		let id = channel.next_id.fetch_add(1, Ordering::Relaxed);
		let (spawn, resumed) = {
			let mut inner = channel.inner.lock();
			inner.subscribers.push(Subscriber {
				id,
				tags: spec.tags,
				scope: spec.scope,
				callback: spec.callback,
			});
			let spawn = !std::mem::replace(&mut inner.running, true);
			if spawn {
				channel.set_state(ConnectionState::Connecting);
			}
			// Older subscribers outlived a closed socket and missed its events.
			(spawn, spawn && inner.subscribers.len() > 1)
		};
		drop(channels);

		if spawn {
			debug!(url = %url, resumed, "starting push channel");
			tokio::spawn(run_channel(
				channel.clone(),
				self.inner.connector.clone(),
				self.inner.cache.clone(),
				self.inner.backoff,
				resumed,
			));
		}

		Subscription {
			channel,
			registry: Arc::downgrade(&self.inner),
			id,
		}
	}

	/// Number of live channels.
	pub fn channel_count(&self) -> usize {
		self.inner.channels.lock().values().filter(|w| w.strong_count() > 0).count()
	}

	pub fn state(&self, url: &Url) -> Option<ConnectionState> {
		let channel = self.inner.channels.lock().get(url).and_then(Weak::upgrade)?;
		Some(*channel.state_tx.borrow())
	}
}

/// Guard keeping a subscriber attached to its channel.
pub struct Subscription {
	channel: Arc<ChannelShared>,
	registry: Weak<RegistryInner>,
	id: u64,
}

impl Subscription {
	pub fn url(&self) -> &Url {
		&self.channel.url
	}

	pub fn state(&self) -> ConnectionState {
		*self.channel.state_tx.borrow()
	}

	pub fn state_changes(&self) -> watch::Receiver<ConnectionState> {
		self.channel.state_tx.subscribe()
	}

	/// Waits until the channel is open. Returns `false` if it closed instead.
	pub async fn opened(&self) -> bool {
		let mut rx = self.channel.state_tx.subscribe();
		let state = rx
			.wait_for(|s| matches!(s, ConnectionState::Open | ConnectionState::Closed))
			.await
			.map(|s| *s);
		matches!(state, Ok(ConnectionState::Open))
	}
}

impl Drop for Subscription {
	fn drop(&mut self) {
		let Some(registry) = self.registry.upgrade() else {
			if self.channel.detach(self.id) {
				self.channel.shutdown();
			}
			return;
		};

		let mut channels = registry.channels.lock();
		if !self.channel.detach(self.id) {
			return;
		}
		let url = &self.channel.url;
		if channels.get(url).is_some_and(|w| std::ptr::eq(w.as_ptr(), Arc::as_ptr(&self.channel))) {
			channels.remove(url);
		}
		drop(channels);
		debug!(url = %url, "last push subscriber detached");
		self.channel.shutdown();
	}
}

enum Ended {
	Cancelled,
	Clean(String),
	Unclean(String),
}

/// Drives one channel until cancelled or closed cleanly. `dropped` starts
/// true when subscribers are already waiting on a gap in the event stream.
async fn run_channel(
	shared: Arc<ChannelShared>,
	connector: Arc<dyn PushConnector>,
	cache: Arc<QueryCache>,
	backoff: Backoff,
	mut dropped: bool,
) {
	let mut attempt: u32 = 0;

	loop {
		shared.set_state(ConnectionState::Connecting);
		let connected = tokio::select! {
			biased;
			_ = shared.cancel.cancelled() => break,
			res = connector.connect(&shared.url) => res,
		};

		match connected {
			Ok(mut conn) => {
				if dropped {
					let tags = shared.tags();
					let affected = cache.invalidate_tags(&tags);
					info!(url = %shared.url, tags = ?tags, affected = affected.len(), "reconnected, invalidating");
				}
				attempt = 0;
				shared.set_state(ConnectionState::Open);

				match pump(&shared, conn.as_mut()).await {
					Ended::Cancelled => {
						conn.close().await;
						break;
					}
					Ended::Clean(reason) => {
						info!(url = %shared.url, %reason, "push channel closed by peer");
						finish(&shared);
						return;
					}
					Ended::Unclean(reason) => {
						warn!(url = %shared.url, %reason, "push channel dropped");
					}
				}
			}
			Err(error) => {
				warn!(url = %shared.url, %error, "push connect failed");
			}
		}

		dropped = true;
		attempt = attempt.saturating_add(1);
		shared.set_state(ConnectionState::Down { attempt });
		let delay = backoff.delay(attempt - 1);
		debug!(url = %shared.url, attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
		tokio::select! {
			biased;
			_ = shared.cancel.cancelled() => break,
			_ = tokio::time::sleep(delay) => {}
		}
	}

	finish(&shared);
}

fn finish(shared: &ChannelShared) {
	let mut inner = shared.inner.lock();
	shared.set_state(ConnectionState::Closed);
	inner.running = false;
}

async fn pump(shared: &ChannelShared, conn: &mut dyn PushConnection) -> Ended {
	loop {
		let frame = tokio::select! {
			biased;
			_ = shared.cancel.cancelled() => return Ended::Cancelled,
			frame = conn.recv() => frame,
		};
		match frame {
			None => return Ended::Unclean("stream ended".into()),
			Some(Err(error)) => return Ended::Unclean(error.to_string()),
			Some(Ok(Frame::Close { clean: true, reason })) => return Ended::Clean(reason),
			Some(Ok(Frame::Close { clean: false, reason })) => return Ended::Unclean(reason),
			Some(Ok(Frame::Text(text))) => shared.dispatch(&text),
		}
	}
}

#[cfg(test)]
mod tests;
