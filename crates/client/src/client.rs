//! The consumer-facing client.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};
use tracker_cache::{CacheData, Page, QueryCache, QueryKey, Window};
use tracker_model::{QueryArgs, Resource, compare};
use tracker_push::{ChannelRegistry, PushConnector, WsConnector};

use crate::config::ClientConfig;
use crate::endpoint::{Endpoint, Shape};
use crate::query::QueryHandle;
use crate::rest::{HttpTransport, Paginated, RestTransport};
use crate::session::Session;
use crate::{Error, Result};

/// Entry point for queries, mutations and push subscriptions.
///
/// Cheap to clone; clones share the cache and the push channels.
#[derive(Clone)]
pub struct Client {
	pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
	pub(crate) config: ClientConfig,
	pub(crate) cache: Arc<QueryCache>,
	pub(crate) transport: Arc<dyn RestTransport>,
	pub(crate) session: Arc<Session>,
	pub(crate) push: ChannelRegistry,
}

impl Client {
	/// Creates a client over `transport` and `connector`.
	///
	/// Spawns the background refetch worker, so it must be called within a
	/// Tokio runtime.
	pub fn new(config: ClientConfig, transport: Arc<dyn RestTransport>, connector: Arc<dyn PushConnector>) -> Result<Self> {
		let session = Arc::new(Session::new(config.csrf_token.clone()));
		Self::with_session(config, session, transport, connector)
	}

	/// Creates a client talking HTTP to `config.api_root` and WebSockets to
	/// `config.ws_root`.
	pub fn connect(config: ClientConfig) -> Result<Self> {
		let session = Arc::new(Session::new(config.csrf_token.clone()));
		let transport = Arc::new(HttpTransport::new(&config, session.clone())?);
		Self::with_session(config, session, transport, Arc::new(WsConnector))
	}

	fn with_session(
		config: ClientConfig,
		session: Arc<Session>,
		transport: Arc<dyn RestTransport>,
		connector: Arc<dyn PushConnector>,
	) -> Result<Self> {
		config.validate()?;
		let cache = Arc::new(QueryCache::new());
		let push = ChannelRegistry::new(connector, cache.clone(), config.backoff());
		let inner = Arc::new(ClientInner {
			config,
			cache,
			transport,
			session,
			push,
		});
		if let Some(queue) = inner.cache.take_refetch_queue() {
			tokio::spawn(refetch_worker(Arc::downgrade(&inner), queue));
		}
		Ok(Self { inner })
	}

	pub fn cache(&self) -> &Arc<QueryCache> {
		&self.inner.cache
	}

	pub fn session(&self) -> &Arc<Session> {
		&self.inner.session
	}

	pub fn config(&self) -> &ClientConfig {
		&self.inner.config
	}

	/// Opens a query, fetching it unless fresh data is cached.
	///
	/// Must be called within a Tokio runtime.
	pub fn query(&self, endpoint: &'static Endpoint, args: QueryArgs) -> QueryHandle {
		let key = key_for(endpoint, args);
		let rx = self.inner.cache.subscribe(&key);
		let state = rx.borrow().clone();
		if !state.is_loading && (state.data.is_none() || state.stale) {
			self.inner.begin_load(endpoint, key.clone());
		}
		QueryHandle::new(self.inner.clone(), endpoint, key, rx)
	}
}

/// Cache key of `args` on `endpoint`.
pub fn key_for(endpoint: &'static Endpoint, args: QueryArgs) -> QueryKey {
	match endpoint.shape {
		Shape::Windowed => QueryKey::windowed(endpoint.name, &args),
		_ => QueryKey::new(endpoint.name, args),
	}
}

impl ClientInner {
	/// Starts a background fetch of `key` unless one is in flight.
	pub(crate) fn begin_load(self: &Arc<Self>, endpoint: &'static Endpoint, key: QueryKey) {
		if !self.cache.start_fetch(&key, endpoint.tags) {
			trace!(%key, "fetch already in flight");
			return;
		}
		let inner = self.clone();
		tokio::spawn(async move { inner.finish_load(endpoint, key).await });
	}

	async fn finish_load(&self, endpoint: &'static Endpoint, key: QueryKey) {
		match self.fetch(endpoint, &key).await {
			Ok(data) => self.cache.write(&key, data),
			Err(error) => self.cache.fail_fetch(&key, error.to_string()),
		}
	}

	async fn fetch(&self, endpoint: &'static Endpoint, key: &QueryKey) -> Result<CacheData> {
		match endpoint.shape {
			Shape::Windowed => self.fetch_window(endpoint, key).await,
			Shape::List => {
				let mut items = self.fetch_items(endpoint, &key.args).await?;
				items.sort_by(compare);
				Ok(CacheData::List(items))
			}
			Shape::Single => {
				let items = self.fetch_items(endpoint, &key.args).await?;
				let resource = items
					.into_iter()
					.next()
					.ok_or_else(|| Error::Decode(format!("{key} returned no resource")))?;
				Ok(CacheData::Single(resource))
			}
			Shape::Raw => {
				let response = self.transport.send(endpoint.request(&key.args)).await?.error_for_status()?;
				Ok(CacheData::Raw(response.body))
			}
		}
	}

	/// Refetches every page the window held, or the first page of a new one.
	async fn fetch_window(&self, endpoint: &'static Endpoint, key: &QueryKey) -> Result<CacheData> {
		let params: Vec<u32> = match self.cache.read(key).as_deref() {
			Some(CacheData::Window(window)) => window.params().iter().flatten().copied().collect(),
			_ => Vec::new(),
		};
		let params = if params.is_empty() { vec![1] } else { params };

		let mut window = Window::new();
		for param in params {
			let page = self.fetch_page(endpoint, &key.args, param).await?;
			let has_next = page.has_next;
			window.insert_fetched(param, page, compare);
			if !has_next {
				break;
			}
		}
		Ok(CacheData::Window(window))
	}

	pub(crate) async fn fetch_page(&self, endpoint: &'static Endpoint, args: &QueryArgs, param: u32) -> Result<Page> {
		let args = args.with("page", param).with("limit", self.config.page_limit);
		let response = self.transport.send(endpoint.request(&args)).await?.error_for_status()?;
		let paginated: Paginated = serde_json::from_value(response.body)?;
		debug!(endpoint = endpoint.name, param, count = paginated.count, "page fetched");
		Ok(Page {
			count: paginated.count,
			has_previous: paginated.previous.is_some(),
			has_next: paginated.next.is_some(),
			items: paginated.results,
		})
	}

	/// Items of a non-windowed collection. Accepts a bare array, a single
	/// object, or a paginated envelope.
	async fn fetch_items(&self, endpoint: &'static Endpoint, args: &QueryArgs) -> Result<Vec<Resource>> {
		let response = self.transport.send(endpoint.request(args)).await?.error_for_status()?;
		if let Value::Object(map) = &response.body
			&& map.contains_key("results")
		{
			let paginated: Paginated = serde_json::from_value(response.body)?;
			if paginated.next.is_some() {
				warn!(endpoint = endpoint.name, count = paginated.count, "list endpoint is paginated, keeping first page");
			}
			return Ok(paginated.results);
		}
		response.resources()
	}
}

/// Refetches entries invalidated while subscribed.
async fn refetch_worker(inner: Weak<ClientInner>, mut queue: mpsc::UnboundedReceiver<QueryKey>) {
	while let Some(key) = queue.recv().await {
		let Some(inner) = inner.upgrade() else {
			break;
		};
		match Endpoint::by_name(&key.endpoint) {
			Some(endpoint) => inner.begin_load(endpoint, key),
			None => warn!(%key, "refetch queued for unknown endpoint"),
		}
	}
	debug!("refetch worker stopped");
}
