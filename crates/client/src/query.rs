//! Live query handles.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::debug;
use tracker_cache::{CacheData, EntryState, QueryKey, ShapeError};
use tracker_model::compare;

use crate::client::ClientInner;
use crate::endpoint::{Endpoint, Shape};
use crate::{Error, Result};

/// A consumer's view of one cached query.
///
/// Keeps the entry subscribed while alive: invalidations of a subscribed
/// entry refetch it in the background. Dropping the handle does not cancel a
/// fetch in flight.
pub struct QueryHandle {
	inner: Arc<ClientInner>,
	endpoint: &'static Endpoint,
	key: QueryKey,
	rx: watch::Receiver<EntryState>,
}

impl QueryHandle {
	pub(crate) fn new(
		inner: Arc<ClientInner>,
		endpoint: &'static Endpoint,
		key: QueryKey,
		rx: watch::Receiver<EntryState>,
	) -> Self {
		Self {
			inner,
			endpoint,
			key,
			rx,
		}
	}

	pub fn key(&self) -> &QueryKey {
		&self.key
	}

	pub fn endpoint(&self) -> &'static Endpoint {
		self.endpoint
	}

	/// Current data, loading flag and error.
	pub fn state(&self) -> EntryState {
		self.rx.borrow().clone()
	}

	pub fn data(&self) -> Option<Arc<CacheData>> {
		self.rx.borrow().data.clone()
	}

	/// Waits for the next change of the entry. Returns `false` once the cache
	/// is gone.
	pub async fn changed(&mut self) -> bool {
		self.rx.changed().await.is_ok()
	}

	/// Waits until the entry has finished loading.
	///
	/// Patches against an entry still loading are dropped, so consumers that
	/// care about push updates wait for this first.
	pub async fn loaded(&mut self) -> Result<Arc<CacheData>> {
		let state = self
			.rx
			.wait_for(|s| !s.is_loading && (s.data.is_some() || s.error.is_some()))
			.await
			.map(|s| s.clone())
			.map_err(|_| Error::Fetch(format!("cache dropped while loading {}", self.key)))?;
		match (state.data, state.error) {
			(Some(data), _) => Ok(data),
			(None, error) => Err(Error::Fetch(error.unwrap_or_default())),
		}
	}

	/// Appends the next server page to a windowed query.
	///
	/// Returns `false` when the window is complete or not loaded yet.
	pub async fn fetch_next_page(&self) -> Result<bool> {
		if self.endpoint.shape != Shape::Windowed {
			return Ok(false);
		}
		let next = match self.inner.cache.read(&self.key).as_deref() {
			Some(CacheData::Window(window)) => window.next_param(),
			_ => None,
		};
		let Some(param) = next else {
			return Ok(false);
		};

		let page = self.inner.fetch_page(self.endpoint, &self.key.args, param).await?;
		debug!(key = %self.key, param, "appending page");
		self.inner.cache.patch(&self.key, |data| match data {
			CacheData::Window(window) => {
				window.insert_fetched(param, page, compare);
				Ok(())
			}
			other => Err(ShapeError::Unsupported {
				operation: "append page",
				found: other.shape_name(),
			}),
		})?;
		Ok(true)
	}

	/// Forces a refetch, unless one is already in flight.
	pub fn refetch(&self) {
		self.inner.begin_load(self.endpoint, self.key.clone());
	}
}

impl Drop for QueryHandle {
	fn drop(&mut self) {
		self.inner.cache.release(&self.key);
	}
}
