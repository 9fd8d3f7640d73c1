//! The keyed query cache.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace, warn};

use crate::data::CacheData;
use crate::error::ShapeError;
use crate::inverse::Inverse;
use crate::key::{QueryKey, Tag};

/// Consumer-visible state of one cache entry.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryState {
	pub data: Option<Arc<CacheData>>,
	pub is_loading: bool,
	pub error: Option<String>,
	/// Invalidated since the last successful write.
	pub stale: bool,
}

struct CacheEntry {
	tags: BTreeSet<Tag>,
	subscribers: usize,
	/// Invalidated while a fetch was in flight; that fetch's result may
	/// predate the change.
	stale_in_flight: bool,
	tx: watch::Sender<EntryState>,
}

impl CacheEntry {
	fn new() -> Self {
		let (tx, _) = watch::channel(EntryState::default());
		Self {
			tags: BTreeSet::new(),
			subscribers: 0,
			stale_in_flight: false,
			tx,
		}
	}

	fn data(&self) -> Option<Arc<CacheData>> {
		self.tx.borrow().data.clone()
	}
}

/// Shared store of every cached query result.
///
/// # Concurrency
///
/// All state sits behind one `parking_lot::Mutex`. The lock is never held
/// across an `.await`; recipes passed to [`Self::patch`] run under it and
/// must not call back into the cache.
pub struct QueryCache {
	entries: Mutex<HashMap<QueryKey, CacheEntry>>,
	refetch_tx: mpsc::UnboundedSender<QueryKey>,
	refetch_rx: Mutex<Option<mpsc::UnboundedReceiver<QueryKey>>>,
}

impl Default for QueryCache {
	fn default() -> Self {
		Self::new()
	}
}

impl QueryCache {
	pub fn new() -> Self {
		let (refetch_tx, refetch_rx) = mpsc::unbounded_channel();
		Self {
			entries: Mutex::new(HashMap::new()),
			refetch_tx,
			refetch_rx: Mutex::new(Some(refetch_rx)),
		}
	}

	/// Current value under `key`, if loaded.
	pub fn read(&self, key: &QueryKey) -> Option<Arc<CacheData>> {
		self.entries.lock().get(key).and_then(CacheEntry::data)
	}

	pub fn entry_state(&self, key: &QueryKey) -> EntryState {
		self.entries.lock().get(key).map(|e| e.tx.borrow().clone()).unwrap_or_default()
	}

	/// Hands out the receiving end of the refetch queue. Only the first call
	/// gets it.
	pub fn take_refetch_queue(&self) -> Option<mpsc::UnboundedReceiver<QueryKey>> {
		self.refetch_rx.lock().take()
	}

	/// Marks `key` loading and attaches `tags`.
	///
	/// Returns `false` when a fetch for the key is already in flight; the
	/// caller then waits on the entry instead of fetching again.
	pub fn start_fetch(&self, key: &QueryKey, tags: &[Tag]) -> bool {
		let mut entries = self.entries.lock();
		let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
		entry.tags.extend(tags.iter().cloned());
		let mut started = false;
		entry.tx.send_if_modified(|state| {
			if state.is_loading {
				return false;
			}
			state.is_loading = true;
			started = true;
			true
		});
		if started {
			trace!(%key, "fetch started");
		}
		started
	}

	/// Replaces the value under `key` wholesale.
	///
	/// If the entry was invalidated while its fetch was in flight, the new
	/// value stays stale and subscribed entries are queued for another fetch.
	pub fn write(&self, key: &QueryKey, data: CacheData) {
		let mut entries = self.entries.lock();
		let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
		let stale = std::mem::take(&mut entry.stale_in_flight);
		debug!(%key, shape = data.shape_name(), len = data.len(), stale, "cache write");
		entry.tx.send_replace(EntryState {
			data: Some(Arc::new(data)),
			is_loading: false,
			error: None,
			stale,
		});
		if stale && entry.subscribers > 0 {
			trace!(%key, "invalidated mid-fetch, queued for refetch");
			let _ = self.refetch_tx.send(key.clone());
		}
	}

	/// Records a failed fetch. Previously loaded data stays visible.
	pub fn fail_fetch(&self, key: &QueryKey, error: impl Into<String>) {
		let error = error.into();
		let mut entries = self.entries.lock();
		let Some(entry) = entries.get_mut(key) else {
			return;
		};
		warn!(%key, %error, "fetch failed");
		entry.stale_in_flight = false;
		entry.tx.send_modify(|state| {
			state.is_loading = false;
			state.error = Some(error);
		});
	}

	/// Runs `recipe` over a copy of the value under `key` and publishes the
	/// result, returning the inverse of the change.
	///
	/// Absent or unloaded entries are left alone with an identity inverse. A
	/// failing recipe leaves the entry untouched.
	pub fn patch<F>(&self, key: &QueryKey, recipe: F) -> Result<Inverse, ShapeError>
	where
		F: FnOnce(&mut CacheData) -> Result<(), ShapeError>,
	{
		let entries = self.entries.lock();
		let Some(entry) = entries.get(key) else {
			return Ok(Inverse::Identity);
		};
		let Some(before) = entry.data() else {
			trace!(%key, "patch skipped: entry not loaded");
			return Ok(Inverse::Identity);
		};

		let mut after = CacheData::clone(&before);
		recipe(&mut after)?;
		let inverse = Inverse::between(&before, &after);
		if !inverse.is_identity() {
			debug!(%key, "cache patch");
			entry.tx.send_modify(|state| state.data = Some(Arc::new(after)));
		}
		Ok(inverse)
	}

	/// Runs an inverse previously returned by [`Self::patch`].
	pub fn apply_inverse(&self, key: &QueryKey, inverse: &Inverse) -> Result<(), ShapeError> {
		if inverse.is_identity() {
			return Ok(());
		}
		let entries = self.entries.lock();
		let Some(entry) = entries.get(key) else {
			return Ok(());
		};
		let Some(current) = entry.data() else {
			return Ok(());
		};
		let restored = inverse.apply(&current)?;
		debug!(%key, "cache patch reverted");
		entry.tx.send_modify(|state| state.data = Some(Arc::new(restored)));
		Ok(())
	}

	/// Like [`Self::patch`], but a shape error invalidates the entry's tags
	/// instead of surfacing.
	pub fn patch_or_invalidate<F>(&self, key: &QueryKey, recipe: F) -> Inverse
	where
		F: FnOnce(&mut CacheData) -> Result<(), ShapeError>,
	{
		match self.patch(key, recipe) {
			Ok(inverse) => inverse,
			Err(error) => {
				warn!(%key, %error, "patch failed, invalidating");
				self.invalidate_entry(key);
				Inverse::Identity
			}
		}
	}

	/// Marks every entry tagged with any of `tags` stale. Entries with live
	/// subscribers are queued for refetch; the rest refetch on next query.
	///
	/// Returns the affected keys.
	pub fn invalidate_tags(&self, tags: &[Tag]) -> Vec<QueryKey> {
		if tags.is_empty() {
			return Vec::new();
		}
		let mut entries = self.entries.lock();
		let mut affected = Vec::new();
		for (key, entry) in entries.iter_mut() {
			if !tags.iter().any(|t| entry.tags.contains(t)) {
				continue;
			}
			self.mark_stale(key, entry);
			affected.push(key.clone());
		}
		debug!(tags = ?tags, affected = affected.len(), "tags invalidated");
		affected
	}

	/// Invalidates the tags attached to `key`, or only `key` itself when it
	/// carries none.
	pub fn invalidate_entry(&self, key: &QueryKey) -> Vec<QueryKey> {
		let tags: Vec<Tag> = self.tags_of(key).into_iter().collect();
		if !tags.is_empty() {
			return self.invalidate_tags(&tags);
		}
		let mut entries = self.entries.lock();
		match entries.get_mut(key) {
			Some(entry) => {
				self.mark_stale(key, entry);
				vec![key.clone()]
			}
			None => Vec::new(),
		}
	}

	pub fn tags_of(&self, key: &QueryKey) -> BTreeSet<Tag> {
		self.entries.lock().get(key).map(|e| e.tags.clone()).unwrap_or_default()
	}

	/// Every live key of endpoint `name`.
	pub fn select_keys_for_endpoint(&self, name: &str) -> Vec<QueryKey> {
		let mut keys: Vec<QueryKey> = self.entries.lock().keys().filter(|k| k.endpoint == name).cloned().collect();
		keys.sort();
		keys
	}

	/// Registers a consumer of `key`, creating the entry if needed.
	pub fn subscribe(&self, key: &QueryKey) -> watch::Receiver<EntryState> {
		let mut entries = self.entries.lock();
		let entry = entries.entry(key.clone()).or_insert_with(CacheEntry::new);
		entry.subscribers += 1;
		entry.tx.subscribe()
	}

	/// Drops one consumer of `key`. Data and in-flight fetches are kept.
	pub fn release(&self, key: &QueryKey) {
		if let Some(entry) = self.entries.lock().get_mut(key) {
			entry.subscribers = entry.subscribers.saturating_sub(1);
		}
	}

	pub fn is_subscribed(&self, key: &QueryKey) -> bool {
		self.entries.lock().get(key).is_some_and(|e| e.subscribers > 0)
	}

	fn mark_stale(&self, key: &QueryKey, entry: &mut CacheEntry) {
		entry.tx.send_modify(|state| state.stale = true);
		if entry.tx.borrow().is_loading {
			entry.stale_in_flight = true;
		} else if entry.subscribers > 0 {
			trace!(%key, "queued for refetch");
			let _ = self.refetch_tx.send(key.clone());
		}
	}
}

#[cfg(test)]
mod tests;
