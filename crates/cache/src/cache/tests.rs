use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::json;
use tracker_model::{QueryArgs, Resource, compare};

use super::*;
use crate::fixtures::{donation, ids, pinned};
use crate::page::{Page, Window};

const DONATIONS: Tag = Tag::from_static("donations");
const ME: Tag = Tag::from_static("me");

fn key(event: i64) -> QueryKey {
	QueryKey::windowed("donations", &QueryArgs::from_value(json!({"event": event})).unwrap())
}

fn windowed(items: Vec<Resource>, page_size: usize, last_has_next: bool) -> CacheData {
	let count = items.len() as u64;
	let chunks: Vec<Vec<Resource>> = items.chunks(page_size.max(1)).map(<[Resource]>::to_vec).collect();
	let total = chunks.len();
	let mut window = Window::new();
	for (index, items) in chunks.into_iter().enumerate() {
		let page = Page {
			count,
			has_previous: index > 0,
			has_next: index + 1 < total || last_has_next,
			items,
		};
		window.insert_fetched(index as u32 + 1, page, compare);
	}
	CacheData::Window(window)
}

fn loaded(data: CacheData) -> (QueryCache, QueryKey) {
	let cache = QueryCache::new();
	let key = key(1);
	assert!(cache.start_fetch(&key, &[DONATIONS]));
	cache.write(&key, data);
	(cache, key)
}

fn read_ids(cache: &QueryCache, key: &QueryKey) -> Vec<i64> {
	let data = cache.read(key).unwrap();
	ids(&data.iter().cloned().collect::<Vec<_>>())
}

#[test]
fn push_insert_lands_in_sorted_position() {
	let (cache, key) = loaded(windowed(vec![donation(5, 50), donation(3, 30), donation(1, 10)], 10, false));
	cache
		.patch(&key, |data| data.reconcile(donation(4, 40), true, compare).map(drop))
		.unwrap();
	assert_eq!(read_ids(&cache, &key), vec![5, 4, 3, 1]);

	let CacheData::Window(window) = &*cache.read(&key).unwrap() else {
		panic!("expected a window");
	};
	assert_eq!(window.count(), 4);
}

#[test]
fn patch_then_inverse_restores_entry() {
	let original = windowed(vec![donation(5, 50), donation(3, 30), donation(1, 10)], 2, true);
	let (cache, key) = loaded(original.clone());
	let inverse = cache
		.patch(&key, |data| {
			data.reconcile(pinned(&donation(3, 30), true), true, compare)?;
			data.reconcile(donation(1, 10), false, compare)?;
			data.reconcile(donation(0, 0), true, compare)?;
			Ok(())
		})
		.unwrap();
	assert_ne!(*cache.read(&key).unwrap(), original);

	cache.apply_inverse(&key, &inverse).unwrap();
	assert_eq!(*cache.read(&key).unwrap(), original);
}

#[test]
fn inverse_leaves_unrelated_later_changes() {
	let (cache, key) = loaded(CacheData::List(vec![donation(5, 50), donation(3, 30)]));
	let inverse = cache
		.patch(&key, |data| data.reconcile(pinned(&donation(3, 30), true), true, compare).map(drop))
		.unwrap();
	cache
		.patch(&key, |data| data.reconcile(donation(9, 59), true, compare).map(drop))
		.unwrap();

	cache.apply_inverse(&key, &inverse).unwrap();
	let data = cache.read(&key).unwrap();
	assert_eq!(ids(&data.iter().cloned().collect::<Vec<_>>()), vec![9, 5, 3]);
	assert!(data.iter().all(|r| r.as_donation().is_some_and(|d| !d.pinned)));
}

#[test]
fn patch_skips_absent_and_unloaded_entries() {
	let cache = QueryCache::new();
	let key = key(1);
	let inverse = cache.patch(&key, |_| panic!("recipe must not run")).unwrap();
	assert!(inverse.is_identity());

	cache.start_fetch(&key, &[DONATIONS]);
	let inverse = cache.patch(&key, |_| panic!("recipe must not run")).unwrap();
	assert!(inverse.is_identity());
	assert!(cache.read(&key).is_none());
}

#[test]
fn failing_recipe_leaves_entry_untouched() {
	let (cache, key) = loaded(CacheData::List(vec![donation(5, 50)]));
	let err = cache
		.patch(&key, |data| {
			data.reconcile(donation(4, 40), true, compare)?;
			Err(ShapeError::Corrupt("boom".into()))
		})
		.unwrap_err();
	assert_eq!(err, ShapeError::Corrupt("boom".into()));
	assert_eq!(read_ids(&cache, &key), vec![5]);
}

#[test]
fn shape_errors_invalidate_instead_of_failing() {
	let cache = QueryCache::new();
	let key = QueryKey::new("me", QueryArgs::default());
	cache.start_fetch(&key, &[ME]);
	cache.write(&key, CacheData::Raw(json!({"username": "runner"})));

	let inverse = cache.patch_or_invalidate(&key, |data| data.reconcile(donation(1, 0), true, compare).map(drop));
	assert!(inverse.is_identity());
	assert!(cache.entry_state(&key).stale);
}

#[test]
fn start_fetch_deduplicates_in_flight_loads() {
	let cache = QueryCache::new();
	let key = key(1);
	assert!(cache.start_fetch(&key, &[DONATIONS]));
	assert!(!cache.start_fetch(&key, &[DONATIONS]));
	assert!(cache.entry_state(&key).is_loading);

	cache.fail_fetch(&key, "timeout");
	let state = cache.entry_state(&key);
	assert!(!state.is_loading);
	assert_eq!(state.error.as_deref(), Some("timeout"));
	assert!(cache.start_fetch(&key, &[DONATIONS]));
}

#[test]
fn invalidation_queues_only_subscribed_entries() {
	let cache = QueryCache::new();
	let mut queue = cache.take_refetch_queue().unwrap();
	assert!(cache.take_refetch_queue().is_none());

	let watched = key(1);
	let idle = key(2);
	for k in [&watched, &idle] {
		cache.start_fetch(k, &[DONATIONS]);
		cache.write(k, CacheData::List(Vec::new()));
	}
	let _rx = cache.subscribe(&watched);

	let mut affected = cache.invalidate_tags(&[DONATIONS, ME]);
	affected.sort();
	assert_eq!(affected, vec![watched.clone(), idle.clone()]);
	assert!(cache.entry_state(&watched).stale);
	assert!(cache.entry_state(&idle).stale);
	assert_eq!(queue.try_recv().ok(), Some(watched.clone()));
	assert!(queue.try_recv().is_err());

	cache.release(&watched);
	assert!(!cache.is_subscribed(&watched));
	assert!(cache.read(&watched).is_some());
}

#[test]
fn invalidation_during_fetch_outlives_the_write() {
	let cache = QueryCache::new();
	let mut queue = cache.take_refetch_queue().unwrap();
	let key = key(1);
	let _rx = cache.subscribe(&key);

	assert!(cache.start_fetch(&key, &[DONATIONS]));
	cache.invalidate_tags(&[DONATIONS]);
	assert!(queue.try_recv().is_err());

	cache.write(&key, CacheData::List(vec![donation(1, 10)]));
	let state = cache.entry_state(&key);
	assert!(state.stale);
	assert!(!state.is_loading);
	assert_eq!(queue.try_recv().ok(), Some(key.clone()));

	assert!(cache.start_fetch(&key, &[DONATIONS]));
	cache.write(&key, CacheData::List(Vec::new()));
	assert!(!cache.entry_state(&key).stale);
	assert!(queue.try_recv().is_err());
}

#[test]
fn untagged_entries_are_not_invalidated() {
	let cache = QueryCache::new();
	let key = key(1);
	cache.start_fetch(&key, &[DONATIONS]);
	cache.write(&key, CacheData::List(Vec::new()));
	assert!(cache.invalidate_tags(&[ME]).is_empty());
	assert!(!cache.entry_state(&key).stale);
}

#[test]
fn keys_are_selected_by_endpoint() {
	let cache = QueryCache::new();
	cache.start_fetch(&key(2), &[DONATIONS]);
	cache.start_fetch(&key(1), &[DONATIONS]);
	cache.start_fetch(&QueryKey::new("runs", QueryArgs::default()), &[]);
	assert_eq!(cache.select_keys_for_endpoint("donations"), vec![key(1), key(2)]);
}

#[tokio::test]
async fn subscribers_observe_writes_and_patches() {
	let cache = QueryCache::new();
	let key = key(1);
	let mut rx = cache.subscribe(&key);
	cache.start_fetch(&key, &[DONATIONS]);
	cache.write(&key, CacheData::List(vec![donation(5, 50)]));
	rx.changed().await.unwrap();
	assert_eq!(rx.borrow_and_update().data.as_ref().map(|d| d.len()), Some(1));

	cache
		.patch(&key, |data| data.reconcile(donation(4, 40), true, compare).map(drop))
		.unwrap();
	rx.changed().await.unwrap();
	assert_eq!(rx.borrow_and_update().data.as_ref().map(|d| d.len()), Some(2));
}

#[derive(Debug, Clone)]
enum Op {
	Upsert { id: i64, minute: u32, pinned: bool },
	Remove { id: i64 },
}

fn arb_op() -> impl Strategy<Value = Op> {
	prop_oneof![
		3 => (0i64..24, 0u32..60, any::<bool>()).prop_map(|(id, minute, pinned)| Op::Upsert { id, minute, pinned }),
		1 => (0i64..24).prop_map(|id| Op::Remove { id }),
	]
}

fn arb_items() -> impl Strategy<Value = Vec<Resource>> {
	prop::collection::btree_map(0i64..24, 0u32..60, 0..12).prop_map(|entries| {
		let mut items: Vec<Resource> = entries.into_iter().map(|(id, minute)| donation(id, minute)).collect();
		items.sort_by(compare);
		items
	})
}

fn apply_op(data: &mut CacheData, op: &Op) -> Result<(), ShapeError> {
	match op {
		Op::Upsert { id, minute, pinned: pin } => {
			data.reconcile(pinned(&donation(*id, *minute), *pin), true, compare)?;
		}
		Op::Remove { id } => {
			data.reconcile(donation(*id, 0), false, compare)?;
		}
	}
	Ok(())
}

fn window_count(data: &CacheData) -> u64 {
	match data {
		CacheData::Window(w) => w.count(),
		_ => 0,
	}
}

proptest! {
	/// Patching and then applying the returned inverse restores the entry exactly.
	#[test]
	fn prop_patch_inverse_roundtrip(
		items in arb_items(),
		page_size in 1usize..5,
		has_next in any::<bool>(),
		ops in prop::collection::vec(arb_op(), 0..16),
	) {
		let original = windowed(items, page_size, has_next);
		let (cache, key) = loaded(original.clone());

		let inverse = cache.patch(&key, |data| ops.iter().try_for_each(|op| apply_op(data, op))).unwrap();
		cache.apply_inverse(&key, &inverse).unwrap();

		let restored = cache.read(&key).unwrap();
		prop_assert_eq!(&*restored, &original, "inverse should restore the original entry");
	}

	/// Arbitrary reconcile sequences keep every entry sorted and duplicate-free,
	/// and the server count tracks inserts and removals.
	#[test]
	fn prop_reconcile_keeps_order(
		items in arb_items(),
		page_size in 1usize..5,
		has_next in any::<bool>(),
		ops in prop::collection::vec(arb_op(), 0..24),
	) {
		let mut data = windowed(items, page_size, has_next);
		let mut list = CacheData::List(data.iter().cloned().collect());

		for op in &ops {
			let before_len = data.len() as i64;
			let before_count = window_count(&data) as i64;
			apply_op(&mut data, op).unwrap();
			apply_op(&mut list, op).unwrap();

			prop_assert!(data.validate(compare).is_ok());
			prop_assert!(list.validate(compare).is_ok());
			let delta = data.len() as i64 - before_len;
			prop_assert_eq!(window_count(&data) as i64, (before_count + delta).max(0));
		}

		let flat: Vec<Resource> = data.iter().cloned().collect();
		prop_assert_eq!(ids(&flat), ids(&list.iter().cloned().collect::<Vec<_>>()));
	}
}
