//! Undo records for cache patches.
//!
//! An [`Inverse`] is computed by diffing an entry before and after a patch.
//! Applying it to the value the patch produced restores the original exactly.
//! Applied to a value that has since moved on, it restores only the resources
//! the patch touched, each on its recorded page at its sorted slot, and leaves
//! everything else alone.

use std::collections::{HashMap, HashSet};

use tracker_model::{Resource, ResourceKey};

use crate::data::CacheData;
use crate::error::ShapeError;
use crate::locator::find_slot;
use crate::page::PageMeta;

#[derive(Debug, Clone, PartialEq)]
pub enum Inverse {
	/// The patch changed nothing.
	Identity,
	/// Restores a whole value; used for shapes without item identity.
	Replace(CacheData),
	/// Per-resource undo for lists and windows.
	Items(ItemsUndo),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemsUndo {
	windowed: bool,
	inserted: Vec<ResourceKey>,
	restored: Vec<Restore>,
	layout: Option<Vec<(PageMeta, Option<u32>)>>,
}

#[derive(Debug, Clone, PartialEq)]
struct Restore {
	page: usize,
	item: Resource,
}

impl Inverse {
	/// Undo record turning `after` back into `before`.
	pub fn between(before: &CacheData, after: &CacheData) -> Self {
		if before == after {
			return Self::Identity;
		}
		match (before, after) {
			(CacheData::List(b), CacheData::List(a)) => {
				Self::Items(ItemsUndo::diff(false, &[b.as_slice()], &[a.as_slice()], None))
			}
			(CacheData::Window(b), CacheData::Window(a)) => {
				let layout = b.layout();
				let layout = (layout != a.layout()).then_some(layout);
				let b_pages: Vec<&[Resource]> = b.pages().iter().map(|p| p.items.as_slice()).collect();
				let a_pages: Vec<&[Resource]> = a.pages().iter().map(|p| p.items.as_slice()).collect();
				Self::Items(ItemsUndo::diff(true, &b_pages, &a_pages, layout))
			}
			_ => Self::Replace(before.clone()),
		}
	}

	pub fn is_identity(&self) -> bool {
		matches!(self, Self::Identity)
	}

	/// Applies the undo to `current`, producing the restored value.
	pub fn apply(&self, current: &CacheData) -> Result<CacheData, ShapeError> {
		match self {
			Self::Identity => Ok(current.clone()),
			Self::Replace(before) => Ok(before.clone()),
			Self::Items(undo) => undo.apply(current),
		}
	}
}

impl ItemsUndo {
	fn diff(
		windowed: bool,
		before: &[&[Resource]],
		after: &[&[Resource]],
		layout: Option<Vec<(PageMeta, Option<u32>)>>,
	) -> Self {
		let mut after_at: HashMap<ResourceKey, (usize, &Resource)> = HashMap::new();
		for (page, items) in after.iter().enumerate() {
			for item in items.iter() {
				after_at.insert(item.key(), (page, item));
			}
		}

		let mut before_keys = HashSet::new();
		let mut restored = Vec::new();
		for (page, items) in before.iter().enumerate() {
			for item in items.iter() {
				let key = item.key();
				let untouched = after_at.get(&key).is_some_and(|(p, a)| *p == page && *a == item);
				if !untouched {
					restored.push(Restore {
						page,
						item: item.clone(),
					});
				}
				before_keys.insert(key);
			}
		}

		let inserted = after_at.into_keys().filter(|k| !before_keys.contains(k)).collect();
		Self {
			windowed,
			inserted,
			restored,
			layout,
		}
	}

	fn touched(&self) -> HashSet<ResourceKey> {
		self.inserted.iter().cloned().chain(self.restored.iter().map(|r| r.item.key())).collect()
	}

	fn apply(&self, current: &CacheData) -> Result<CacheData, ShapeError> {
		let touched = self.touched();
		match current {
			CacheData::List(items) if !self.windowed => {
				let mut items: Vec<Resource> = items.iter().filter(|r| !touched.contains(&r.key())).cloned().collect();
				for restore in &self.restored {
					let slot = find_slot(&items, &restore.item, restore.item.kind().comparator());
					items.insert(slot, restore.item.clone());
				}
				Ok(CacheData::List(items))
			}
			CacheData::Window(window) if self.windowed => {
				let mut window = window.clone();
				for page in window.pages_mut() {
					page.items.retain(|r| !touched.contains(&r.key()));
				}
				if let Some(layout) = &self.layout {
					window.restore_layout(layout);
				}
				for restore in &self.restored {
					let compare = restore.item.kind().comparator();
					let page = if restore.page < window.pages().len() {
						restore.page
					} else {
						window
							.locate(&restore.item, compare, true)
							.ok_or_else(|| ShapeError::Corrupt("no page to restore into".into()))?
					};
					let items = &mut window.pages_mut()[page].items;
					let slot = find_slot(items, &restore.item, compare);
					items.insert(slot, restore.item.clone());
				}
				Ok(CacheData::Window(window))
			}
			other => Err(ShapeError::Unsupported {
				operation: "undo",
				found: other.shape_name(),
			}),
		}
	}
}
