//! Cached values and identity-based reconciliation.

use std::cmp::Ordering;
use std::collections::HashSet;

use serde_json::Value;
use tracker_model::{Comparator, Resource, ResourceKey};

use crate::error::ShapeError;
use crate::locator::{find_slot, fits_page};
use crate::page::Window;

/// The value stored under one query key.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheData {
	/// One resource, e.g. a detail query.
	Single(Resource),
	/// A flat, sorted result of a single fetch.
	List(Vec<Resource>),
	/// Sorted pages of a paginated query.
	Window(Window),
	/// A payload with no resource shape; only replaced wholesale.
	Raw(Value),
}

/// Outcome of [`CacheData::reconcile`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciled {
	Replaced,
	Removed,
	Inserted,
	Unchanged,
}

impl CacheData {
	pub fn shape_name(&self) -> &'static str {
		match self {
			Self::Single(_) => "single",
			Self::List(_) => "list",
			Self::Window(_) => "window",
			Self::Raw(_) => "raw",
		}
	}

	/// All resources in order; empty for raw payloads.
	pub fn iter(&self) -> Box<dyn Iterator<Item = &Resource> + '_> {
		match self {
			Self::Single(r) => Box::new(std::iter::once(r)),
			Self::List(items) => Box::new(items.iter()),
			Self::Window(window) => Box::new(window.items()),
			Self::Raw(_) => Box::new(std::iter::empty()),
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Self::Single(_) => 1,
			Self::List(items) => items.len(),
			Self::Window(window) => window.len(),
			Self::Raw(_) => 0,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// `(page, slot)` of the resource with `key`. Lists and singles use page 0.
	pub fn position(&self, key: &ResourceKey) -> Option<(usize, usize)> {
		match self {
			Self::Single(r) => (r.key() == *key).then_some((0, 0)),
			Self::List(items) => items.iter().position(|r| r.key() == *key).map(|slot| (0, slot)),
			Self::Window(window) => window.pages().iter().enumerate().find_map(|(page, p)| {
				p.items.iter().position(|r| r.key() == *key).map(|slot| (page, slot))
			}),
			Self::Raw(_) => None,
		}
	}

	pub fn get(&self, key: &ResourceKey) -> Option<&Resource> {
		self.iter().find(|r| r.key() == *key)
	}

	pub fn contains(&self, key: &ResourceKey) -> bool {
		self.position(key).is_some()
	}

	/// Brings the cached copy of `resource` in line with its new state.
	///
	/// `matches` tells whether the new state satisfies the entry's query
	/// predicate. Together with whether the resource is already present it
	/// selects the action:
	///
	/// | found | matches | action  |
	/// |-------|---------|---------|
	/// | yes   | yes     | replace |
	/// | yes   | no      | remove  |
	/// | no    | yes     | insert  |
	/// | no    | no      | nothing |
	///
	/// Replacement is delete-then-insert at the sorted slot, so applying the
	/// same state twice leaves the second application without effect.
	pub fn reconcile(&mut self, resource: Resource, matches: bool, compare: Comparator) -> Result<Reconciled, ShapeError> {
		self.check_kind(&resource)?;
		let key = resource.key();
		let found = self.position(&key);

		match (found, matches) {
			(Some(position), true) => self.replace_at(position, resource, compare),
			(Some(position), false) => {
				self.remove_at(position)?;
				Ok(Reconciled::Removed)
			}
			(None, true) => {
				if matches!(self, Self::Single(_)) {
					return Ok(Reconciled::Unchanged);
				}
				self.insert(resource, compare)?;
				Ok(Reconciled::Inserted)
			}
			(None, false) => Ok(Reconciled::Unchanged),
		}
	}

	/// Replaces the cached copy of `resource` if present, relocating it when
	/// its sort position changed. Returns whether it was present.
	pub fn replace(&mut self, resource: Resource, compare: Comparator) -> Result<bool, ShapeError> {
		self.check_kind(&resource)?;
		match self.position(&resource.key()) {
			Some(position) => self.replace_at(position, resource, compare).map(|_| true),
			None => Ok(false),
		}
	}

	/// Applies `f` to a copy of the resource with `key` and stores the result
	/// with [`Self::replace`]. Returns whether the resource was present.
	pub fn update(&mut self, key: &ResourceKey, compare: Comparator, f: impl FnOnce(&mut Resource)) -> Result<bool, ShapeError> {
		let Some(current) = self.get(key) else {
			return Ok(false);
		};
		let mut next = current.clone();
		f(&mut next);
		self.replace(next, compare)
	}

	/// Inserts a resource known to be absent at its sorted position.
	pub fn insert(&mut self, resource: Resource, compare: Comparator) -> Result<(), ShapeError> {
		match self {
			Self::List(items) => {
				let slot = find_slot(items, &resource, compare);
				items.insert(slot, resource);
				Ok(())
			}
			Self::Window(window) => {
				let page = window
					.locate(&resource, compare, true)
					.ok_or_else(|| ShapeError::Corrupt("no page accepts the item".into()))?;
				let items = &mut window.pages_mut()[page].items;
				let slot = find_slot(items, &resource, compare);
				items.insert(slot, resource);
				window.adjust_count(1);
				Ok(())
			}
			other => Err(ShapeError::Unsupported {
				operation: "insert",
				found: other.shape_name(),
			}),
		}
	}

	/// Removes the resource with `key`, returning it if it was present.
	pub fn remove(&mut self, key: &ResourceKey) -> Result<Option<Resource>, ShapeError> {
		if let Self::Raw(_) = self {
			return Err(ShapeError::Unsupported {
				operation: "remove",
				found: "raw",
			});
		}
		match self.position(key) {
			Some(position) => self.remove_at(position).map(Some),
			None => Ok(None),
		}
	}

	/// Checks the ordering and uniqueness invariants.
	pub fn validate(&self, compare: Comparator) -> Result<(), ShapeError> {
		let mut seen = HashSet::new();
		let mut prev: Option<&Resource> = None;
		for item in self.iter() {
			if !seen.insert(item.key()) {
				return Err(ShapeError::Corrupt(format!("duplicate {}", item.key())));
			}
			if let Some(prev) = prev
				&& compare(prev, item) != Ordering::Less
			{
				return Err(ShapeError::Corrupt(format!("{} sorts before {}", item.key(), prev.key())));
			}
			prev = Some(item);
		}
		Ok(())
	}

	fn check_kind(&self, resource: &Resource) -> Result<(), ShapeError> {
		if let Self::Raw(_) = self {
			return Err(ShapeError::Unsupported {
				operation: "reconcile",
				found: "raw",
			});
		}
		match self.iter().next() {
			Some(existing) if existing.kind() != resource.kind() && !matches!(self, Self::Single(_)) => {
				Err(ShapeError::KindMismatch {
					expected: resource.kind().as_str(),
					found: existing.kind().as_str(),
				})
			}
			_ => Ok(()),
		}
	}

	fn replace_at(&mut self, (page, slot): (usize, usize), resource: Resource, compare: Comparator) -> Result<Reconciled, ShapeError> {
		match self {
			Self::Single(current) => {
				if *current == resource {
					return Ok(Reconciled::Unchanged);
				}
				*current = resource;
				Ok(Reconciled::Replaced)
			}
			Self::List(items) => {
				if items[slot] == resource {
					return Ok(Reconciled::Unchanged);
				}
				items.remove(slot);
				let slot = find_slot(items, &resource, compare);
				items.insert(slot, resource);
				Ok(Reconciled::Replaced)
			}
			Self::Window(window) => {
				if window.pages()[page].items[slot] == resource {
					return Ok(Reconciled::Unchanged);
				}
				window.pages_mut()[page].items.remove(slot);
				let target = if fits_page(window.pages(), page, &resource, compare) {
					page
				} else {
					window
						.locate(&resource, compare, true)
						.ok_or_else(|| ShapeError::Corrupt("no page accepts the item".into()))?
				};
				let items = &mut window.pages_mut()[target].items;
				let slot = find_slot(items, &resource, compare);
				items.insert(slot, resource);
				Ok(Reconciled::Replaced)
			}
			Self::Raw(_) => Err(ShapeError::Unsupported {
				operation: "replace",
				found: "raw",
			}),
		}
	}

	fn remove_at(&mut self, (page, slot): (usize, usize)) -> Result<Resource, ShapeError> {
		match self {
			Self::List(items) => Ok(items.remove(slot)),
			Self::Window(window) => {
				let removed = window.pages_mut()[page].items.remove(slot);
				window.adjust_count(-1);
				Ok(removed)
			}
			other => Err(ShapeError::Unsupported {
				operation: "remove",
				found: other.shape_name(),
			}),
		}
	}
}
