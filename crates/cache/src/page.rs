//! Pages and windows of paginated collections.

use std::cmp::Ordering;
use std::collections::HashSet;

use tracker_model::{Comparator, Resource};

use crate::locator;

/// One fetched slice of a paginated server collection.
///
/// `count` is the size of the whole server-side collection, not of `items`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
	pub count: u64,
	pub has_previous: bool,
	pub has_next: bool,
	pub items: Vec<Resource>,
}

impl Page {
	pub fn new(items: Vec<Resource>) -> Self {
		Self {
			count: items.len() as u64,
			has_previous: false,
			has_next: false,
			items,
		}
	}

	pub(crate) fn meta(&self) -> PageMeta {
		PageMeta {
			count: self.count,
			has_previous: self.has_previous,
			has_next: self.has_next,
		}
	}

	pub(crate) fn set_meta(&mut self, meta: PageMeta) {
		self.count = meta.count;
		self.has_previous = meta.has_previous;
		self.has_next = meta.has_next;
	}
}

/// Page metadata without items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PageMeta {
	pub count: u64,
	pub has_previous: bool,
	pub has_next: bool,
}

/// The pages of a windowed query fetched so far.
///
/// `params` runs parallel to `pages`: the page parameter each page was fetched
/// with, or `None` for a trailing page synthesized locally to hold an item that
/// sorts past the loaded window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Window {
	pages: Vec<Page>,
	params: Vec<Option<u32>>,
}

impl Window {
	pub fn new() -> Self {
		Self::default()
	}

	/// A window holding a single fetched page.
	pub fn from_page(param: u32, page: Page) -> Self {
		Self {
			pages: vec![page],
			params: vec![Some(param)],
		}
	}

	pub fn pages(&self) -> &[Page] {
		&self.pages
	}

	pub fn params(&self) -> &[Option<u32>] {
		&self.params
	}

	/// Slot of the page fetched with `param`.
	pub fn page_index(&self, param: u32) -> Option<usize> {
		self.params.iter().position(|p| *p == Some(param))
	}

	/// Highest page parameter fetched so far.
	pub fn last_param(&self) -> Option<u32> {
		self.params.iter().flatten().copied().max()
	}

	/// Parameter of the next server page, if the server reported one.
	pub fn next_param(&self) -> Option<u32> {
		let last = self.last_param()?;
		let index = self.page_index(last)?;
		self.pages[index].has_next.then_some(last + 1)
	}

	/// Server-side collection size as last reported.
	pub fn count(&self) -> u64 {
		self.pages.first().map_or(0, |p| p.count)
	}

	/// Number of loaded items across all pages.
	pub fn len(&self) -> usize {
		self.pages.iter().map(|p| p.items.len()).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn items(&self) -> impl Iterator<Item = &Resource> {
		self.pages.iter().flat_map(|p| p.items.iter())
	}

	/// Adds or replaces the page fetched with `param`.
	///
	/// Synthesized trailing pages are dropped, and resources already present on
	/// other pages are removed there: the freshly fetched page is authoritative.
	/// Items an earlier page claimed that sort past the fetched page's first
	/// item are placed again, so they end up on or behind it.
	pub fn insert_fetched(&mut self, param: u32, mut page: Page, compare: Comparator) {
		page.items.sort_by(compare);
		self.drop_synthetic();

		let incoming: HashSet<_> = page.items.iter().map(Resource::key).collect();
		let existing = self.page_index(param);
		for (index, other) in self.pages.iter_mut().enumerate() {
			if Some(index) != existing {
				other.items.retain(|item| !incoming.contains(&item.key()));
			}
		}

		let first = page.items.first().cloned();
		let index = match existing {
			Some(index) => {
				self.pages[index] = page;
				index
			}
			None => {
				let at = self.params.iter().position(|p| p.is_some_and(|p| p > param)).unwrap_or(self.pages.len());
				self.pages.insert(at, page);
				self.params.insert(at, Some(param));
				at
			}
		};
		if let Some(first) = first {
			self.replace_overtaken(index, &first, compare);
		}
	}

	/// Moves items on pages before `index` that sort after `first` to where
	/// they now belong.
	fn replace_overtaken(&mut self, index: usize, first: &Resource, compare: Comparator) {
		let mut overtaken = Vec::new();
		for page in &mut self.pages[..index] {
			let (keep, moved): (Vec<Resource>, Vec<Resource>) = std::mem::take(&mut page.items)
				.into_iter()
				.partition(|item| compare(item, first) == Ordering::Less);
			page.items = keep;
			overtaken.extend(moved);
		}
		for item in overtaken {
			if let Some(at) = locator::locate_page(&mut self.pages, &item, compare, true) {
				let slot = locator::find_slot(&self.pages[at].items, &item, compare);
				self.pages[at].items.insert(slot, item);
			}
		}
		self.sync_params();
	}

	/// Finds the page `candidate` belongs to, see [`locator::locate_page`].
	pub fn locate(&mut self, candidate: &Resource, compare: Comparator, create_if_missing: bool) -> Option<usize> {
		let index = locator::locate_page(&mut self.pages, candidate, compare, create_if_missing);
		self.sync_params();
		index
	}

	pub(crate) fn pages_mut(&mut self) -> &mut [Page] {
		&mut self.pages
	}

	/// Adds `delta` to every page's server count, saturating at zero.
	pub(crate) fn adjust_count(&mut self, delta: i64) {
		for page in &mut self.pages {
			page.count = page.count.saturating_add_signed(delta);
		}
	}

	pub(crate) fn layout(&self) -> Vec<(PageMeta, Option<u32>)> {
		self.pages.iter().map(Page::meta).zip(self.params.iter().copied()).collect()
	}

	/// Restores page metadata and page count from a recorded layout.
	///
	/// Items on pages beyond the layout move to the last kept page; they sort
	/// after everything on it.
	pub(crate) fn restore_layout(&mut self, layout: &[(PageMeta, Option<u32>)]) {
		if layout.is_empty() {
			self.pages.clear();
			self.params.clear();
			return;
		}
		if self.pages.len() > layout.len() {
			let spill: Vec<Resource> = self.pages.drain(layout.len()..).flat_map(|p| p.items).collect();
			self.pages[layout.len() - 1].items.extend(spill);
		}
		while self.pages.len() < layout.len() {
			self.pages.push(Page::default());
		}
		self.params.clear();
		for (page, (meta, param)) in self.pages.iter_mut().zip(layout) {
			page.set_meta(*meta);
			self.params.push(*param);
		}
	}

	fn sync_params(&mut self) {
		self.params.resize(self.pages.len(), None);
	}

	fn drop_synthetic(&mut self) {
		while self.params.last().is_some_and(Option::is_none) {
			self.params.pop();
			self.pages.pop();
		}
	}
}
