//! Page and slot placement for sorted windows.
//!
//! Only a window of a server collection is loaded, so a resource that appears
//! or moves locally has to be placed without knowing the unloaded neighbours.
//! The rules, per page in order:
//! 1. the first page is unbounded below;
//! 2. a page claims the gap between the previous page's last item and its own
//!    first item, and its own `[first, last]` range;
//! 3. the last page claims everything past its last item, even when the
//!    server reported a next page; the item is moved behind that page once it
//!    is fetched (see [`crate::Window::insert_fetched`]).
//!
//! Only an empty window leaves a candidate unclaimed; it then gets a freshly
//! appended page.

use std::cmp::Ordering;

use tracker_model::{Comparator, Resource};

use crate::page::Page;

/// Index of the page `candidate` belongs to.
///
/// When no page claims the candidate and `create_if_missing` is set, appends an
/// empty page and returns its index.
pub fn locate_page(
	pages: &mut Vec<Page>,
	candidate: &Resource,
	compare: Comparator,
	create_if_missing: bool,
) -> Option<usize> {
	let found = claiming_page(pages, candidate, compare);
	if found.is_some() || !create_if_missing {
		return found;
	}

	let count = pages.first().map_or(0, |p| p.count);
	pages.push(Page {
		count,
		has_previous: !pages.is_empty(),
		has_next: false,
		items: Vec::new(),
	});
	Some(pages.len() - 1)
}

fn claiming_page(pages: &[Page], candidate: &Resource, compare: Comparator) -> Option<usize> {
	let last_index = pages.len().checked_sub(1)?;
	let mut prev_last: Option<&Resource> = None;

	for (index, page) in pages.iter().enumerate() {
		let is_last = index == last_index;
		let (Some(first), Some(last)) = (page.items.first(), page.items.last()) else {
			if is_last {
				return Some(index);
			}
			continue;
		};

		let above_prev = prev_last.is_none_or(|p| compare(p, candidate) == Ordering::Less);
		let before_first = compare(candidate, first) == Ordering::Less;
		if above_prev && before_first {
			return Some(index);
		}

		let within = !before_first && compare(candidate, last) != Ordering::Greater;
		if within {
			return Some(index);
		}

		if is_last {
			return Some(index);
		}
		prev_last = Some(last);
	}

	None
}

/// Index of the first item not less than `candidate`.
pub fn find_slot(items: &[Resource], candidate: &Resource, compare: Comparator) -> usize {
	items.partition_point(|item| compare(item, candidate) == Ordering::Less)
}

/// Whether `candidate` can stay on page `index` without breaking the order
/// against the neighbouring pages.
pub(crate) fn fits_page(pages: &[Page], index: usize, candidate: &Resource, compare: Comparator) -> bool {
	let lower = pages[..index].iter().rev().find_map(|p| p.items.last());
	let upper = pages[index + 1..].iter().find_map(|p| p.items.first());
	let above = lower.is_none_or(|l| compare(l, candidate) == Ordering::Less);
	let below = match upper {
		Some(u) => compare(candidate, u) == Ordering::Less,
		None => index + 1 == pages.len() || pages[index].items.last().is_none_or(|l| compare(candidate, l) != Ordering::Greater),
	};
	above && below
}
