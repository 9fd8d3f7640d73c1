//! Schedule cascades.
//!
//! Runs of one event form a timeline ordered by `order`: each run starts when
//! its predecessor's run and setup time are over. Changing a run's span or
//! anchor shifts everything after it up to the next anchored run, whose
//! predecessor absorbs the difference in its setup time.

use chrono::{DateTime, TimeDelta, Utc};
use tracing::{debug, warn};
use tracker_model::Run;

/// Runs to rewrite after `previous` was edited into `updated`.
///
/// `runs` is the cached schedule the edit happened in; `updated` is always part
/// of the result. Runs of other events are never touched.
pub fn cascade(runs: &[Run], previous: &Run, updated: &Run) -> Vec<Run> {
	let mut edited = updated.clone();
	let mut delta = updated.span() - previous.span();
	let mut changed = Vec::new();

	if let Some(anchor) = updated.anchor_time
		&& updated.anchor_time != previous.anchor_time
	{
		if let Some(start) = previous.starttime {
			delta += anchor - start;
		}
		edited.starttime = Some(anchor);
		if let Some(mut predecessor) = predecessor_of(runs, &edited) {
			absorb(&mut predecessor, anchor);
			changed.push(predecessor);
		}
	}
	edited.recompute_end();
	changed.push(edited.clone());

	if delta.is_zero() {
		return changed;
	}
	let Some(order) = edited.order else {
		return changed;
	};

	debug!(run = edited.id, delta_secs = delta.num_seconds(), "schedule cascade");
	let mut tail = scheduled(runs, edited.event);
	tail.retain(|r| r.order.is_some_and(|o| o > order) && r.id != edited.id);

	for run in tail {
		if let Some(anchor) = run.anchor_time {
			if let Some(last) = changed.last_mut() {
				absorb(last, anchor);
			}
			break;
		}
		let mut shifted = run;
		shifted.shift(delta);
		changed.push(shifted);
	}
	changed
}

/// Runs to rewrite when run `id` moves to `order`; `None` unschedules it.
///
/// Runs between the old and new position shift by one. Runs entering or
/// leaving the schedule shift the whole tail. Start times are then recomputed
/// from the first affected position.
pub fn move_run(runs: &[Run], id: i64, order: Option<i64>) -> Vec<Run> {
	let Some(moving) = runs.iter().find(|r| r.id == id) else {
		return Vec::new();
	};
	let from = moving.order;
	if from == order {
		return Vec::new();
	}

	let originals = scheduled(runs, moving.event);
	let mut timeline: Vec<Run> = originals.iter().filter(|r| r.id != id).cloned().collect();
	for run in &mut timeline {
		let Some(current) = run.order else { continue };
		run.order = Some(current + reindex(from, order, current));
	}

	let mut moved = moving.clone();
	moved.order = order;
	let first = match (from, order) {
		(Some(a), Some(b)) => a.min(b),
		(Some(a), None) => a,
		(None, Some(b)) => b,
		(None, None) => return Vec::new(),
	};
	if order.is_some() {
		timeline.push(moved.clone());
	} else {
		moved.starttime = None;
		moved.endtime = None;
	}
	timeline.sort_by_key(|r| r.order);

	let clock = start_of_position(&originals, first);
	retime(&mut timeline, first, clock);

	let mut changed: Vec<Run> = timeline
		.into_iter()
		.filter(|run| originals.iter().find(|o| o.id == run.id) != Some(run))
		.collect();
	if order.is_none() {
		changed.push(moved);
	}
	changed
}

/// Order offset of a run at `current` when another run moves `from` → `to`.
fn reindex(from: Option<i64>, to: Option<i64>, current: i64) -> i64 {
	match (from, to) {
		(Some(from), Some(to)) if from < to && (from + 1..=to).contains(&current) => -1,
		(Some(from), Some(to)) if to < from && (to..from).contains(&current) => 1,
		(Some(from), None) if current > from => -1,
		(None, Some(to)) if current >= to => 1,
		_ => 0,
	}
}

/// Where the timeline resumes at position `first`: the end of the run before
/// it, or the earliest start among the runs being reshuffled.
fn start_of_position(originals: &[Run], first: i64) -> Option<DateTime<Utc>> {
	let before = originals.iter().rev().find(|r| r.order.is_some_and(|o| o < first));
	if let Some(before) = before {
		return before.starttime.map(|t| t + before.span());
	}
	originals
		.iter()
		.filter(|r| r.order.is_some_and(|o| o >= first))
		.filter_map(|r| r.starttime)
		.min()
}

/// Lays runs at or after `first` end to end from `clock`, honouring anchors.
fn retime(timeline: &mut [Run], first: i64, clock: Option<DateTime<Utc>>) {
	let Some(mut clock) = clock else {
		return;
	};
	let Some(begin) = timeline.iter().position(|r| r.order.is_some_and(|o| o >= first)) else {
		return;
	};
	for index in begin..timeline.len() {
		if let Some(anchor) = timeline[index].anchor_time {
			if index > begin {
				absorb(&mut timeline[index - 1], anchor);
			}
			clock = anchor;
		}
		let run = &mut timeline[index];
		run.place_at(clock);
		clock += run.span();
	}
}

/// Stretches or shrinks `run`'s setup so it ends exactly at `anchor`.
///
/// A setup that would go negative is clamped to zero; the server reports the
/// resulting overlap on the next fetch.
fn absorb(run: &mut Run, anchor: DateTime<Utc>) {
	let Some(start) = run.starttime else {
		return;
	};
	let setup = anchor - start - run.run_time;
	if setup < TimeDelta::zero() {
		warn!(run = run.id, overlap_secs = -setup.num_seconds(), "anchor overlaps predecessor, clamping setup to zero");
		run.setup_time = TimeDelta::zero();
	} else {
		run.setup_time = setup;
	}
	run.recompute_end();
}

fn predecessor_of(runs: &[Run], run: &Run) -> Option<Run> {
	let order = run.order?;
	scheduled(runs, run.event)
		.into_iter()
		.rev()
		.find(|r| r.id != run.id && r.order.is_some_and(|o| o < order))
}

/// Scheduled runs of `event` in schedule order.
fn scheduled(runs: &[Run], event: i64) -> Vec<Run> {
	let mut runs: Vec<Run> = runs.iter().filter(|r| r.event == event && r.is_scheduled()).cloned().collect();
	runs.sort_by(tracker_model::order::runs);
	runs
}

#[cfg(test)]
mod tests;
