use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

use super::*;

fn at(minute: i64) -> DateTime<Utc> {
	Utc.with_ymd_and_hms(2024, 1, 7, 16, 0, 0).unwrap() + TimeDelta::minutes(minute)
}

/// Run `id` at position `id`, ten minutes of play plus five of setup.
fn run(id: i64, event: i64) -> Run {
	let start = at((id - 1) * 15);
	Run {
		id,
		event,
		name: format!("run {id}"),
		display_name: String::new(),
		order: Some(id),
		starttime: Some(start),
		endtime: Some(start + TimeDelta::minutes(15)),
		anchor_time: None,
		run_time: TimeDelta::minutes(10),
		setup_time: TimeDelta::minutes(5),
	}
}

fn schedule(count: i64) -> Vec<Run> {
	(1..=count).map(|id| run(id, 1)).collect()
}

fn anchored(mut runs: Vec<Run>, id: i64) -> Vec<Run> {
	let run = runs.iter_mut().find(|r| r.id == id).unwrap();
	run.anchor_time = run.starttime;
	runs
}

fn find(changed: &[Run], id: i64) -> &Run {
	changed.iter().find(|r| r.id == id).unwrap()
}

fn ids(changed: &[Run]) -> Vec<i64> {
	changed.iter().map(|r| r.id).collect()
}

#[test]
fn longer_run_pushes_tail_until_anchor() {
	let runs = anchored(schedule(7), 6);
	let mut updated = runs[2].clone();
	updated.run_time = TimeDelta::minutes(15);

	let changed = cascade(&runs, &runs[2], &updated);

	assert_eq!(ids(&changed), vec![3, 4, 5]);
	assert_eq!(find(&changed, 3).endtime, Some(at(50)));
	assert_eq!(find(&changed, 4).starttime, Some(at(50)));
	assert_eq!(find(&changed, 5).starttime, Some(at(65)));
	assert_eq!(find(&changed, 5).setup_time, TimeDelta::zero());
	assert_eq!(find(&changed, 5).endtime, Some(at(75)));
}

#[test]
fn unanchored_tail_shifts_by_exactly_the_delta() {
	let runs = schedule(6);
	let mut updated = runs[1].clone();
	updated.setup_time = TimeDelta::minutes(12);

	let changed = cascade(&runs, &runs[1], &updated);

	assert_eq!(ids(&changed), vec![2, 3, 4, 5, 6]);
	for shifted in &changed[1..] {
		let original = &runs[(shifted.id - 1) as usize];
		assert_eq!(shifted.starttime.unwrap() - original.starttime.unwrap(), TimeDelta::minutes(7));
		assert_eq!(shifted.span(), original.span());
	}
}

#[test]
fn shorter_run_widens_setup_before_anchor() {
	let runs = anchored(schedule(5), 4);
	let mut updated = runs[1].clone();
	updated.run_time = TimeDelta::minutes(4);

	let changed = cascade(&runs, &runs[1], &updated);

	assert_eq!(ids(&changed), vec![2, 3]);
	assert_eq!(find(&changed, 3).starttime, Some(at(24)));
	assert_eq!(find(&changed, 3).setup_time, TimeDelta::minutes(11));
	assert_eq!(find(&changed, 3).endtime, Some(at(45)));
}

#[test]
fn overlapping_anchor_clamps_setup_to_zero() {
	let runs = anchored(schedule(6), 6);
	let mut updated = runs[3].clone();
	updated.run_time = TimeDelta::minutes(20);

	let changed = cascade(&runs, &runs[3], &updated);

	let squeezed = find(&changed, 5);
	assert_eq!(squeezed.starttime, Some(at(70)));
	assert_eq!(squeezed.setup_time, TimeDelta::zero());
	assert_eq!(squeezed.endtime, Some(at(80)));
}

#[test]
fn unchanged_span_touches_only_the_edited_run() {
	let runs = schedule(3);
	let mut updated = runs[0].clone();
	updated.name = "renamed".into();

	assert_eq!(cascade(&runs, &runs[0], &updated), vec![updated]);
}

#[test]
fn moving_an_anchor_shifts_tail_and_refits_predecessor() {
	let runs = schedule(4);
	let mut updated = runs[2].clone();
	updated.anchor_time = Some(at(40));

	let changed = cascade(&runs, &runs[2], &updated);

	assert_eq!(ids(&changed), vec![2, 3, 4]);
	assert_eq!(find(&changed, 2).setup_time, TimeDelta::minutes(15));
	assert_eq!(find(&changed, 3).starttime, Some(at(40)));
	assert_eq!(find(&changed, 4).starttime, Some(at(55)));
}

#[test]
fn cascade_stays_within_the_event() {
	let mut runs = schedule(3);
	runs.push(run(4, 2));
	let mut updated = runs[0].clone();
	updated.run_time = TimeDelta::minutes(11);

	assert_eq!(ids(&cascade(&runs, &runs[0], &updated)), vec![1, 2, 3]);
}

#[test]
fn moving_up_shifts_the_runs_in_between_down() {
	let runs = schedule(4);

	let changed = move_run(&runs, 4, Some(2));

	assert_eq!(ids(&changed), vec![4, 2, 3]);
	assert_eq!(find(&changed, 4).order, Some(2));
	assert_eq!(find(&changed, 2).order, Some(3));
	assert_eq!(find(&changed, 3).order, Some(4));
	assert_eq!(find(&changed, 4).starttime, Some(at(15)));
	assert_eq!(find(&changed, 2).starttime, Some(at(30)));
	assert_eq!(find(&changed, 3).starttime, Some(at(45)));
}

#[test]
fn moving_down_shifts_the_runs_in_between_up() {
	let runs = schedule(4);

	let changed = move_run(&runs, 1, Some(3));

	assert_eq!(ids(&changed), vec![2, 3, 1]);
	assert_eq!(find(&changed, 2).order, Some(1));
	assert_eq!(find(&changed, 2).starttime, Some(at(0)));
	assert_eq!(find(&changed, 1).starttime, Some(at(30)));
}

#[test]
fn unscheduling_pulls_the_tail_forward() {
	let runs = schedule(4);

	let changed = move_run(&runs, 2, None);

	assert_eq!(ids(&changed), vec![3, 4, 2]);
	assert_eq!(find(&changed, 3).order, Some(2));
	assert_eq!(find(&changed, 3).starttime, Some(at(15)));
	assert_eq!(find(&changed, 4).order, Some(3));
	let removed = find(&changed, 2);
	assert_eq!((removed.order, removed.starttime, removed.endtime), (None, None, None));
}

#[test]
fn scheduling_inserts_and_shifts_the_tail() {
	let mut runs = schedule(3);
	let mut extra = run(9, 1);
	extra.order = None;
	extra.starttime = None;
	extra.endtime = None;
	runs.push(extra);

	let changed = move_run(&runs, 9, Some(2));

	assert_eq!(ids(&changed), vec![9, 2, 3]);
	assert_eq!(find(&changed, 9).starttime, Some(at(15)));
	assert_eq!(find(&changed, 2).order, Some(3));
	assert_eq!(find(&changed, 3).starttime, Some(at(45)));
}

#[test]
fn moves_respect_anchors() {
	let runs = anchored(schedule(4), 4);

	let changed = move_run(&runs, 3, Some(2));

	assert_eq!(find(&changed, 3).starttime, Some(at(15)));
	assert_eq!(find(&changed, 2).starttime, Some(at(30)));
	assert_eq!(find(&changed, 2).setup_time, TimeDelta::minutes(5));
	assert!(changed.iter().all(|r| r.id != 4));
}

#[test]
fn same_position_is_a_no_op() {
	assert!(move_run(&schedule(3), 2, Some(2)).is_empty());
	assert!(move_run(&schedule(3), 42, Some(1)).is_empty());
}
