// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Static-priority dominance scenarios.

#![allow(missing_docs)]

mod common;

use common::{count_of, recording_runtime, run_tids};
use weft_core::{api, EventKind, SchedPolicy};

fn busy(iterations: usize) -> impl FnOnce() + Send + 'static {
    move || {
        for _ in 0..iterations {
            api::work(3);
            api::yield_now();
        }
    }
}

/// With policy=Priority, the highest-priority task monopolizes the
/// processor until it finishes, then the next priority tier, then the
/// lowest. `work(3)` against a budget of 8 (replenished per dispatch)
/// never auto-yields, so ordering comes from the queue discipline alone.
#[test]
fn higher_priority_runs_to_completion_first() {
    let (rt, sink) = recording_runtime(SchedPolicy::Priority);
    let low = rt.spawn("low", 1, busy(6)).as_i64();
    let mid = rt.spawn("mid", 5, busy(6)).as_i64();
    let high = rt.spawn("high", 9, busy(6)).as_i64();
    rt.run();

    let events = sink.snapshot();
    assert_eq!(count_of(&events, EventKind::Qexpire), 0);

    let runs = run_tids(&events);
    let last_high = runs.iter().rposition(|&t| t == high).unwrap();
    let first_mid = runs.iter().position(|&t| t == mid).unwrap();
    let last_mid = runs.iter().rposition(|&t| t == mid).unwrap();
    let first_low = runs.iter().position(|&t| t == low).unwrap();

    assert!(runs[..6].iter().all(|&t| t == high), "high owns the first dispatches");
    assert!(last_high < first_mid, "every high dispatch precedes every mid dispatch");
    assert!(last_mid < first_low, "every mid dispatch precedes every low dispatch");
    assert_eq!(count_of(&events, EventKind::Finish), 3);
}

/// Ties on priority are served FIFO: equal-priority tasks interleave in
/// spawn order, never reordering past each other.
#[test]
fn equal_priorities_keep_fifo_order() {
    let (rt, sink) = recording_runtime(SchedPolicy::Priority);
    let first = rt.spawn("first", 5, busy(3)).as_i64();
    let second = rt.spawn("second", 5, busy(3)).as_i64();
    rt.run();

    let runs = run_tids(&sink.snapshot());
    let expected: Vec<i64> = (0..4).flat_map(|_| [first, second]).collect();
    assert_eq!(runs, expected);
}

/// A higher-priority task spawned mid-run overtakes queued lower-priority
/// work as soon as the loop promotes it to READY.
#[test]
fn late_high_priority_task_overtakes_queued_work() {
    let (rt, sink) = recording_runtime(SchedPolicy::Priority);
    let plodder = rt.spawn("plodder", 2, busy(8)).as_i64();
    let handle = rt.clone();
    let spawner = rt
        .spawn("spawner", 2, move || {
            handle.spawn("vip", 9, busy(2));
            api::yield_now();
        })
        .as_i64();
    rt.run();

    let runs = run_tids(&sink.snapshot());
    let vip = spawner + 1; // tids are sequential
    let vip_first = runs.iter().position(|&t| t == vip).unwrap();
    let vip_last = runs.iter().rposition(|&t| t == vip).unwrap();

    assert!(
        runs[vip_first..=vip_last].iter().all(|&t| t == vip),
        "once READY, the high-priority task runs uninterrupted: {runs:?}"
    );
    let spawner_first = runs.iter().position(|&t| t == spawner).unwrap();
    assert!(spawner_first < vip_first, "vip exists only after its spawner ran");
    assert!(
        runs[vip_last..].contains(&plodder),
        "lower-priority work resumes after the vip finishes"
    );
}
