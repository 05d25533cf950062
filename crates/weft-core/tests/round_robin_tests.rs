// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Round-robin dispatch order scenarios.

#![allow(missing_docs)]

mod common;

use common::{count_of, recording_runtime, run_tids};
use weft_core::{api, EventKind, SchedPolicy};

/// Two CPU-bound tasks alternating `{work(2); yield}` interleave strictly
/// A,B,A,B,… and both finish. The budget (8, replenished on every
/// dispatch) is never exhausted by `work(2)`, so no `qexpire` fires.
#[test]
fn two_yielding_tasks_interleave_strictly() {
    let (rt, sink) = recording_runtime(SchedPolicy::RoundRobin);
    let a = rt.spawn("A", 1, || {
        for _ in 0..5 {
            api::work(2);
            api::yield_now();
        }
    });
    let b = rt.spawn("B", 1, || {
        for _ in 0..5 {
            api::work(2);
            api::yield_now();
        }
    });
    rt.run();

    let events = sink.snapshot();
    let runs = run_tids(&events);

    // The first ten dispatches alternate A,B exactly.
    let expected: Vec<i64> = (0..5).flat_map(|_| [a.as_i64(), b.as_i64()]).collect();
    assert_eq!(&runs[..10], &expected[..]);

    // Alternation holds over the whole schedule, including the final
    // dispatches that let each work item return.
    for pair in runs.windows(2) {
        assert_ne!(pair[0], pair[1], "round-robin never runs a task twice in a row here");
    }

    assert_eq!(count_of(&events, EventKind::Qexpire), 0);
    assert_eq!(count_of(&events, EventKind::Finish), 2);
}

/// No task is starved: K equal-length tasks produce a perfectly cyclic
/// schedule, so every window of K dispatches runs each task exactly once.
#[test]
fn no_task_is_starved_across_dispatch_windows() {
    let (rt, sink) = recording_runtime(SchedPolicy::RoundRobin);
    let tids: Vec<i64> = (0..4)
        .map(|i| {
            rt.spawn(format!("t{i}"), 1, || {
                for _ in 0..6 {
                    api::work(1);
                    api::yield_now();
                }
            })
            .as_i64()
        })
        .collect();
    rt.run();

    // 6 yields per task plus the final resume: 7 full cycles of t0..t3.
    let runs = run_tids(&sink.snapshot());
    let expected: Vec<i64> = (0..7).flat_map(|_| tids.clone()).collect();
    assert_eq!(runs, expected);
}

/// A task that only works and never yields explicitly is still forced off
/// by quantum expiry, so its sibling gets dispatched.
#[test]
fn quantum_expiry_forces_interleave_without_explicit_yields() {
    let (rt, sink) = recording_runtime(SchedPolicy::RoundRobin);
    let hog = rt.spawn("hog", 1, || {
        for _ in 0..4 {
            api::work(8); // exactly one budget per dispatch
        }
    });
    let other = rt.spawn("other", 1, || {
        api::work(1);
    });
    rt.run();

    let events = sink.snapshot();
    let runs = run_tids(&events);
    assert!(count_of(&events, EventKind::Qexpire) >= 3);
    let hog_first = runs.iter().position(|&t| t == hog.as_i64());
    let other_pos = runs.iter().position(|&t| t == other.as_i64());
    let hog_last = runs.iter().rposition(|&t| t == hog.as_i64());
    let (Some(first), Some(mid), Some(last)) = (hog_first, other_pos, hog_last) else {
        panic!("both tasks must run");
    };
    assert!(first < mid && mid < last, "the sibling ran between hog dispatches");
}
