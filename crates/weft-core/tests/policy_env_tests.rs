// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! `SCHED` environment-variable handling at `run()`.
//!
//! Kept to a single test function: the variable is process-global, and one
//! sequential body avoids cross-test interference inside this binary.

#![allow(missing_docs)]

mod common;

use common::recording_runtime;
use weft_core::{EventKind, SchedPolicy};

#[test]
fn sched_env_overrides_only_when_recognized() {
    // Recognized value overrides the explicit setter.
    std::env::set_var("SCHED", "mlfq");
    let (rt, sink) = recording_runtime(SchedPolicy::RoundRobin);
    rt.run();
    let boot = sink
        .snapshot()
        .into_iter()
        .find(|e| e.kind == EventKind::Boot)
        .unwrap();
    assert_eq!(boot.info, "mlfq");
    assert_eq!(rt.policy(), SchedPolicy::Mlfq);

    // The long alias works too.
    std::env::set_var("SCHED", "priority");
    let (rt, sink) = recording_runtime(SchedPolicy::RoundRobin);
    rt.run();
    let boot = sink
        .snapshot()
        .into_iter()
        .find(|e| e.kind == EventKind::Boot)
        .unwrap();
    assert_eq!(boot.info, "prio");

    // Unknown values leave the explicit setting in place.
    std::env::set_var("SCHED", "lottery");
    let (rt, sink) = recording_runtime(SchedPolicy::Priority);
    rt.run();
    let boot = sink
        .snapshot()
        .into_iter()
        .find(|e| e.kind == EventKind::Boot)
        .unwrap();
    assert_eq!(boot.info, "prio");

    // Unset keeps the explicit setting as well.
    std::env::remove_var("SCHED");
    let (rt, sink) = recording_runtime(SchedPolicy::Mlfq);
    rt.run();
    let boot = sink
        .snapshot()
        .into_iter()
        .find(|e| e.kind == EventKind::Boot)
        .unwrap();
    assert_eq!(boot.info, "mlfq");
}
