// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! MLFQ aging under wall-clock time. The deterministic aging discipline is
//! unit-tested against a fake clock inside the scheduler; these are the
//! end-to-end smoke checks.

#![allow(missing_docs)]

mod common;

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::count_of;
use weft_core::{api, EventKind, EventSink, MemoryEventSink, MlfqConfig, Runtime, SchedPolicy};

/// A task demoted off the top level and then starved by a busy top-level
/// sibling is eventually promoted by aging, with an `age` event naming it.
#[test]
fn starved_task_is_promoted_by_aging() {
    let sink = Arc::new(MemoryEventSink::new());
    let rt = Runtime::builder()
        .policy(SchedPolicy::Mlfq)
        .mlfq_config(MlfqConfig {
            aging_interval_ms: 100,
            ..MlfqConfig::default()
        })
        .event_sink(Arc::clone(&sink) as Arc<dyn EventSink>)
        .build();

    let parked = rt
        .spawn("parked", 1, || {
            api::work(8); // burn the whole top-level quantum: demoted off the top
            api::work(4); // runs again only once the busy sibling lets go
        })
        .as_i64();
    rt.spawn("busy", 1, || {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(250) {
            api::work(1);
            api::yield_now();
        }
    });
    rt.run();

    let events = sink.snapshot();
    let ages: Vec<&weft_core::Event> =
        events.iter().filter(|e| e.kind == EventKind::Age).collect();
    assert!(
        ages.iter().any(|e| e.tid == parked),
        "expected an age promotion for the parked task, got {ages:?}"
    );
    assert!(ages.iter().all(|e| e.info == "promote"));
    assert_eq!(count_of(&events, EventKind::Finish), 2);
}

/// With aging disabled the same starvation pattern produces no `age`
/// events at all.
#[test]
fn disabled_aging_emits_no_age_events() {
    let sink = Arc::new(MemoryEventSink::new());
    let rt = Runtime::builder()
        .policy(SchedPolicy::Mlfq)
        .mlfq_config(MlfqConfig {
            enable_aging: false,
            aging_interval_ms: 1,
            ..MlfqConfig::default()
        })
        .event_sink(Arc::clone(&sink) as Arc<dyn EventSink>)
        .build();

    rt.spawn("parked", 1, || {
        api::work(8);
    });
    rt.spawn("busy", 1, || {
        let start = Instant::now();
        while start.elapsed() < Duration::from_millis(30) {
            api::work(1);
            api::yield_now();
        }
    });
    rt.run();

    assert_eq!(count_of(&sink.snapshot(), EventKind::Age), 0);
}
