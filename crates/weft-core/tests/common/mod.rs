// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(dead_code)]

use std::sync::Arc;

use weft_core::{Event, EventKind, EventSink, MemoryEventSink, Runtime, SchedPolicy};

/// A runtime wired to an in-memory event sink, for asserting on the stream.
pub fn recording_runtime(policy: SchedPolicy) -> (Runtime, Arc<MemoryEventSink>) {
    let sink = Arc::new(MemoryEventSink::new());
    let rt = Runtime::builder()
        .policy(policy)
        .event_sink(Arc::clone(&sink) as Arc<dyn EventSink>)
        .build();
    (rt, sink)
}

/// Tids of `run` events, in emission order.
pub fn run_tids(events: &[Event]) -> Vec<i64> {
    tids_of(events, EventKind::Run)
}

/// Tids of all events of `kind`, in emission order.
pub fn tids_of(events: &[Event], kind: EventKind) -> Vec<i64> {
    events
        .iter()
        .filter(|e| e.kind == kind)
        .map(|e| e.tid)
        .collect()
}

/// Number of events of `kind`.
pub fn count_of(events: &[Event], kind: EventKind) -> usize {
    events.iter().filter(|e| e.kind == kind).count()
}

/// Index of the first event matching `kind` and `tid`.
pub fn index_of(events: &[Event], kind: EventKind, tid: i64) -> Option<usize> {
    events.iter().position(|e| e.kind == kind && e.tid == tid)
}

/// Index of the first event matching `kind` and `tid` at or after `from`.
pub fn index_of_from(events: &[Event], kind: EventKind, tid: i64, from: usize) -> Option<usize> {
    events[from..]
        .iter()
        .position(|e| e.kind == kind && e.tid == tid)
        .map(|i| i + from)
}
