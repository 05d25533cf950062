// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! weft-core: cooperative green-thread runtime.
//!
//! Multiplexes N user tasks onto the single OS thread that calls
//! [`Runtime::run`], under one of three interchangeable policies:
//! round-robin, static priority, or a multi-level feedback queue with
//! aging. Tasks relinquish the processor only at explicit yield points —
//! [`api::yield_now`], [`api::sleep`], [`api::wait`], and [`api::work`]
//! when its quantum budget expires.
//!
//! # Model
//!
//! - Exactly one task runs at a time; the scheduler executes on its own
//!   context between dispatches. Contexts are OS threads behind a
//!   single-runner gate, the portable strategy that needs no unsafe code.
//! - Queues and wait FIFOs hold [`Tid`]s, never task records; every
//!   dereference goes through the task table, so operations on finished
//!   tids are defined.
//! - Every scheduler transition emits a typed [`Event`] through the
//!   [`EventSink`] port; the default sink is a CSV file named
//!   `schedule_log.csv`, truncated at startup.
//!
//! # Example
//!
//! ```no_run
//! use weft_core::{api, Runtime};
//!
//! let rt = Runtime::new();
//! rt.spawn("ping", 1, || {
//!     for _ in 0..3 {
//!         api::work(2);
//!         api::yield_now();
//!     }
//! });
//! rt.spawn("pong", 1, || {
//!     for _ in 0..3 {
//!         api::work(2);
//!         api::yield_now();
//!     }
//! });
//! rt.run();
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms, unused_must_use)]
#![deny(
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    clippy::cargo,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
#![allow(
    clippy::must_use_candidate,
    clippy::return_self_not_must_use,
    clippy::missing_const_for_fn,
    clippy::redundant_pub_crate,
    clippy::module_name_repetitions,
    clippy::use_self
)]

/// Task-facing yield, sleep, wait/signal, work, and TLS calls.
pub mod api;
/// Monotonic microsecond clock.
pub mod clock;

mod context;
mod event_log;
mod ident;
mod resource;
mod runtime;
mod scheduler;
mod task;
mod tls;

/// Default event log file name, truncated at startup.
pub const LOG_FILE_NAME: &str = "schedule_log.csv";

pub use event_log::{
    CsvEventLog, Event, EventKind, EventSink, LogError, MemoryEventSink, NullEventSink,
};
pub use ident::Tid;
pub use runtime::{Runtime, RuntimeBuilder};
pub use scheduler::{MlfqConfig, SchedPolicy, MAX_MLFQ_LEVELS, MIN_MLFQ_LEVELS};
