// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Scheduler event stream behind a sink port.
//!
//! The runtime emits one typed [`Event`] per state transition through the
//! [`EventSink`] trait, so adapters decide how events are handled (CSV file,
//! memory, discard) without coupling the core to I/O. The fixed vocabulary
//! in [`EventKind`] is part of the runtime's external contract; the CSV
//! adapter writes it verbatim.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Mutex, PoisonError};

use thiserror::Error;

/// Closed vocabulary of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// Runtime loop entered (`tid` is −1).
    Boot,
    /// Runtime loop exited (`tid` is −1).
    Halt,
    /// A NEW task was promoted to READY.
    Ready,
    /// A READY task was dispatched onto the processor.
    Run,
    /// A task's context was entered for the first time.
    Start,
    /// A task's work item returned.
    Finish,
    /// A running task yielded voluntarily.
    Yield,
    /// A running task went to sleep (info carries the milliseconds).
    Sleep,
    /// A sleeping task's deadline passed and it was re-readied.
    Wakeup,
    /// A running task blocked on a named resource (info carries the name).
    Wait,
    /// A blocked task was released by a signal (info carries the name).
    Signal,
    /// A task exhausted its quantum budget and was forced off.
    Qexpire,
    /// MLFQ aging promoted a starved task one level.
    Age,
}

impl EventKind {
    /// The wire name written to the CSV log.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Boot => "boot",
            Self::Halt => "halt",
            Self::Ready => "ready",
            Self::Run => "run",
            Self::Start => "start",
            Self::Finish => "finish",
            Self::Yield => "yield",
            Self::Sleep => "sleep",
            Self::Wakeup => "wakeup",
            Self::Wait => "wait",
            Self::Signal => "signal",
            Self::Qexpire => "qexpire",
            Self::Age => "age",
        }
    }
}

/// One scheduler event.
#[derive(Debug, Clone)]
pub struct Event {
    /// Microseconds since the process clock epoch.
    pub t_us: u64,
    /// Event name from the fixed vocabulary.
    pub kind: EventKind,
    /// Task the event concerns, or −1 for runtime-level events.
    pub tid: i64,
    /// Free-form detail string; empty when the event carries none.
    pub info: String,
}

/// Sink port for scheduler events.
///
/// Implementations may buffer; event loss on crash is acceptable. The
/// runtime calls [`EventSink::record`] while holding its core lock, so
/// implementations should not block for long.
pub trait EventSink: Send + Sync {
    /// Appends one event.
    fn record(&self, event: &Event);

    /// Flushes any buffered events. Default is a no-op.
    fn flush(&self) {}
}

/// Discards every event. The fallback when no log can be opened.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn record(&self, _event: &Event) {}
}

/// Captures events in memory, in emission order.
///
/// Intended for tests and harnesses that assert on the event stream.
#[derive(Debug, Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventSink {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every event recorded so far.
    pub fn snapshot(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl EventSink for MemoryEventSink {
    fn record(&self, event: &Event) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Error opening the CSV event log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The log file could not be created or truncated.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// CSV adapter writing `t_us,event,tid,info` lines.
///
/// The file is truncated at open and a header line is written first. Write
/// errors after open are ignored; the log is best-effort by contract.
#[derive(Debug)]
pub struct CsvEventLog {
    out: Mutex<BufWriter<File>>,
}

impl CsvEventLog {
    /// Creates (truncating) the log file at `path` and writes the header.
    ///
    /// # Errors
    /// Returns [`LogError::Io`] when the file cannot be created; callers
    /// are expected to fall back to [`NullEventSink`].
    pub fn create(path: impl AsRef<Path>) -> Result<Self, LogError> {
        let file = File::create(path)?;
        let mut out = BufWriter::new(file);
        out.write_all(b"t_us,event,tid,info\n")?;
        Ok(Self {
            out: Mutex::new(out),
        })
    }
}

impl EventSink for CsvEventLog {
    fn record(&self, event: &Event) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = writeln!(
            out,
            "{},{},{},{}",
            event.t_us,
            event.kind.as_str(),
            event.tid,
            event.info
        );
    }

    fn flush(&self) {
        let mut out = self.out.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = out.flush();
    }
}
