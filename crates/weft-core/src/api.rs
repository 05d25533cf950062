// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Task-facing facade: yield, sleep, wait/signal, work, and TLS.
//!
//! These free functions resolve the active [`Runtime`](crate::Runtime)
//! through a per-OS-thread pointer installed at loop entry and at each task
//! context entry. Called from a thread with no active runtime they do
//! nothing: `work` returns 0 and `tls_get` returns `None`.
//!
//! Every function here that suspends (`yield_now`, `sleep`, `wait`, and
//! `work` on quantum expiry) releases the core lock before crossing the
//! gate; no other call suspends.

use std::cell::RefCell;
use std::sync::Arc;

use crate::clock;
use crate::event_log::EventKind;
use crate::ident::Tid;
use crate::runtime::Shared;
use crate::task::TaskState;

struct ActiveRuntime {
    shared: Arc<Shared>,
    /// `Some` on task threads, `None` on the scheduler thread.
    tid: Option<Tid>,
}

thread_local! {
    static ACTIVE: RefCell<Option<ActiveRuntime>> = const { RefCell::new(None) };
}

pub(crate) fn enter_scheduler_context(shared: &Arc<Shared>) {
    ACTIVE.with(|cell| {
        *cell.borrow_mut() = Some(ActiveRuntime {
            shared: Arc::clone(shared),
            tid: None,
        });
    });
}

pub(crate) fn exit_scheduler_context() {
    ACTIVE.with(|cell| {
        *cell.borrow_mut() = None;
    });
}

pub(crate) fn enter_task_context(shared: &Arc<Shared>, tid: Tid) {
    ACTIVE.with(|cell| {
        *cell.borrow_mut() = Some(ActiveRuntime {
            shared: Arc::clone(shared),
            tid: Some(tid),
        });
    });
}

fn active() -> Option<(Arc<Shared>, Option<Tid>)> {
    ACTIVE.with(|cell| {
        cell.borrow()
            .as_ref()
            .map(|active| (Arc::clone(&active.shared), active.tid))
    })
}

/// Voluntarily relinquishes the processor.
///
/// The calling task is re-enqueued READY and resumes after the scheduler
/// dispatches it again. Outside a task context this is a no-op.
pub fn yield_now() {
    let Some((shared, Some(tid))) = active() else {
        return;
    };
    let gate = {
        let mut core = shared.lock_core();
        let Some(gate) = core.gate_of(tid) else {
            return;
        };
        let running = core
            .table
            .get(tid)
            .is_some_and(|rec| rec.state == TaskState::Running);
        if running {
            if let Some(rec) = core.table.get_mut(tid) {
                rec.state = TaskState::Ready;
            }
            core.enqueue_ready(tid);
            core.emit(EventKind::Yield, tid.as_i64(), "");
        }
        core.current = None;
        gate
    };
    gate.yield_to_scheduler();
}

/// Sleeps for at least `ms` milliseconds of monotonic time.
///
/// The task wakes no earlier than the deadline; the loop's idle tick is the
/// worst-case overshoot. Under MLFQ, sleeping counts as interactive
/// behavior and promotes the task one level. `sleep(0)` yields with a
/// past-due deadline and is re-readied on the next loop tick.
pub fn sleep(ms: u64) {
    let Some((shared, Some(tid))) = active() else {
        return;
    };
    let gate = {
        let mut core = shared.lock_core();
        let Some(gate) = core.gate_of(tid) else {
            return;
        };
        if let Some(rec) = core.table.get_mut(tid) {
            rec.wake_time_us = clock::now_us().saturating_add(ms.saturating_mul(1000));
            rec.state = TaskState::Sleeping;
        }
        core.emit(EventKind::Sleep, tid.as_i64(), ms.to_string());
        core.promote_for_io(tid);
        core.current = None;
        gate
    };
    gate.yield_to_scheduler();
}

/// Blocks on a named resource until released by a signal.
///
/// Waiters queue FIFO per resource. Under MLFQ, waiting promotes the task
/// one level. There is no timeout and no cancellation; a resource nobody
/// signals blocks its waiters forever.
pub fn wait(resource: &str) {
    let Some((shared, Some(tid))) = active() else {
        return;
    };
    let gate = {
        let mut core = shared.lock_core();
        let Some(gate) = core.gate_of(tid) else {
            return;
        };
        if let Some(rec) = core.table.get_mut(tid) {
            rec.state = TaskState::Blocked;
        }
        core.resources.park(resource, tid);
        core.emit(EventKind::Wait, tid.as_i64(), resource);
        core.promote_for_io(tid);
        core.current = None;
        gate
    };
    gate.yield_to_scheduler();
}

/// Releases the oldest waiter on `resource`, making it READY.
///
/// Exactly one waiter is released per call; a signal with no waiter is
/// lost. The caller does not suspend.
pub fn signal(resource: &str) {
    let Some((shared, _)) = active() else {
        return;
    };
    shared.lock_core().signal(resource);
}

/// Charges `max(1, units)` work units against the quantum budget.
///
/// Returns the post-decrement budget. When the budget falls to zero or
/// below the task is forced off the processor first (demoted one level
/// under MLFQ), so by the time a non-positive value is observed the yield
/// has already happened. Outside a task context this returns 0.
pub fn work(units: i64) -> i64 {
    let Some((shared, Some(tid))) = active() else {
        return 0;
    };
    let (remaining, gate) = {
        let mut core = shared.lock_core();
        let remaining = match core.table.get_mut(tid) {
            Some(rec) => {
                rec.quantum_budget -= units.max(1);
                rec.quantum_budget
            }
            None => return 0,
        };
        if remaining > 0 {
            return remaining;
        }
        core.emit(EventKind::Qexpire, tid.as_i64(), "auto-yield");
        core.demote_for_cpu(tid);
        let running = core
            .table
            .get(tid)
            .is_some_and(|rec| rec.state == TaskState::Running);
        if running {
            if let Some(rec) = core.table.get_mut(tid) {
                rec.state = TaskState::Ready;
            }
            core.enqueue_ready(tid);
        }
        core.current = None;
        let Some(gate) = core.gate_of(tid) else {
            return remaining;
        };
        (remaining, gate)
    };
    gate.yield_to_scheduler();
    remaining
}

/// Stores a task-local value under `key` for the calling task.
pub fn tls_set(key: &str, value: i64) {
    let Some((shared, Some(tid))) = active() else {
        return;
    };
    shared.lock_core().tls.set(tid, key, value);
}

/// Reads the calling task's value for `key`; `None` when absent.
pub fn tls_get(key: &str) -> Option<i64> {
    let (shared, tid) = active()?;
    let tid = tid?;
    let value = shared.lock_core().tls.get(tid, key);
    value
}
