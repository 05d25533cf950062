// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Cooperative context port: single-runner gate over OS threads.
//!
//! Each task gets a dedicated OS thread parked behind a [`Gate`]; a baton
//! (`Turn`) decides whether the scheduler or the task may run. Exactly one
//! side makes progress at a time, which preserves the single-runner
//! contract of a stack-swapping implementation without any unsafe code.
//! The scheduler context is whichever thread called `Runtime::run`; it has
//! its own stack, distinct from every task stack.
//!
//! Handshake: the scheduler passes the baton with [`Gate::switch_to_task`]
//! and blocks until the task passes it back via [`Gate::yield_to_scheduler`]
//! (or releases it for good with [`Gate::release_to_scheduler`] when the
//! entry frame falls off the end). Both sides loop on the turn value, so
//! the protocol tolerates spurious wakeups and either side reaching the
//! gate first.

use std::io;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;

/// Stack reservation per task thread.
const TASK_STACK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Turn {
    Scheduler,
    Task,
}

/// Two-party baton between the scheduler context and one task context.
#[derive(Debug)]
pub(crate) struct Gate {
    turn: Mutex<Turn>,
    cv: Condvar,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self {
            turn: Mutex::new(Turn::Scheduler),
            cv: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Turn> {
        self.turn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait_until(&self, mut guard: MutexGuard<'_, Turn>, want: Turn) {
        while *guard != want {
            guard = self.cv.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Scheduler side: hand the processor to the task and block until the
    /// task yields it back. Re-entrant across any number of resumes.
    pub(crate) fn switch_to_task(&self) {
        let mut guard = self.lock();
        *guard = Turn::Task;
        self.cv.notify_all();
        self.wait_until(guard, Turn::Scheduler);
    }

    /// Task side: hand the processor back and block until re-dispatched.
    pub(crate) fn yield_to_scheduler(&self) {
        let mut guard = self.lock();
        *guard = Turn::Scheduler;
        self.cv.notify_all();
        self.wait_until(guard, Turn::Task);
    }

    /// Task side, first entry: block until the first dispatch.
    pub(crate) fn wait_first_dispatch(&self) {
        let guard = self.lock();
        self.wait_until(guard, Turn::Task);
    }

    /// Task side, final exit: hand the processor back without waiting for
    /// another turn. The task thread returns after this call.
    pub(crate) fn release_to_scheduler(&self) {
        let mut guard = self.lock();
        *guard = Turn::Scheduler;
        self.cv.notify_all();
    }
}

/// A prepared task context: its gate plus the backing OS thread.
#[derive(Debug)]
pub(crate) struct TaskContext {
    pub(crate) gate: std::sync::Arc<Gate>,
    pub(crate) join: Option<JoinHandle<()>>,
}

/// Spawns the OS thread backing one task context.
///
/// `entry` is the runtime's entry frame; it receives the gate and must wait
/// for the first dispatch before touching shared state. Spawn failure is
/// surfaced to the caller, which treats it as fatal: the runtime cannot
/// make progress if contexts cannot be created.
pub(crate) fn spawn_task_context<F>(thread_name: String, entry: F) -> io::Result<TaskContext>
where
    F: FnOnce(std::sync::Arc<Gate>) + Send + 'static,
{
    let gate = std::sync::Arc::new(Gate::new());
    let task_gate = std::sync::Arc::clone(&gate);
    let join = std::thread::Builder::new()
        .name(thread_name)
        .stack_size(TASK_STACK_SIZE)
        .spawn(move || entry(task_gate))?;
    Ok(TaskContext {
        gate,
        join: Some(join),
    })
}
