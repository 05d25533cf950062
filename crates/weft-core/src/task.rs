// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Task records and the append-only task table.

use crate::context::TaskContext;
use crate::ident::Tid;

/// Work item run by a task; invoked exactly once on first entry.
pub(crate) type TaskFn = Box<dyn FnOnce() + Send + 'static>;

/// Priority bounds for [`TaskTable::create`].
pub(crate) const MIN_PRIORITY: i32 = 1;
/// Highest accepted priority.
pub(crate) const MAX_PRIORITY: i32 = 10;

/// Default quantum for records under the flat (non-MLFQ) policies.
pub(crate) const DEFAULT_QUANTUM: i64 = 8;

/// Lifecycle state of a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskState {
    /// Created, not yet seen by the loop.
    New,
    /// Enqueued in the ready set.
    Ready,
    /// On the processor. At most one task is in this state.
    Running,
    /// Parked in a resource wait FIFO.
    Blocked,
    /// Waiting for a wake deadline.
    Sleeping,
    /// Work item returned; terminal.
    Finished,
}

/// One task's record. Lives in the table for the runtime's whole life.
pub(crate) struct TaskRecord {
    pub(crate) tid: Tid,
    pub(crate) name: String,
    pub(crate) base_priority: u8,
    /// Reserved for future dynamic-priority policies; tracks base for now.
    #[allow(dead_code)]
    pub(crate) dyn_priority: u8,
    pub(crate) state: TaskState,
    pub(crate) func: Option<TaskFn>,
    pub(crate) context: Option<TaskContext>,
    /// Absolute wake deadline; meaningful only while SLEEPING.
    pub(crate) wake_time_us: u64,
    /// Work units left before a forced yield. May briefly go ≤0 inside the
    /// work primitive; replenished on the next dispatch.
    pub(crate) quantum_budget: i64,
    /// Replenish source under RR/Priority (MLFQ uses its level table).
    pub(crate) base_quantum: i64,
    /// Current MLFQ level; 0 is the top. Clamped on every enqueue.
    pub(crate) mlfq_level: usize,
}

impl std::fmt::Debug for TaskRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRecord")
            .field("tid", &self.tid)
            .field("name", &self.name)
            .field("base_priority", &self.base_priority)
            .field("state", &self.state)
            .field("mlfq_level", &self.mlfq_level)
            .field("quantum_budget", &self.quantum_budget)
            .finish_non_exhaustive()
    }
}

/// Owns every task record, keyed by `Tid`. Append-only: FINISHED records
/// stay until the runtime is dropped so any previously valid `Tid` can be
/// dereferenced safely.
#[derive(Debug, Default)]
pub(crate) struct TaskTable {
    tasks: Vec<TaskRecord>,
}

impl TaskTable {
    /// Creates a record in state NEW and returns its `Tid`.
    ///
    /// Priority is clamped to `[1, 10]`; 10 is highest.
    pub(crate) fn create(&mut self, name: String, priority: i32, func: TaskFn) -> Tid {
        let tid = Tid::from_raw(u32::try_from(self.tasks.len()).unwrap_or(u32::MAX));
        let priority = u8::try_from(priority.clamp(MIN_PRIORITY, MAX_PRIORITY)).unwrap_or(1);
        self.tasks.push(TaskRecord {
            tid,
            name,
            base_priority: priority,
            dyn_priority: priority,
            state: TaskState::New,
            func: Some(func),
            context: None,
            wake_time_us: 0,
            quantum_budget: DEFAULT_QUANTUM,
            base_quantum: DEFAULT_QUANTUM,
            mlfq_level: 0,
        });
        tid
    }

    pub(crate) fn get(&self, tid: Tid) -> Option<&TaskRecord> {
        self.tasks.get(tid.index())
    }

    pub(crate) fn get_mut(&mut self, tid: Tid) -> Option<&mut TaskRecord> {
        self.tasks.get_mut(tid.index())
    }

    /// Iterates records in `Tid` order.
    pub(crate) fn iter(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut TaskRecord> {
        self.tasks.iter_mut()
    }

    /// True when every record is FINISHED (vacuously true when empty).
    pub(crate) fn all_finished(&self) -> bool {
        self.tasks.iter().all(|t| t.state == TaskState::Finished)
    }

    pub(crate) fn base_priority_of(&self, tid: Tid) -> u8 {
        self.get(tid).map_or(1, |t| t.base_priority)
    }
}
