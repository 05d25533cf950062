// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! The runtime value: task table, ready set, registries, and the loop.
//!
//! A [`Runtime`] groups what the reference design kept as process-wide
//! singletons. Task-facing calls (see [`crate::api`]) reach it through a
//! per-OS-thread pointer installed at loop entry and at each task context
//! entry, which rules out nested runtimes on one thread and keeps tests
//! per-runtime.
//!
//! All mutable state lives behind one lock. The gate protocol guarantees a
//! single runner, but task contexts are OS threads, so the lock is what
//! makes the single-runner invariant a memory-safety fact rather than a
//! convention. No path holds the lock across a gate switch.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use crate::clock;
use crate::context::{self, Gate};
use crate::event_log::{CsvEventLog, Event, EventKind, EventSink, NullEventSink};
use crate::ident::Tid;
use crate::resource::ResourceRegistry;
use crate::scheduler::{MlfqConfig, SchedPolicy, Scheduler};
use crate::task::{TaskState, TaskTable};
use crate::tls::TlsStore;
use crate::{api, LOG_FILE_NAME};

/// How long the loop naps when only sleepers or blocked tasks remain.
const IDLE_TICK: Duration = Duration::from_millis(1);

/// Everything the runtime mutates, behind the single lock.
pub(crate) struct Core {
    pub(crate) table: TaskTable,
    pub(crate) sched: Scheduler,
    pub(crate) resources: ResourceRegistry,
    pub(crate) tls: TlsStore,
    pub(crate) sink: Arc<dyn EventSink>,
    /// `Some` exactly while a task context is on the processor.
    pub(crate) current: Option<Tid>,
}

impl Core {
    pub(crate) fn emit(&self, kind: EventKind, tid: i64, info: impl Into<String>) {
        self.sink.record(&Event {
            t_us: clock::now_us(),
            kind,
            tid,
            info: info.into(),
        });
    }

    pub(crate) fn enqueue_ready(&mut self, tid: Tid) {
        let Self { table, sched, .. } = self;
        sched.enqueue(table, tid);
    }

    pub(crate) fn promote_for_io(&mut self, tid: Tid) {
        let Self { table, sched, .. } = self;
        sched.promote(table, tid);
    }

    pub(crate) fn demote_for_cpu(&mut self, tid: Tid) {
        let Self { table, sched, .. } = self;
        sched.demote(table, tid);
    }

    pub(crate) fn set_policy(&mut self, policy: SchedPolicy) {
        let Self { table, sched, .. } = self;
        sched.set_policy(table, policy, clock::now_us());
    }

    pub(crate) fn gate_of(&self, tid: Tid) -> Option<Arc<Gate>> {
        self.table
            .get(tid)
            .and_then(|rec| rec.context.as_ref())
            .map(|ctx| Arc::clone(&ctx.gate))
    }

    /// Releases the oldest waiter on `resource`, if any. A signal with no
    /// waiter is lost by contract.
    pub(crate) fn signal(&mut self, resource: &str) {
        let Some(tid) = self.resources.release_oldest(resource) else {
            return;
        };
        let blocked = self
            .table
            .get(tid)
            .is_some_and(|rec| rec.state == TaskState::Blocked);
        if !blocked {
            return;
        }
        if let Some(rec) = self.table.get_mut(tid) {
            rec.state = TaskState::Ready;
        }
        self.enqueue_ready(tid);
        self.emit(EventKind::Signal, tid.as_i64(), resource);
    }

    /// Promotes every NEW record to READY, in tid order.
    fn promote_new(&mut self) {
        let fresh: Vec<Tid> = self
            .table
            .iter()
            .filter(|rec| rec.state == TaskState::New)
            .map(|rec| rec.tid)
            .collect();
        for tid in fresh {
            if let Some(rec) = self.table.get_mut(tid) {
                rec.state = TaskState::Ready;
            }
            self.enqueue_ready(tid);
            self.emit(EventKind::Ready, tid.as_i64(), "");
        }
    }

    /// Re-readies every sleeper whose deadline has passed, in tid order.
    fn wake_sleepers(&mut self, now_us: u64) {
        let due: Vec<Tid> = self
            .table
            .iter()
            .filter(|rec| rec.state == TaskState::Sleeping && rec.wake_time_us <= now_us)
            .map(|rec| rec.tid)
            .collect();
        for tid in due {
            if let Some(rec) = self.table.get_mut(tid) {
                rec.state = TaskState::Ready;
            }
            self.enqueue_ready(tid);
            self.emit(EventKind::Wakeup, tid.as_i64(), "");
        }
    }

    fn maybe_age(&mut self, now_us: u64) {
        let Self { table, sched, .. } = self;
        if let Some(tid) = sched.maybe_age(table, now_us) {
            self.emit(EventKind::Age, tid.as_i64(), "promote");
        }
    }
}

/// Shared handle between the runtime, the loop thread, and task contexts.
pub(crate) struct Shared {
    core: Mutex<Core>,
}

impl Shared {
    pub(crate) fn lock_core(&self) -> MutexGuard<'_, Core> {
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Configures and creates a [`Runtime`].
pub struct RuntimeBuilder {
    policy: SchedPolicy,
    mlfq: MlfqConfig,
    sink: Option<Arc<dyn EventSink>>,
    log_path: PathBuf,
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self {
            policy: SchedPolicy::RoundRobin,
            mlfq: MlfqConfig::default(),
            sink: None,
            log_path: PathBuf::from(LOG_FILE_NAME),
        }
    }
}

impl RuntimeBuilder {
    /// Initial scheduling policy. `SCHED` may still override it at
    /// [`Runtime::run`].
    #[must_use]
    pub fn policy(mut self, policy: SchedPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// MLFQ tuning used whenever the MLFQ policy is active.
    #[must_use]
    pub fn mlfq_config(mut self, config: MlfqConfig) -> Self {
        self.mlfq = config;
        self
    }

    /// Replaces the default CSV log with an explicit sink.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Path of the CSV event log (ignored when an explicit sink is set).
    #[must_use]
    pub fn log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = path.into();
        self
    }

    /// Builds the runtime. When no sink was supplied, the CSV log is opened
    /// (truncating) here; if that fails the runtime proceeds with logging
    /// disabled and no other behavior change.
    pub fn build(self) -> Runtime {
        let sink: Arc<dyn EventSink> = match self.sink {
            Some(sink) => sink,
            None => match CsvEventLog::create(&self.log_path) {
                Ok(log) => Arc::new(log),
                Err(err) => {
                    tracing::warn!(
                        error = %err,
                        path = %self.log_path.display(),
                        "cannot open event log; logging disabled"
                    );
                    Arc::new(NullEventSink)
                }
            },
        };
        Runtime {
            shared: Arc::new(Shared {
                core: Mutex::new(Core {
                    table: TaskTable::default(),
                    sched: Scheduler::new(self.policy, self.mlfq, clock::now_us()),
                    resources: ResourceRegistry::default(),
                    tls: TlsStore::default(),
                    sink,
                    current: None,
                }),
            }),
        }
    }
}

/// A cooperative green-thread runtime.
///
/// Tasks are multiplexed onto the thread that calls [`Runtime::run`]; they
/// relinquish the processor only at explicit yield points (`yield`, sleep,
/// wait, and quantum expiry inside [`crate::api::work`]).
///
/// Cloning yields another handle to the same runtime; move a clone into a
/// task to create tasks or signal resources mid-run. The loop promotes
/// newly created tasks to READY on its next iteration.
#[derive(Clone)]
pub struct Runtime {
    shared: Arc<Shared>,
}

impl Runtime {
    /// Creates a runtime with default settings (round-robin, CSV log).
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts configuring a runtime.
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::default()
    }

    /// Creates a task in state NEW and returns its tid.
    ///
    /// `priority` is clamped to `[1, 10]`; 10 is highest. The work item
    /// runs exactly once, on first dispatch.
    pub fn spawn<F>(&self, name: impl Into<String>, priority: i32, func: F) -> Tid
    where
        F: FnOnce() + Send + 'static,
    {
        self.shared
            .lock_core()
            .table
            .create(name.into(), priority, Box::new(func))
    }

    /// [`Runtime::spawn`] with the default name and lowest priority.
    pub fn spawn_default<F>(&self, func: F) -> Tid
    where
        F: FnOnce() + Send + 'static,
    {
        self.spawn("task", 1, func)
    }

    /// Selects the scheduling policy. Intended before [`Runtime::run`];
    /// switching while tasks are queued re-enqueues them under the new
    /// discipline.
    pub fn set_policy(&self, policy: SchedPolicy) {
        self.shared.lock_core().set_policy(policy);
    }

    /// Current scheduling policy.
    pub fn policy(&self) -> SchedPolicy {
        self.shared.lock_core().sched.policy()
    }

    /// Number of MLFQ levels, clamped to `[1, 8]`.
    pub fn mlfq_set_levels(&self, levels: usize) {
        self.shared.lock_core().sched.set_mlfq_levels(levels);
    }

    /// Work-unit quantum for one MLFQ level; at least 1.
    pub fn mlfq_set_quantum_by_level(&self, level: usize, units: i64) {
        self.shared.lock_core().sched.set_mlfq_quantum(level, units);
    }

    /// Enables or disables MLFQ aging promotions.
    pub fn mlfq_enable_aging(&self, enable: bool) {
        self.shared.lock_core().sched.set_mlfq_aging(enable);
    }

    /// Milliseconds between aging promotions; at least 1.
    pub fn mlfq_set_aging_interval_ms(&self, ms: u64) {
        self.shared.lock_core().sched.set_mlfq_aging_interval_ms(ms);
    }

    /// Releases the oldest waiter on `resource`. Callable from outside any
    /// task context; lost when nothing waits.
    pub fn signal(&self, resource: &str) {
        self.shared.lock_core().signal(resource);
    }

    /// Drives the loop until every task is FINISHED.
    ///
    /// Consults the `SCHED` environment variable once on entry: recognized
    /// values (`rr`, `prio`, `priority`, `mlfq`) override the explicit
    /// policy, anything else leaves it in place. A runtime whose remaining
    /// tasks are all permanently blocked idles forever; deadlock detection
    /// is out of scope by design.
    pub fn run(&self) {
        {
            let mut core = self.shared.lock_core();
            if let Ok(value) = std::env::var("SCHED") {
                if let Some(policy) = SchedPolicy::parse_env(&value) {
                    core.set_policy(policy);
                }
            }
            let policy = core.sched.policy();
            core.emit(EventKind::Boot, -1, policy.as_str());
            tracing::info!(policy = policy.as_str(), "runtime booting");
        }

        api::enter_scheduler_context(&self.shared);
        loop {
            if self.shared.lock_core().table.all_finished() {
                break;
            }
            self.schedule_once();
            let idle = self.shared.lock_core().sched.is_empty();
            if idle {
                thread::sleep(IDLE_TICK);
            }
        }
        api::exit_scheduler_context();

        {
            let core = self.shared.lock_core();
            core.emit(EventKind::Halt, -1, "");
            core.sink.flush();
        }
        self.join_task_threads();
        tracing::info!("runtime halted");
    }

    /// One loop iteration: promote NEW tasks, wake due sleepers, run an
    /// aging step, then dispatch at most one task.
    fn schedule_once(&self) {
        let next = {
            let mut core = self.shared.lock_core();
            core.promote_new();
            let now = clock::now_us();
            core.wake_sleepers(now);
            core.maybe_age(now);
            core.sched.pop()
        };
        if let Some(tid) = next {
            self.dispatch(tid);
        }
    }

    /// Enters `tid`'s context and blocks until it yields back. Prepares the
    /// context lazily on first dispatch and replenishes the quantum budget
    /// on every dispatch.
    fn dispatch(&self, tid: Tid) {
        let gate = {
            let mut core = self.shared.lock_core();
            let Some(rec) = core.table.get(tid) else {
                return;
            };
            // Queues hold weak references; anything not READY is stale.
            if rec.state != TaskState::Ready {
                return;
            }
            let (level, base, name) = (rec.mlfq_level, rec.base_quantum, rec.name.clone());

            if rec.context.is_none() {
                let entry = task_entry(Arc::clone(&self.shared), tid);
                let thread_name = format!("weft-task-{tid}");
                match context::spawn_task_context(thread_name, entry) {
                    Ok(ctx) => {
                        if let Some(rec) = core.table.get_mut(tid) {
                            rec.context = Some(ctx);
                        }
                    }
                    Err(err) => {
                        // No recovery path: the runtime cannot make
                        // progress without task contexts.
                        tracing::error!(error = %err, %tid, "task context creation failed");
                        std::process::abort();
                    }
                }
            }

            let budget = core.sched.replenish_for(level, base);
            if let Some(rec) = core.table.get_mut(tid) {
                rec.state = TaskState::Running;
                rec.quantum_budget = budget;
            }
            core.current = Some(tid);
            core.emit(EventKind::Run, tid.as_i64(), name);
            core.gate_of(tid)
        };
        let Some(gate) = gate else {
            return;
        };
        gate.switch_to_task();

        debug_assert!(
            self.shared.lock_core().current.is_none(),
            "task yielded without clearing the current tid"
        );
    }

    /// Collects the finished task threads. All records are FINISHED when
    /// this runs, so each join returns as soon as its thread leaves the
    /// gate.
    fn join_task_threads(&self) {
        let handles: Vec<_> = {
            let mut core = self.shared.lock_core();
            core.table
                .iter_mut()
                .filter_map(|rec| rec.context.as_mut().and_then(|ctx| ctx.join.take()))
                .collect()
        };
        for handle in handles {
            let _ = handle.join();
        }
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds the entry frame for one task context.
///
/// On first dispatch it marks the record RUNNING, replenishes the budget,
/// emits `start`, and invokes the work item exactly once; when the item
/// returns (or panics) the record becomes FINISHED and the context releases
/// the processor for good. The frame never returns control by falling off
/// the gate.
fn task_entry(shared: Arc<Shared>, tid: Tid) -> impl FnOnce(Arc<Gate>) + Send + 'static {
    move |gate| {
        api::enter_task_context(&shared, tid);
        gate.wait_first_dispatch();

        let func = {
            let mut core = shared.lock_core();
            core.current = Some(tid);
            let (level, base, name) = core
                .table
                .get(tid)
                .map(|rec| (rec.mlfq_level, rec.base_quantum, rec.name.clone()))
                .unwrap_or_default();
            let budget = core.sched.replenish_for(level, base);
            core.emit(EventKind::Start, tid.as_i64(), name);
            core.table.get_mut(tid).and_then(|rec| {
                rec.state = TaskState::Running;
                rec.quantum_budget = budget;
                rec.func.take()
            })
        };

        if let Some(func) = func {
            if catch_unwind(AssertUnwindSafe(func)).is_err() {
                tracing::error!(%tid, "task panicked; marking it finished");
            }
        }

        {
            let mut core = shared.lock_core();
            if let Some(rec) = core.table.get_mut(tid) {
                rec.state = TaskState::Finished;
            }
            core.current = None;
            core.emit(EventKind::Finish, tid.as_i64(), "");
        }
        gate.release_to_scheduler();
    }
}
