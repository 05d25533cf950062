// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Ready-set disciplines: round-robin, static priority, and MLFQ with aging.
//!
//! The scheduler is a pure data structure over `Tid`s; it owns no task
//! records and performs no I/O. Event emission happens in the runtime
//! wrapper, and wall-clock time enters only as an explicit `now_us`
//! argument, which keeps every discipline deterministic under test.
//!
//! Ordering contract:
//! - Round-robin: FIFO over READY tasks.
//! - Priority: head-of-line service for the highest `base_priority`, FIFO
//!   among equals. No aging; starvation of lower priorities is by design.
//! - MLFQ: strictly lower-numbered levels first, FIFO within a level.
//!   Quantum expiry demotes, sleep/wait promotes, periodic aging promotes
//!   one starved task per interval.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::ident::Tid;
use crate::task::TaskTable;

/// Fewest MLFQ levels accepted.
pub const MIN_MLFQ_LEVELS: usize = 1;
/// Most MLFQ levels accepted.
pub const MAX_MLFQ_LEVELS: usize = 8;

/// Selects which queue discipline serves READY tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SchedPolicy {
    /// FIFO over all READY tasks.
    RoundRobin,
    /// Strict `base_priority` ordering, stable among equals.
    Priority,
    /// Multi-level feedback queue with demotion, promotion, and aging.
    Mlfq,
}

impl SchedPolicy {
    /// Short name used in the `boot` event and the `SCHED` variable.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RoundRobin => "rr",
            Self::Priority => "prio",
            Self::Mlfq => "mlfq",
        }
    }

    /// Parses a `SCHED` environment value. Unrecognized values map to
    /// `None` so the explicit setting stays in place.
    pub fn parse_env(value: &str) -> Option<Self> {
        match value {
            "rr" => Some(Self::RoundRobin),
            "prio" | "priority" => Some(Self::Priority),
            "mlfq" => Some(Self::Mlfq),
            _ => None,
        }
    }
}

/// MLFQ tuning knobs. Out-of-range values are normalized before use:
/// levels clamp to `[1, 8]`, quanta to at least 1 unit, the aging interval
/// to at least 1 ms.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlfqConfig {
    /// Number of feedback levels; level 0 is the top.
    pub levels: usize,
    /// Work-unit quantum granted per level. Rebuilt as `max(1, 8 >> level)`
    /// whenever its length no longer matches `levels`.
    pub quantum_by_level: Vec<i64>,
    /// Whether periodic aging promotions run.
    pub enable_aging: bool,
    /// Milliseconds between aging promotions.
    pub aging_interval_ms: u64,
}

impl Default for MlfqConfig {
    fn default() -> Self {
        Self {
            levels: 3,
            quantum_by_level: vec![8, 4, 2],
            enable_aging: true,
            aging_interval_ms: 500,
        }
    }
}

fn default_quantum_for_level(level: usize) -> i64 {
    (8i64 >> level.min(62)).max(1)
}

#[derive(Debug)]
struct MlfqState {
    queues: Vec<VecDeque<Tid>>,
    last_age_us: u64,
}

impl MlfqState {
    fn new(levels: usize, now_us: u64) -> Self {
        Self {
            queues: vec![VecDeque::new(); levels.clamp(MIN_MLFQ_LEVELS, MAX_MLFQ_LEVELS)],
            last_age_us: now_us,
        }
    }
}

/// Normalizes the config and reshapes the queues to match it. Queued tids
/// from removed levels merge into the new bottom level; per-record levels
/// are clamped lazily on their next enqueue.
fn ensure_shape(cfg: &mut MlfqConfig, state: &mut MlfqState) {
    cfg.levels = cfg.levels.clamp(MIN_MLFQ_LEVELS, MAX_MLFQ_LEVELS);
    if cfg.quantum_by_level.len() != cfg.levels {
        cfg.quantum_by_level = (0..cfg.levels).map(default_quantum_for_level).collect();
    }
    for q in &mut cfg.quantum_by_level {
        *q = (*q).max(1);
    }
    cfg.aging_interval_ms = cfg.aging_interval_ms.max(1);

    if state.queues.len() != cfg.levels {
        let mut fresh: Vec<VecDeque<Tid>> = vec![VecDeque::new(); cfg.levels];
        for (level, queue) in state.queues.drain(..).enumerate() {
            fresh[level.min(cfg.levels - 1)].extend(queue);
        }
        state.queues = fresh;
    }
}

#[derive(Debug)]
enum QueueKind {
    RoundRobin(VecDeque<Tid>),
    Priority(VecDeque<Tid>),
    Mlfq(MlfqState),
}

/// The ready set: one live discipline plus the persistent MLFQ config.
///
/// The config outlives policy switches so that MLFQ knobs set while another
/// policy is active take effect when MLFQ is selected.
#[derive(Debug)]
pub(crate) struct Scheduler {
    kind: QueueKind,
    mlfq: MlfqConfig,
}

impl Scheduler {
    pub(crate) fn new(policy: SchedPolicy, mlfq: MlfqConfig, now_us: u64) -> Self {
        let kind = Self::fresh_kind(policy, &mlfq, now_us);
        Self { kind, mlfq }
    }

    fn fresh_kind(policy: SchedPolicy, mlfq: &MlfqConfig, now_us: u64) -> QueueKind {
        match policy {
            SchedPolicy::RoundRobin => QueueKind::RoundRobin(VecDeque::new()),
            SchedPolicy::Priority => QueueKind::Priority(VecDeque::new()),
            SchedPolicy::Mlfq => QueueKind::Mlfq(MlfqState::new(mlfq.levels, now_us)),
        }
    }

    pub(crate) fn policy(&self) -> SchedPolicy {
        match self.kind {
            QueueKind::RoundRobin(_) => SchedPolicy::RoundRobin,
            QueueKind::Priority(_) => SchedPolicy::Priority,
            QueueKind::Mlfq(_) => SchedPolicy::Mlfq,
        }
    }

    /// Switches discipline, re-enqueueing every queued tid in its previous
    /// service order so none is stranded outside a queue.
    pub(crate) fn set_policy(&mut self, table: &mut TaskTable, policy: SchedPolicy, now_us: u64) {
        if policy == self.policy() {
            return;
        }
        let queued = self.drain_all();
        self.kind = Self::fresh_kind(policy, &self.mlfq, now_us);
        for tid in queued {
            self.enqueue(table, tid);
        }
    }

    fn drain_all(&mut self) -> Vec<Tid> {
        match &mut self.kind {
            QueueKind::RoundRobin(q) | QueueKind::Priority(q) => q.drain(..).collect(),
            QueueKind::Mlfq(state) => state
                .queues
                .iter_mut()
                .flat_map(|q| q.drain(..))
                .collect(),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        match &self.kind {
            QueueKind::RoundRobin(q) | QueueKind::Priority(q) => q.is_empty(),
            QueueKind::Mlfq(state) => state.queues.iter().all(VecDeque::is_empty),
        }
    }

    /// Adds a READY tid to the discipline.
    ///
    /// Under MLFQ this clamps the record's level into range and resets its
    /// quantum budget from the level table.
    pub(crate) fn enqueue(&mut self, table: &mut TaskTable, tid: Tid) {
        let Self { kind, mlfq } = self;
        match kind {
            QueueKind::RoundRobin(q) => q.push_back(tid),
            QueueKind::Priority(q) => {
                let priority = table.base_priority_of(tid);
                let at = q
                    .iter()
                    .position(|&queued| priority > table.base_priority_of(queued));
                match at {
                    Some(i) => q.insert(i, tid),
                    None => q.push_back(tid),
                }
            }
            QueueKind::Mlfq(state) => {
                ensure_shape(mlfq, state);
                if let Some(rec) = table.get_mut(tid) {
                    rec.mlfq_level = rec.mlfq_level.min(mlfq.levels - 1);
                    rec.quantum_budget = mlfq.quantum_by_level[rec.mlfq_level];
                    state.queues[rec.mlfq_level].push_back(tid);
                }
            }
        }
    }

    /// Removes and returns the next tid to dispatch, or `None` when every
    /// queue is empty. MLFQ scans from level 0 upward.
    pub(crate) fn pop(&mut self) -> Option<Tid> {
        let Self { kind, mlfq } = self;
        match kind {
            QueueKind::RoundRobin(q) | QueueKind::Priority(q) => q.pop_front(),
            QueueKind::Mlfq(state) => {
                ensure_shape(mlfq, state);
                state.queues.iter_mut().find_map(VecDeque::pop_front)
            }
        }
    }

    /// Moves `tid` one level down (toward the bottom) and refills its
    /// budget. No-op outside MLFQ.
    pub(crate) fn demote(&mut self, table: &mut TaskTable, tid: Tid) {
        let Self { kind, mlfq } = self;
        let QueueKind::Mlfq(state) = kind else {
            return;
        };
        ensure_shape(mlfq, state);
        if let Some(rec) = table.get_mut(tid) {
            rec.mlfq_level = (rec.mlfq_level + 1).min(mlfq.levels - 1);
            rec.quantum_budget = mlfq.quantum_by_level[rec.mlfq_level];
        }
    }

    /// Moves `tid` one level up (toward the top) and refills its budget.
    /// No-op outside MLFQ.
    pub(crate) fn promote(&mut self, table: &mut TaskTable, tid: Tid) {
        let Self { kind, mlfq } = self;
        let QueueKind::Mlfq(state) = kind else {
            return;
        };
        ensure_shape(mlfq, state);
        if let Some(rec) = table.get_mut(tid) {
            rec.mlfq_level = rec.mlfq_level.saturating_sub(1).min(mlfq.levels - 1);
            rec.quantum_budget = mlfq.quantum_by_level[rec.mlfq_level];
        }
    }

    /// Runs one aging step when due: moves the head of the lowest-priority
    /// non-empty level up one level and refills its budget. Returns the
    /// promoted tid so the caller can log it. At most one promotion per
    /// interval.
    pub(crate) fn maybe_age(&mut self, table: &mut TaskTable, now_us: u64) -> Option<Tid> {
        let Self { kind, mlfq } = self;
        let QueueKind::Mlfq(state) = kind else {
            return None;
        };
        if !mlfq.enable_aging {
            return None;
        }
        ensure_shape(mlfq, state);
        if now_us.saturating_sub(state.last_age_us) < mlfq.aging_interval_ms.saturating_mul(1000) {
            return None;
        }
        state.last_age_us = now_us;
        for level in (1..mlfq.levels).rev() {
            if let Some(tid) = state.queues[level].pop_front() {
                let dst = level - 1;
                if let Some(rec) = table.get_mut(tid) {
                    rec.mlfq_level = dst;
                    rec.quantum_budget = mlfq.quantum_by_level[dst];
                }
                state.queues[dst].push_back(tid);
                return Some(tid);
            }
        }
        None
    }

    /// Budget granted to a record at dispatch: the level quantum under
    /// MLFQ, the record's base quantum (floor 1) otherwise.
    pub(crate) fn replenish_for(&self, level: usize, base_quantum: i64) -> i64 {
        match &self.kind {
            QueueKind::Mlfq(_) => {
                let idx = level.min(self.mlfq.levels.saturating_sub(1));
                self.mlfq
                    .quantum_by_level
                    .get(idx)
                    .copied()
                    .unwrap_or(1)
                    .max(1)
            }
            _ => base_quantum.max(1),
        }
    }

    // --- MLFQ configuration -------------------------------------------------

    pub(crate) fn set_mlfq_levels(&mut self, levels: usize) {
        self.mlfq.levels = levels.clamp(MIN_MLFQ_LEVELS, MAX_MLFQ_LEVELS);
        self.reshape_if_live();
    }

    pub(crate) fn set_mlfq_quantum(&mut self, level: usize, units: i64) {
        if level >= MAX_MLFQ_LEVELS {
            return;
        }
        if self.mlfq.quantum_by_level.len() <= level {
            self.mlfq.quantum_by_level.resize(level + 1, 2);
        }
        self.mlfq.quantum_by_level[level] = units.max(1);
        self.reshape_if_live();
    }

    pub(crate) fn set_mlfq_aging(&mut self, enable: bool) {
        self.mlfq.enable_aging = enable;
    }

    pub(crate) fn set_mlfq_aging_interval_ms(&mut self, ms: u64) {
        self.mlfq.aging_interval_ms = ms.max(1);
    }

    fn reshape_if_live(&mut self) {
        let Self { kind, mlfq } = self;
        if let QueueKind::Mlfq(state) = kind {
            ensure_shape(mlfq, state);
        }
    }
}
