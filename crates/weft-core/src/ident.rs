// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Task identifiers.

use std::fmt;

/// Identifier of a task, assigned from a per-runtime counter starting at 0.
///
/// Queues and wait FIFOs hold `Tid`s, never task records; every dereference
/// goes through the task table, so operations on an already-finished `Tid`
/// observe the FINISHED state instead of being undefined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tid(u32);

impl Tid {
    /// Wraps a raw index.
    pub(crate) fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Index into the task table.
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }

    /// The value written to the event log's `tid` column.
    pub fn as_i64(self) -> i64 {
        i64::from(self.0)
    }
}

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
