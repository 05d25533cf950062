// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Task-local storage: per-`Tid` string → machine-word integer map.

use rustc_hash::FxHashMap;

use crate::ident::Tid;

#[derive(Debug, Default)]
pub(crate) struct TlsStore {
    slots: FxHashMap<Tid, FxHashMap<String, i64>>,
}

impl TlsStore {
    pub(crate) fn set(&mut self, tid: Tid, key: &str, value: i64) {
        self.slots
            .entry(tid)
            .or_default()
            .insert(key.to_owned(), value);
    }

    /// Returns the stored value, or `None` when the key or `tid` is absent.
    pub(crate) fn get(&self, tid: Tid, key: &str) -> Option<i64> {
        self.slots.get(&tid)?.get(key).copied()
    }
}
