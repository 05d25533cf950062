// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! Named-resource registry: resource name → FIFO of blocked tasks.
//!
//! FIFOs are created on first reference. A `Tid` appears in at most one
//! FIFO at a time; its record is BLOCKED while present. A signal with no
//! waiter is lost — the registry keeps no memory of it.

use std::collections::VecDeque;

use rustc_hash::FxHashMap;

use crate::ident::Tid;

#[derive(Debug, Default)]
pub(crate) struct ResourceRegistry {
    queues: FxHashMap<String, VecDeque<Tid>>,
}

impl ResourceRegistry {
    /// Appends `tid` to the FIFO for `resource`, creating it if needed.
    pub(crate) fn park(&mut self, resource: &str, tid: Tid) {
        self.queues
            .entry(resource.to_owned())
            .or_default()
            .push_back(tid);
    }

    /// Pops the oldest waiter on `resource`, if any.
    pub(crate) fn release_oldest(&mut self, resource: &str) -> Option<Tid> {
        self.queues.get_mut(resource)?.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn waiters_are_released_in_fifo_order() {
        let mut reg = ResourceRegistry::default();
        reg.park("disk", Tid::from_raw(3));
        reg.park("disk", Tid::from_raw(1));
        reg.park("disk", Tid::from_raw(2));
        assert_eq!(reg.release_oldest("disk"), Some(Tid::from_raw(3)));
        assert_eq!(reg.release_oldest("disk"), Some(Tid::from_raw(1)));
        assert_eq!(reg.release_oldest("disk"), Some(Tid::from_raw(2)));
        assert_eq!(reg.release_oldest("disk"), None);
    }

    #[test]
    fn signal_on_unknown_resource_is_lost() {
        let mut reg = ResourceRegistry::default();
        assert_eq!(reg.release_oldest("never-waited-on"), None);
    }

    #[test]
    fn resources_are_independent() {
        let mut reg = ResourceRegistry::default();
        reg.park("a", Tid::from_raw(0));
        reg.park("b", Tid::from_raw(1));
        assert_eq!(reg.release_oldest("b"), Some(Tid::from_raw(1)));
        assert_eq!(reg.release_oldest("a"), Some(Tid::from_raw(0)));
    }
}
