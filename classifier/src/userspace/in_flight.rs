//! The connection table shared by every worker.

use classifier_common::{ConnInfo, ConnTuple, InFlight};
use dashmap::DashMap;
use fxhash::FxBuildHasher;
use tracing::debug;

use crate::metrics;

/// Concurrent map from normalized tuple to classification state.
///
/// Behaves like a preallocated BPF hash map: once `max_entries` keys exist,
/// inserts of new keys are dropped while updates of existing keys still land.
/// The bound is approximate when several workers insert at the same moment.
pub struct InFlightTable {
    entries: DashMap<ConnTuple, ConnInfo, FxBuildHasher>,
    max_entries: usize,
}

impl InFlightTable {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::with_capacity_and_hasher(
                max_entries.min(4096),
                FxBuildHasher::default(),
            ),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn update(&self, tup: &ConnTuple, info: ConnInfo) {
        if let Some(mut entry) = self.entries.get_mut(tup) {
            *entry = info;
            return;
        }
        if self.entries.len() >= self.max_entries {
            debug!(
                event.name = "in_flight.full",
                max_entries = self.max_entries,
                "in-flight table full, dropping insert"
            );
            metrics::inc_in_flight_update_failures();
            return;
        }
        self.entries.insert(*tup, info);
    }
}

impl InFlight for InFlightTable {
    fn lookup(&self, tup: &ConnTuple) -> Option<ConnInfo> {
        self.entries.get(tup).map(|entry| *entry)
    }

    fn mark_done(&self, tup: &ConnTuple) {
        self.update(tup, ConnInfo::DONE);
    }

    fn mark_failed(&self, tup: &ConnTuple) {
        self.update(tup, ConnInfo::FAILED);
    }

    fn evict(&self, tup: &ConnTuple) {
        self.entries.remove(tup);
    }
}
