use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use crate::types::{Snapshot, TimeWindow};

/// Thread-safe store of the last good snapshot per selection.
///
/// Used only as the stale-data fallback when a fetch fails or times out.
/// Holds at most `capacity` selections; the least recently stored one is
/// evicted first.
#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<StoreInner>>,
}

struct StoreInner {
    snapshots: HashMap<SelectionKey, Arc<Snapshot>>,
    order: VecDeque<SelectionKey>,
    capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SelectionKey {
    window: TimeWindow,
    machines: Vec<String>,
}

impl SelectionKey {
    fn new<S: AsRef<str>>(machines: &[S], window: TimeWindow) -> Self {
        let mut machines: Vec<String> = machines.iter().map(|m| m.as_ref().to_string()).collect();
        machines.sort();
        machines.dedup();
        Self { window, machines }
    }
}

impl SnapshotStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreInner {
                snapshots: HashMap::new(),
                order: VecDeque::new(),
                capacity: capacity.max(1),
            })),
        }
    }

    /// Remember `snapshot` as the latest good data for its own selection
    pub fn remember(&self, snapshot: Arc<Snapshot>) {
        let key = SelectionKey::new(&snapshot.machines, snapshot.window);
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);

        if inner.snapshots.insert(key.clone(), snapshot).is_some() {
            inner.order.retain(|k| k != &key);
        }
        inner.order.push_back(key);

        while inner.order.len() > inner.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.snapshots.remove(&evicted);
            }
        }
    }

    pub fn last_known<S: AsRef<str>>(&self, machines: &[S], window: TimeWindow) -> Option<Arc<Snapshot>> {
        let key = SelectionKey::new(machines, window);
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.snapshots.get(&key).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(machines: &[&str], window: TimeWindow) -> Arc<Snapshot> {
        Arc::new(Snapshot::new(
            window,
            machines.iter().map(|m| m.to_string()).collect(),
            vec![],
        ))
    }

    #[test]
    fn lookup_ignores_selection_order() {
        let store = SnapshotStore::new(4);
        store.remember(snap(&["M001", "M002"], TimeWindow::LastDay));
        assert!(store.last_known(&["M002", "M001"], TimeWindow::LastDay).is_some());
        assert!(store.last_known(&["M001", "M002"], TimeWindow::LastHour).is_none());
        assert!(store.last_known(&["M001"], TimeWindow::LastDay).is_none());
    }

    #[test]
    fn newer_snapshot_replaces_older() {
        let store = SnapshotStore::new(4);
        let first = snap(&["M001"], TimeWindow::LastHour);
        let second = snap(&["M001"], TimeWindow::LastHour);
        store.remember(first);
        store.remember(second.clone());
        assert_eq!(store.len(), 1);
        let found = store.last_known(&["M001"], TimeWindow::LastHour).unwrap();
        assert!(Arc::ptr_eq(&found, &second));
    }

    #[test]
    fn evicts_least_recently_stored() {
        let store = SnapshotStore::new(2);
        store.remember(snap(&["M001"], TimeWindow::LastHour));
        store.remember(snap(&["M002"], TimeWindow::LastHour));
        store.remember(snap(&["M001"], TimeWindow::LastHour));
        store.remember(snap(&["M003"], TimeWindow::LastHour));
        assert_eq!(store.len(), 2);
        assert!(store.last_known(&["M002"], TimeWindow::LastHour).is_none());
        assert!(store.last_known(&["M001"], TimeWindow::LastHour).is_some());
        assert!(store.last_known(&["M003"], TimeWindow::LastHour).is_some());
    }
}
