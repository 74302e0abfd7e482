//! Recorder: writes new snapshots for one cycle
//!
//! Every snapshot written through the same `Recorder` carries the same
//! `captured_at`, so all teams changed in a cycle share one comparison point.

use crate::error::IngestError;
use crate::history::storage::SnapshotStore;
use crate::models::{Probabilities, Snapshot};
use chrono::{DateTime, Utc};
use tracing::debug;

pub struct Recorder<'a> {
    store: &'a dyn SnapshotStore,
    captured_at: DateTime<Utc>,
}

impl<'a> Recorder<'a> {
    pub fn new(store: &'a dyn SnapshotStore, captured_at: DateTime<Utc>) -> Self {
        Self { store, captured_at }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Append exactly one immutable snapshot
    pub fn record(
        &self,
        team: &str,
        probabilities: Probabilities,
    ) -> Result<Snapshot, IngestError> {
        let snapshot = Snapshot::new(team, probabilities, self.captured_at);
        self.store
            .append(&snapshot)
            .map_err(|e| IngestError::persistence(team, e))?;

        debug!(team, captured_at = %self.captured_at, "Snapshot recorded");
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::storage::MemorySnapshotStore;
    use crate::models::cycle_timestamp;

    #[test]
    fn test_records_share_cycle_timestamp() {
        let store = MemorySnapshotStore::new();
        let ts = cycle_timestamp();
        let recorder = Recorder::new(&store, ts);

        let a = recorder
            .record("Chiefs", Probabilities::new(0.9, 0.5, 0.3, 0.2, 0.1))
            .unwrap();
        let b = recorder
            .record("Bills", Probabilities::new(0.7, 0.4, 0.2, 0.1, 0.05))
            .unwrap();

        assert_eq!(a.captured_at, ts);
        assert_eq!(b.captured_at, ts);
        assert_eq!(recorder.captured_at(), ts);
        assert_eq!(store.len().unwrap(), 2);
    }

    #[test]
    fn test_store_failure_is_persistence_error() {
        let store = MemorySnapshotStore::new();
        let recorder = Recorder::new(&store, cycle_timestamp());
        let p = Probabilities::new(0.9, 0.5, 0.3, 0.2, 0.1);

        recorder.record("Chiefs", p).unwrap();
        let err = recorder.record("Chiefs", p).unwrap_err();
        assert!(matches!(err, IngestError::Persistence { ref team, .. } if team == "Chiefs"));
        assert_eq!(store.len().unwrap(), 1);
    }
}
