//! Snapshot Storage
//!
//! The store is an append-only log: there is no update or delete path.
//! Implementations must return `all()` ordered by team name, then by
//! ascending capture time.

use crate::models::Snapshot;
use anyhow::{bail, Result};
use parking_lot::RwLock;
use std::cmp::Ordering;

pub trait SnapshotStore: Send + Sync {
    /// Write one immutable row. Fails if `(team_name, captured_at)` exists.
    fn append(&self, snapshot: &Snapshot) -> Result<()>;

    /// Write many rows in one go, ignoring ones whose identity already
    /// exists. Returns the number of rows written.
    fn append_batch(&self, snapshots: &[Snapshot]) -> Result<usize>;

    /// Latest observation for a team by capture time
    fn most_recent(&self, team_name: &str) -> Result<Option<Snapshot>>;

    /// Full history ordered by team name, then capture time
    fn all(&self) -> Result<Vec<Snapshot>>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

/// History ordering shared by every store
pub(crate) fn history_order(a: &Snapshot, b: &Snapshot) -> Ordering {
    a.team_name
        .cmp(&b.team_name)
        .then(a.captured_at.cmp(&b.captured_at))
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemorySnapshotStore {
    snapshots: RwLock<Vec<Snapshot>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn contains(snapshots: &[Snapshot], candidate: &Snapshot) -> bool {
        snapshots
            .iter()
            .any(|s| s.team_name == candidate.team_name && s.captured_at == candidate.captured_at)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn append(&self, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.write();
        if Self::contains(&snapshots, snapshot) {
            bail!(
                "snapshot for {} at {} already exists",
                snapshot.team_name,
                snapshot.captured_at
            );
        }
        snapshots.push(snapshot.clone());
        Ok(())
    }

    fn append_batch(&self, batch: &[Snapshot]) -> Result<usize> {
        let mut snapshots = self.snapshots.write();
        let mut inserted = 0usize;
        for snapshot in batch {
            if !Self::contains(&snapshots, snapshot) {
                snapshots.push(snapshot.clone());
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn most_recent(&self, team_name: &str) -> Result<Option<Snapshot>> {
        Ok(self
            .snapshots
            .read()
            .iter()
            .filter(|s| s.team_name == team_name)
            .max_by_key(|s| s.captured_at)
            .cloned())
    }

    fn all(&self) -> Result<Vec<Snapshot>> {
        let mut all = self.snapshots.read().clone();
        all.sort_by(history_order);
        Ok(all)
    }

    fn len(&self) -> Result<usize> {
        Ok(self.snapshots.read().len())
    }
}
