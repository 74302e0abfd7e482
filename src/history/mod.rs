//! Snapshot history: change detection, recording, storage and series views

pub mod db_storage;
pub mod detector;
pub mod recorder;
pub mod series;
pub mod storage;

pub use db_storage::DbSnapshotStore;
pub use detector::{ChangeDetector, CHANGE_TOLERANCE};
pub use recorder::Recorder;
pub use series::{group_by_team, GroupedSeries, SeriesPoint, TeamSeries, TimeSeriesBuilder};
pub use storage::{MemorySnapshotStore, SnapshotStore};
