//! Time-series views over the snapshot history
//!
//! Pure projections of stored rows: nothing here writes or caches.

use crate::history::storage::{history_order, SnapshotStore};
use crate::models::{ProbabilityField, Snapshot};
use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

/// One chart point: capture time and value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub x: DateTime<Utc>,
    pub y: f64,
}

/// Per-field point sequences for one team, ascending by time
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TeamSeries {
    pub make_playoffs: Vec<SeriesPoint>,
    pub win_division: Vec<SeriesPoint>,
    pub first_round_bye: Vec<SeriesPoint>,
    pub win_conference: Vec<SeriesPoint>,
    pub win_super_bowl: Vec<SeriesPoint>,
}

impl TeamSeries {
    pub fn field(&self, field: ProbabilityField) -> &[SeriesPoint] {
        match field {
            ProbabilityField::MakePlayoffs => &self.make_playoffs,
            ProbabilityField::WinDivision => &self.win_division,
            ProbabilityField::FirstRoundBye => &self.first_round_bye,
            ProbabilityField::WinConference => &self.win_conference,
            ProbabilityField::WinSuperBowl => &self.win_super_bowl,
        }
    }

    fn field_mut(&mut self, field: ProbabilityField) -> &mut Vec<SeriesPoint> {
        match field {
            ProbabilityField::MakePlayoffs => &mut self.make_playoffs,
            ProbabilityField::WinDivision => &mut self.win_division,
            ProbabilityField::FirstRoundBye => &mut self.first_round_bye,
            ProbabilityField::WinConference => &mut self.win_conference,
            ProbabilityField::WinSuperBowl => &mut self.win_super_bowl,
        }
    }

    fn push(&mut self, snapshot: &Snapshot) {
        for (field, value) in snapshot.probabilities.iter() {
            self.field_mut(field).push(SeriesPoint {
                x: snapshot.captured_at,
                y: value,
            });
        }
    }

    /// Number of observations (every field has the same length)
    pub fn len(&self) -> usize {
        self.make_playoffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.make_playoffs.is_empty()
    }
}

/// Team name to series, keys in name order
pub type GroupedSeries = BTreeMap<String, TeamSeries>;

/// Reshape flat snapshots into per-team, per-field series
pub fn group_by_team(snapshots: &[Snapshot]) -> GroupedSeries {
    let mut ordered: Vec<&Snapshot> = snapshots.iter().collect();
    ordered.sort_by(|a, b| history_order(a, b));

    let mut grouped = GroupedSeries::new();
    for snapshot in ordered {
        grouped
            .entry(snapshot.team_name.clone())
            .or_default()
            .push(snapshot);
    }
    grouped
}

pub struct TimeSeriesBuilder<'a> {
    store: &'a dyn SnapshotStore,
}

impl<'a> TimeSeriesBuilder<'a> {
    pub fn new(store: &'a dyn SnapshotStore) -> Self {
        Self { store }
    }

    /// Per-team, per-field series for charting
    pub fn grouped(&self) -> Result<GroupedSeries> {
        Ok(group_by_team(&self.store.all()?))
    }

    /// Flat list of every snapshot in capture order (ties by team name)
    pub fn export(&self) -> Result<Vec<Snapshot>> {
        let mut all = self.store.all()?;
        all.sort_by(|a, b| {
            a.captured_at
                .cmp(&b.captured_at)
                .then_with(|| a.team_name.cmp(&b.team_name))
        });
        Ok(all)
    }
}
