//! Domain types for the playoff-probability history

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The five postseason outcomes tracked for every team, in source column order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbabilityField {
    MakePlayoffs,
    WinDivision,
    FirstRoundBye,
    WinConference,
    WinSuperBowl,
}

impl ProbabilityField {
    pub const ALL: [ProbabilityField; 5] = [
        ProbabilityField::MakePlayoffs,
        ProbabilityField::WinDivision,
        ProbabilityField::FirstRoundBye,
        ProbabilityField::WinConference,
        ProbabilityField::WinSuperBowl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbabilityField::MakePlayoffs => "make_playoffs",
            ProbabilityField::WinDivision => "win_division",
            ProbabilityField::FirstRoundBye => "first_round_bye",
            ProbabilityField::WinConference => "win_conference",
            ProbabilityField::WinSuperBowl => "win_super_bowl",
        }
    }
}

impl fmt::Display for ProbabilityField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One team's five probabilities, each a fraction in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Probabilities {
    pub make_playoffs: f64,
    pub win_division: f64,
    pub first_round_bye: f64,
    pub win_conference: f64,
    pub win_super_bowl: f64,
}

impl Probabilities {
    pub fn new(
        make_playoffs: f64,
        win_division: f64,
        first_round_bye: f64,
        win_conference: f64,
        win_super_bowl: f64,
    ) -> Self {
        Self {
            make_playoffs,
            win_division,
            first_round_bye,
            win_conference,
            win_super_bowl,
        }
    }

    #[inline]
    pub fn get(&self, field: ProbabilityField) -> f64 {
        match field {
            ProbabilityField::MakePlayoffs => self.make_playoffs,
            ProbabilityField::WinDivision => self.win_division,
            ProbabilityField::FirstRoundBye => self.first_round_bye,
            ProbabilityField::WinConference => self.win_conference,
            ProbabilityField::WinSuperBowl => self.win_super_bowl,
        }
    }

    #[inline]
    pub fn set(&mut self, field: ProbabilityField, value: f64) {
        match field {
            ProbabilityField::MakePlayoffs => self.make_playoffs = value,
            ProbabilityField::WinDivision => self.win_division = value,
            ProbabilityField::FirstRoundBye => self.first_round_bye = value,
            ProbabilityField::WinConference => self.win_conference = value,
            ProbabilityField::WinSuperBowl => self.win_super_bowl = value,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProbabilityField, f64)> + '_ {
        ProbabilityField::ALL.into_iter().map(|f| (f, self.get(f)))
    }

    /// First field that is not a finite fraction in [0, 1], if any
    pub fn first_out_of_range(&self) -> Option<(ProbabilityField, f64)> {
        self.iter().find(|(_, v)| !(0.0..=1.0).contains(v))
    }
}

/// One immutable observation of a team's probabilities.
///
/// Identity is `(team_name, captured_at)`. Serialized with the capture time
/// under `timestamp` so exports stay compatible with earlier backups; both
/// keys are accepted on import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub team_name: String,
    #[serde(flatten)]
    pub probabilities: Probabilities,
    #[serde(rename = "timestamp", alias = "captured_at")]
    pub captured_at: DateTime<Utc>,
}

impl Snapshot {
    pub fn new(
        team_name: impl Into<String>,
        probabilities: Probabilities,
        captured_at: DateTime<Utc>,
    ) -> Self {
        Self {
            team_name: team_name.into(),
            probabilities,
            captured_at,
        }
    }
}

/// Capture time for a new cycle, truncated to the microsecond precision the
/// store persists so values round-trip exactly.
pub fn cycle_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// A data row that was dropped during a cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowSkip {
    pub row_index: usize,
    pub team: Option<String>,
    pub reason: String,
}

/// Outcome of one successful ingestion cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleReport {
    pub captured_at: DateTime<Utc>,
    /// Rows after the header rows, including non-data rows
    pub rows_seen: usize,
    /// Rows with too few cells, skipped silently
    pub non_data_rows: usize,
    pub recorded: Vec<String>,
    pub unchanged: Vec<String>,
    pub skipped: Vec<RowSkip>,
}

impl CycleReport {
    pub fn new(captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            rows_seen: 0,
            non_data_rows: 0,
            recorded: Vec::new(),
            unchanged: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Teams that parsed cleanly this cycle, recorded or not
    pub fn teams_observed(&self) -> usize {
        self.recorded.len() + self.unchanged.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_field_order_matches_struct() {
        let p = Probabilities::new(0.9, 0.5, 0.3, 0.2, 0.1);
        let values: Vec<f64> = p.iter().map(|(_, v)| v).collect();
        assert_eq!(values, vec![0.9, 0.5, 0.3, 0.2, 0.1]);
    }

    #[test]
    fn test_out_of_range_detection() {
        let mut p = Probabilities::new(0.9, 0.5, 0.3, 0.2, 0.1);
        assert!(p.first_out_of_range().is_none());

        p.set(ProbabilityField::WinConference, 1.2);
        assert_eq!(
            p.first_out_of_range(),
            Some((ProbabilityField::WinConference, 1.2))
        );

        p.set(ProbabilityField::WinConference, f64::NAN);
        assert!(p.first_out_of_range().is_some());
    }

    #[test]
    fn test_snapshot_serializes_timestamp_key() {
        let ts = Utc.with_ymd_and_hms(2024, 11, 3, 18, 0, 0).unwrap();
        let snapshot = Snapshot::new("Chiefs", Probabilities::new(0.9, 0.5, 0.3, 0.2, 0.1), ts);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["team_name"], "Chiefs");
        assert_eq!(json["make_playoffs"], 0.9);
        assert_eq!(json["win_super_bowl"], 0.1);
        assert_eq!(json["timestamp"], "2024-11-03T18:00:00Z");
        assert!(json.get("captured_at").is_none());
    }

    #[test]
    fn test_snapshot_accepts_offset_timestamps() {
        let raw = r#"{
            "team_name": "Bills",
            "make_playoffs": 0.75,
            "win_division": 0.5,
            "first_round_bye": 0.25,
            "win_conference": 0.1,
            "win_super_bowl": 0.05,
            "timestamp": "2024-10-01T12:30:00.123456+00:00"
        }"#;
        let snapshot: Snapshot = serde_json::from_str(raw).unwrap();
        assert_eq!(snapshot.team_name, "Bills");
        assert_eq!(snapshot.probabilities.first_round_bye, 0.25);
        assert_eq!(snapshot.captured_at.timestamp_subsec_micros(), 123_456);
    }

    #[test]
    fn test_cycle_timestamp_has_micro_precision() {
        let ts = cycle_timestamp();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000, 0);
    }
}
