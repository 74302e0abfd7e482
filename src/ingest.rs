//! Ingestion cycle
//!
//! Fetch → extract → normalize → detect change → record. One call to
//! `run_cycle` is one cycle. Callers must not run two cycles at once against
//! the same store (see `scheduler::IngestScheduler`).

use crate::error::{IngestError, RowError};
use crate::history::{ChangeDetector, Recorder, SnapshotStore};
use crate::models::{cycle_timestamp, CycleReport, RowSkip};
use crate::scrapers::{extract_rows, normalize_row, PageSource, TableSchema};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Teams in the league; a cycle seeing a different count is logged
pub const DEFAULT_EXPECTED_TEAMS: usize = 32;

pub struct IngestPipeline {
    source: Arc<dyn PageSource>,
    store: Arc<dyn SnapshotStore>,
    schema: TableSchema,
    detector: ChangeDetector,
    expected_teams: usize,
}

impl IngestPipeline {
    pub fn new(source: Arc<dyn PageSource>, store: Arc<dyn SnapshotStore>) -> Self {
        Self {
            source,
            store,
            schema: TableSchema::default(),
            detector: ChangeDetector::default(),
            expected_teams: DEFAULT_EXPECTED_TEAMS,
        }
    }

    pub fn with_schema(mut self, schema: TableSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn with_detector(mut self, detector: ChangeDetector) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_expected_teams(mut self, expected_teams: usize) -> Self {
        self.expected_teams = expected_teams;
        self
    }

    pub fn store(&self) -> &Arc<dyn SnapshotStore> {
        &self.store
    }

    pub fn source_location(&self) -> &str {
        self.source.location()
    }

    /// Run one full cycle against the configured source
    pub async fn run_cycle(&self) -> Result<CycleReport, IngestError> {
        // Check the layout contract before spending a request on it
        self.schema.validate()?;

        let html = self.source.fetch().await.map_err(|e| {
            warn!(source = self.source.location(), error = %e, "❌ Fetch failed, cycle aborted");
            e
        })?;

        self.ingest_document(&html, cycle_timestamp())
    }

    /// Process an already-fetched document. Every snapshot written carries
    /// `captured_at`.
    pub fn ingest_document(
        &self,
        html: &str,
        captured_at: DateTime<Utc>,
    ) -> Result<CycleReport, IngestError> {
        let table = extract_rows(html, &self.schema).map_err(|e| {
            warn!(
                schema = %self.schema.label(),
                error = %e,
                "❌ Table extraction failed, cycle aborted"
            );
            e
        })?;

        let mut report = CycleReport::new(captured_at);
        report.rows_seen = table.rows_seen;
        report.non_data_rows = table.non_data_rows;
        report.skipped = table.rejected;

        let recorder = Recorder::new(self.store.as_ref(), captured_at);
        let mut seen: HashSet<String> = HashSet::with_capacity(table.rows.len());

        for raw in &table.rows {
            let row = match normalize_row(raw) {
                Ok(row) => row,
                Err(reason) => {
                    warn!(team = %raw.team, row_index = raw.row_index, %reason, "Skipping row");
                    report.skipped.push(RowSkip {
                        row_index: raw.row_index,
                        team: Some(raw.team.clone()),
                        reason: reason.to_string(),
                    });
                    continue;
                }
            };

            if !seen.insert(row.team.clone()) {
                warn!(team = %row.team, row_index = row.row_index, "Duplicate team row");
                report.skipped.push(RowSkip {
                    row_index: row.row_index,
                    team: Some(row.team),
                    reason: RowError::DuplicateTeam.to_string(),
                });
                continue;
            }

            let p = &row.probabilities;
            debug!(
                team = %row.team,
                make_playoffs = p.make_playoffs,
                win_division = p.win_division,
                first_round_bye = p.first_round_bye,
                win_conference = p.win_conference,
                win_super_bowl = p.win_super_bowl,
                "Parsed team row"
            );

            let prior = self
                .store
                .most_recent(&row.team)
                .map_err(|e| IngestError::persistence(&row.team, e))?;

            if self.detector.has_changed(&row.probabilities, prior.as_ref()) {
                recorder.record(&row.team, row.probabilities)?;
                report.recorded.push(row.team);
            } else {
                report.unchanged.push(row.team);
            }
        }

        let observed = report.teams_observed();
        if observed != self.expected_teams {
            warn!(
                observed,
                expected = self.expected_teams,
                "⚠️ Unexpected number of teams in source table"
            );
        }

        info!(
            captured_at = %captured_at,
            recorded = report.recorded.len(),
            unchanged = report.unchanged.len(),
            skipped = report.skipped.len(),
            "✅ Ingest cycle complete"
        );

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::MemorySnapshotStore;
    use crate::models::{Probabilities, Snapshot};
    use crate::scrapers::StaticPageSource;
    use anyhow::{bail, Result};

    fn page(rows: &[(&str, [&str; 5])]) -> String {
        let body: String = rows
            .iter()
            .map(|(team, p)| {
                format!(
                    "<tr><td>{}</td><td>9</td><td>3</td><td>0</td><td>.750</td>\
                     <td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                    team, p[0], p[1], p[2], p[3], p[4]
                )
            })
            .collect();
        format!(
            "<table><tr><th>Standings</th></tr><tr><th>Team</th></tr>{}</table>",
            body
        )
    }

    fn pipeline(html: String) -> (IngestPipeline, Arc<MemorySnapshotStore>) {
        let store = Arc::new(MemorySnapshotStore::new());
        let source = Arc::new(StaticPageSource::new("fixture", html));
        (IngestPipeline::new(source, store.clone()), store)
    }

    #[tokio::test]
    async fn test_bad_rows_do_not_abort_cycle() {
        let (pipeline, store) = pipeline(page(&[
            ("Chiefs", ["90%", "50%", "30%", "20%", "10%"]),
            ("Jets", ["n/a", "1%", "1%", "1%", "0%"]),
            ("49'ers", [">99%", "80%", "60%", "40%", "25%"]),
        ]));

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.recorded, vec!["Chiefs", "49ers"]);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].team.as_deref(), Some("Jets"));
        assert_eq!(store.len().unwrap(), 2);
        assert!(store.most_recent("49'ers").unwrap().is_none());
        assert_eq!(
            store.most_recent("49ers").unwrap().unwrap().probabilities.make_playoffs,
            0.99
        );
    }

    #[tokio::test]
    async fn test_alias_and_canonical_rows_are_one_team() {
        let (pipeline, store) = pipeline(page(&[
            ("49ers", ["90%", "50%", "30%", "20%", "10%"]),
            ("49'ers", ["91%", "50%", "30%", "20%", "10%"]),
        ]));

        let report = pipeline.run_cycle().await.unwrap();
        assert_eq!(report.recorded, vec!["49ers"]);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("already seen"));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_all_writes_share_captured_at() {
        let (pipeline, store) = pipeline(page(&[
            ("Chiefs", ["90%", "50%", "30%", "20%", "10%"]),
            ("Bills", ["80%", "60%", "30%", "20%", "10%"]),
            ("Ravens", ["70%", "40%", "10%", "5%", "2%"]),
        ]));

        let report = pipeline.run_cycle().await.unwrap();
        let all = store.all().unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|s| s.captured_at == report.captured_at));
    }

    #[tokio::test]
    async fn test_structural_failure_writes_nothing() {
        let (pipeline, store) = pipeline("<html><body>Down for maintenance</body></html>".into());
        let err = pipeline.run_cycle().await.unwrap_err();
        assert!(matches!(err, IngestError::Structural(_)));
        assert!(store.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_invalid_schema_fails_before_fetch() {
        struct PanicSource;

        #[async_trait::async_trait]
        impl PageSource for PanicSource {
            fn location(&self) -> &str {
                "panic"
            }
            async fn fetch(&self) -> Result<String, IngestError> {
                panic!("fetch must not run with an invalid schema");
            }
        }

        let mut schema = TableSchema::default();
        schema.probability_columns[0].index = 6;

        let pipeline =
            IngestPipeline::new(Arc::new(PanicSource), Arc::new(MemorySnapshotStore::new()))
                .with_schema(schema);
        let err = pipeline.run_cycle().await.unwrap_err();
        assert_eq!(err.stage(), "extract");
    }

    /// Store whose writes fail for one team
    struct FailingStore {
        inner: MemorySnapshotStore,
        poisoned: &'static str,
    }

    impl SnapshotStore for FailingStore {
        fn append(&self, snapshot: &Snapshot) -> Result<()> {
            if snapshot.team_name == self.poisoned {
                bail!("disk I/O error");
            }
            self.inner.append(snapshot)
        }
        fn append_batch(&self, snapshots: &[Snapshot]) -> Result<usize> {
            self.inner.append_batch(snapshots)
        }
        fn most_recent(&self, team_name: &str) -> Result<Option<Snapshot>> {
            self.inner.most_recent(team_name)
        }
        fn all(&self) -> Result<Vec<Snapshot>> {
            self.inner.all()
        }
        fn len(&self) -> Result<usize> {
            self.inner.len()
        }
    }

    #[tokio::test]
    async fn test_persistence_failure_keeps_earlier_writes() {
        let store = Arc::new(FailingStore {
            inner: MemorySnapshotStore::new(),
            poisoned: "Bills",
        });
        let source = Arc::new(StaticPageSource::new(
            "fixture",
            page(&[
                ("Chiefs", ["90%", "50%", "30%", "20%", "10%"]),
                ("Bills", ["80%", "60%", "30%", "20%", "10%"]),
                ("Ravens", ["70%", "40%", "10%", "5%", "2%"]),
            ]),
        ));
        let pipeline = IngestPipeline::new(source, store.clone());

        let err = pipeline.run_cycle().await.unwrap_err();
        match err {
            IngestError::Persistence { team, .. } => assert_eq!(team, "Bills"),
            other => panic!("unexpected error: {other}"),
        }
        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].team_name, "Chiefs");
    }

    #[tokio::test]
    async fn test_ingest_document_uses_given_timestamp() {
        let (pipeline, store) = pipeline(String::new());
        let ts = cycle_timestamp();
        let html = page(&[("Lions", ["95%", "70%", "50%", "30%", "18%"])]);

        let report = pipeline.ingest_document(&html, ts).unwrap();
        assert_eq!(report.captured_at, ts);
        assert_eq!(
            store.most_recent("Lions").unwrap().unwrap().probabilities,
            Probabilities::new(0.95, 0.70, 0.50, 0.30, 0.18)
        );
    }
}
