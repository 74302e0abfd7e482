//! Single-flight cycle scheduling
//!
//! Timer ticks and manual triggers both go through `IngestScheduler::trigger`,
//! which refuses to start a cycle while another is running. That keeps the
//! read-compare-write of each team free of interleaving.

use crate::error::IngestError;
use crate::ingest::IngestPipeline;
use crate::models::CycleReport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, warn};

#[derive(Debug)]
pub enum TriggerOutcome {
    Ran(Result<CycleReport, IngestError>),
    /// Another cycle was in flight; nothing was done
    Busy,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CycleOutcome {
    Completed { report: CycleReport },
    Failed { stage: String, error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleStatus {
    pub finished_at: DateTime<Utc>,
    #[serde(flatten)]
    pub outcome: CycleOutcome,
}

pub struct IngestScheduler {
    pipeline: Arc<IngestPipeline>,
    /// One permit; held for the duration of a cycle
    in_flight: Semaphore,
    last_status: RwLock<Option<CycleStatus>>,
}

impl IngestScheduler {
    pub fn new(pipeline: Arc<IngestPipeline>) -> Self {
        Self {
            pipeline,
            in_flight: Semaphore::new(1),
            last_status: RwLock::new(None),
        }
    }

    pub fn pipeline(&self) -> &Arc<IngestPipeline> {
        &self.pipeline
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.available_permits() == 0
    }

    pub fn last_status(&self) -> Option<CycleStatus> {
        self.last_status.read().clone()
    }

    /// Run one cycle now unless one is already running
    pub async fn trigger(&self) -> TriggerOutcome {
        let Ok(_permit) = self.in_flight.try_acquire() else {
            return TriggerOutcome::Busy;
        };

        let result = self.pipeline.run_cycle().await;

        let outcome = match &result {
            Ok(report) => CycleOutcome::Completed {
                report: report.clone(),
            },
            Err(e) => {
                error!(stage = e.stage(), error = %e, "🛑 Ingest cycle failed");
                CycleOutcome::Failed {
                    stage: e.stage().to_string(),
                    error: e.to_string(),
                }
            }
        };
        *self.last_status.write() = Some(CycleStatus {
            finished_at: Utc::now(),
            outcome,
        });

        TriggerOutcome::Ran(result)
    }

    /// Run `trigger` every `period`. The first cycle starts immediately when
    /// `run_immediately` is set, otherwise after one period.
    pub fn spawn_interval(
        self: &Arc<Self>,
        period: Duration,
        run_immediately: bool,
    ) -> JoinHandle<()> {
        let scheduler = Arc::clone(self);
        tokio::spawn(async move {
            let start = if run_immediately {
                Instant::now()
            } else {
                Instant::now() + period
            };
            let mut ticker = interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                "⏱️ Scheduled ingest every {}s from {}",
                period.as_secs(),
                scheduler.pipeline.source_location()
            );

            loop {
                ticker.tick().await;
                if let TriggerOutcome::Busy = scheduler.trigger().await {
                    warn!("Scheduled cycle skipped: another cycle is still running");
                }
            }
        })
    }
}
