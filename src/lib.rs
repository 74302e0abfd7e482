//! Playoff Odds Backend Library
//!
//! Tracks postseason probabilities scraped from a public standings page and
//! keeps an append-only history of every change, per team.
//!
//! Write path: `scrapers` (fetch, extract, normalize) → `history::detector`
//! → `history::recorder`, driven by `ingest::IngestPipeline`.
//! Read path: `history::series` over a `history::SnapshotStore`.

pub mod api;
pub mod config;
pub mod error;
pub mod history;
pub mod ingest;
pub mod models;
pub mod scheduler;
pub mod scrapers;

pub use error::{IngestError, RowError};
pub use ingest::IngestPipeline;
pub use models::{CycleReport, Probabilities, ProbabilityField, Snapshot};
