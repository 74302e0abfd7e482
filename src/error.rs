//! Error taxonomy for the ingestion pipeline
//!
//! `IngestError` covers failures that end a cycle (or, for persistence,
//! stop it part way). `RowError` covers a single table row and never
//! aborts the cycle.

use crate::models::ProbabilityField;
use std::fmt;

#[derive(Debug)]
pub enum IngestError {
    /// Network or HTTP status failure. No state was changed.
    Fetch { url: String, reason: String },
    /// The page no longer has the shape the table schema expects.
    Structural(String),
    /// The store rejected a read or write. Teams handled before this one
    /// in the same cycle keep their writes.
    Persistence { team: String, source: anyhow::Error },
}

impl IngestError {
    pub fn fetch(url: &str, reason: impl fmt::Display) -> Self {
        Self::Fetch {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn persistence(team: &str, source: anyhow::Error) -> Self {
        Self::Persistence {
            team: team.to_string(),
            source,
        }
    }

    /// Pipeline stage the failure is attributed to
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "fetch",
            Self::Structural(_) => "extract",
            Self::Persistence { .. } => "persist",
        }
    }

    /// Fetch and structural failures happen before any team is looked at
    pub fn is_cycle_wide(&self) -> bool {
        !matches!(self, Self::Persistence { .. })
    }
}

impl fmt::Display for IngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fetch { url, reason } => write!(f, "fetch failed for {}: {}", url, reason),
            Self::Structural(reason) => write!(f, "unexpected page structure: {}", reason),
            Self::Persistence { team, source } => {
                write!(f, "store error while processing {}: {:#}", team, source)
            }
        }
    }
}

impl std::error::Error for IngestError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Persistence { source, .. } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Why a single table row was not recorded
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    InsufficientCells { found: usize, required: usize },
    EmptyTeamName,
    InvalidProbability { field: ProbabilityField, text: String },
    OutOfRange { field: ProbabilityField, value: f64 },
    DuplicateTeam,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientCells { found, required } => {
                write!(f, "row has {} cells (need at least {})", found, required)
            }
            Self::EmptyTeamName => write!(f, "team name cell is empty"),
            Self::InvalidProbability { field, text } => {
                write!(f, "{} is not a percentage: {:?}", field, text)
            }
            Self::OutOfRange { field, value } => {
                write!(f, "{} = {} is outside [0, 1]", field, value)
            }
            Self::DuplicateTeam => write!(f, "team already seen earlier in this cycle"),
        }
    }
}

impl std::error::Error for RowError {}
