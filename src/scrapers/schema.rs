//! Table schema descriptor for the probability page
//!
//! Column positions are an external contract we do not control. They live
//! here as named, versioned data and are checked in one place
//! (`TableSchema::validate`) before any row is read.

use crate::error::IngestError;
use crate::models::ProbabilityField;
use scraper::Selector;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnSpec {
    pub field: ProbabilityField,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: &'static str,
    pub version: u32,
    /// CSS selector for the data table; the first match is used
    pub table_selector: &'static str,
    /// Leading `<tr>` rows that hold column headers
    pub header_rows: usize,
    /// Rows with fewer `<td>` cells are not data rows
    pub min_cells: usize,
    pub team_column: usize,
    pub probability_columns: [ColumnSpec; 5],
}

/// Layout of the postseason probability page as of the 2024 season
pub const PLAYOFF_STATUS_V1: TableSchema = TableSchema {
    name: "playoffstatus-postseason",
    version: 1,
    table_selector: "table",
    header_rows: 2,
    min_cells: 10,
    team_column: 0,
    probability_columns: [
        ColumnSpec {
            field: ProbabilityField::MakePlayoffs,
            index: 5,
        },
        ColumnSpec {
            field: ProbabilityField::WinDivision,
            index: 6,
        },
        ColumnSpec {
            field: ProbabilityField::FirstRoundBye,
            index: 7,
        },
        ColumnSpec {
            field: ProbabilityField::WinConference,
            index: 8,
        },
        ColumnSpec {
            field: ProbabilityField::WinSuperBowl,
            index: 9,
        },
    ],
};

impl Default for TableSchema {
    fn default() -> Self {
        PLAYOFF_STATUS_V1
    }
}

impl TableSchema {
    pub fn label(&self) -> String {
        format!("{} v{}", self.name, self.version)
    }

    /// Cell index holding `field`
    pub fn column(&self, field: ProbabilityField) -> usize {
        self.probability_columns
            .iter()
            .find(|c| c.field == field)
            .map(|c| c.index)
            .unwrap_or(usize::MAX)
    }

    pub fn table_selector(&self) -> Result<Selector, IngestError> {
        Selector::parse(self.table_selector).map_err(|e| {
            IngestError::Structural(format!(
                "schema {} has invalid table selector {:?}: {}",
                self.label(),
                self.table_selector,
                e
            ))
        })
    }

    /// Reject descriptors that could silently misassign columns
    pub fn validate(&self) -> Result<(), IngestError> {
        let invalid = |reason: String| {
            Err(IngestError::Structural(format!(
                "schema {} is inconsistent: {}",
                self.label(),
                reason
            )))
        };

        for field in ProbabilityField::ALL {
            let count = self
                .probability_columns
                .iter()
                .filter(|c| c.field == field)
                .count();
            if count != 1 {
                return invalid(format!("{} is mapped {} times", field, count));
            }
        }

        let mut indices: Vec<usize> = self.probability_columns.iter().map(|c| c.index).collect();
        indices.push(self.team_column);

        if let Some(max) = indices.iter().max() {
            if *max >= self.min_cells {
                return invalid(format!(
                    "column {} is beyond the {}-cell minimum",
                    max, self.min_cells
                ));
            }
        }

        indices.sort_unstable();
        if indices.windows(2).any(|w| w[0] == w[1]) {
            return invalid("two fields share a column".to_string());
        }

        self.table_selector()?;
        Ok(())
    }
}
