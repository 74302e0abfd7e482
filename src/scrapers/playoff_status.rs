//! Postseason probability table extraction
//!
//! Pulls raw cell text out of the page according to a `TableSchema`.
//! Numbers are left untouched here; see `normalize`.

use crate::error::{IngestError, RowError};
use crate::models::{ProbabilityField, RowSkip};
use crate::scrapers::schema::TableSchema;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

/// Raw text of one data row, probability cells in `ProbabilityField::ALL` order
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row_index: usize,
    pub team: String,
    pub cells: [String; 5],
}

impl RawRow {
    pub fn cell(&self, field: ProbabilityField) -> &str {
        let pos = ProbabilityField::ALL
            .iter()
            .position(|f| *f == field)
            .unwrap_or_default();
        &self.cells[pos]
    }
}

#[derive(Debug, Default)]
pub struct ExtractedTable {
    pub rows: Vec<RawRow>,
    pub rejected: Vec<RowSkip>,
    /// Rows after the headers, whether or not they hold data
    pub rows_seen: usize,
    pub non_data_rows: usize,
}

/// Locate the data table and read every row after the headers.
///
/// Fails the whole cycle when the table is missing or when not a single row
/// matches the schema, since either means the page layout moved.
pub fn extract_rows(html: &str, schema: &TableSchema) -> Result<ExtractedTable, IngestError> {
    schema.validate()?;

    let document = Html::parse_document(html);
    let table_sel = schema.table_selector()?;
    let row_sel = static_selector("tr")?;
    let cell_sel = static_selector("td")?;

    let table = document.select(&table_sel).next().ok_or_else(|| {
        IngestError::Structural(format!(
            "no element matches {:?}; the page layout may have changed",
            schema.table_selector
        ))
    })?;

    let mut extracted = ExtractedTable::default();

    for (row_index, row) in table.select(&row_sel).enumerate().skip(schema.header_rows) {
        extracted.rows_seen += 1;

        let cells: Vec<String> = row.select(&cell_sel).map(cell_text).collect();
        match read_row(row_index, &cells, schema) {
            Ok(raw) => extracted.rows.push(raw),
            Err(RowError::InsufficientCells { found, .. }) => {
                debug!(row_index, cells = found, "Skipping non-data row");
                extracted.non_data_rows += 1;
            }
            Err(reason) => {
                warn!(row_index, %reason, "Rejecting table row");
                extracted.rejected.push(RowSkip {
                    row_index,
                    team: None,
                    reason: reason.to_string(),
                });
            }
        }
    }

    if extracted.rows.is_empty() && extracted.rejected.is_empty() {
        return Err(IngestError::Structural(format!(
            "table has {} rows after the headers but none with {} cells (schema {})",
            extracted.rows_seen,
            schema.min_cells,
            schema.label()
        )));
    }

    Ok(extracted)
}

fn read_row(row_index: usize, cells: &[String], schema: &TableSchema) -> Result<RawRow, RowError> {
    if cells.len() < schema.min_cells {
        return Err(RowError::InsufficientCells {
            found: cells.len(),
            required: schema.min_cells,
        });
    }

    let team = cells[schema.team_column].clone();
    if team.is_empty() {
        return Err(RowError::EmptyTeamName);
    }

    let field_cells = ProbabilityField::ALL.map(|field| cells[schema.column(field)].clone());

    Ok(RawRow {
        row_index,
        team,
        cells: field_cells,
    })
}

/// Visible text of a cell with whitespace runs collapsed
fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text()
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn static_selector(css: &str) -> Result<Selector, IngestError> {
    Selector::parse(css)
        .map_err(|e| IngestError::Structural(format!("invalid selector {:?}: {}", css, e)))
}
