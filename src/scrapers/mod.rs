//! Ingestion source: fetch the standings page and turn its table into rows

pub mod normalize;
pub mod playoff_status; // Extractor for the postseason probability table
pub mod schema;
pub mod source;

pub use normalize::{canonical_team_name, normalize_row, parse_probability, NormalizedRow};
pub use playoff_status::{extract_rows, ExtractedTable, RawRow};
pub use schema::{ColumnSpec, TableSchema, PLAYOFF_STATUS_V1};
pub use source::{HttpPageSource, PageSource, StaticPageSource, DEFAULT_SOURCE_URL};
