//! Cell text to canonical values

use crate::error::RowError;
use crate::models::{Probabilities, ProbabilityField};
use crate::scrapers::playoff_status::RawRow;

/// Source spellings that differ from the name we store
const TEAM_ALIASES: &[(&str, &str)] = &[("49'ers", "49ers"), ("49\u{2019}ers", "49ers")];

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    pub row_index: usize,
    pub team: String,
    pub probabilities: Probabilities,
}

pub fn canonical_team_name(raw: &str) -> String {
    let name = raw.trim();
    TEAM_ALIASES
        .iter()
        .find(|(alias, _)| *alias == name)
        .map(|(_, canonical)| (*canonical).to_string())
        .unwrap_or_else(|| name.to_string())
}

/// Parse percentage text such as `"57%"`, `">99%"` or `""` into a fraction.
///
/// Returns `None` when the remaining text is not a finite number.
pub fn parse_probability(text: &str) -> Option<f64> {
    let s = text.trim();
    let s = s.strip_prefix('>').unwrap_or(s).trim_start();
    let s = s.strip_suffix('%').unwrap_or(s).trim_end();

    if s.is_empty() {
        return Some(0.0);
    }

    s.parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(|v| v / 100.0)
}

pub fn normalize_row(raw: &RawRow) -> Result<NormalizedRow, RowError> {
    let team = canonical_team_name(&raw.team);
    if team.is_empty() {
        return Err(RowError::EmptyTeamName);
    }

    let mut probabilities = Probabilities::default();
    for field in ProbabilityField::ALL {
        let text = raw.cell(field);
        let value = parse_probability(text).ok_or_else(|| RowError::InvalidProbability {
            field,
            text: text.to_string(),
        })?;
        probabilities.set(field, value);
    }

    if let Some((field, value)) = probabilities.first_out_of_range() {
        return Err(RowError::OutOfRange { field, value });
    }

    Ok(NormalizedRow {
        row_index: raw.row_index,
        team,
        probabilities,
    })
}
