//! Payout resolution engine.
//!
//! The `engine` module turns a [`SpreadsheetSnapshot`] and a walker's
//! FEID into a [`PayoutRecord`].  It finds the identifier column, picks
//! the walker's row, maps the recognised header labels onto the
//! canonical payout fields and computes the signed total.  Batches of
//! lookups are spread across CPU cores with [`rayon`].

use crate::error::LookupError;
use crate::models::{
    CellValue, ColumnMapping, PayoutBreakdown, PayoutField, PayoutRecord, SpreadsheetSnapshot,
};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, warn};

/// How unparseable numbers in mapped columns are handled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NumericMode {
    /// Malformed cells count as 0 and are reported as warnings.
    #[default]
    Lenient,
    /// The first malformed cell fails the lookup.
    Strict,
}

/// What to do when more than one row carries the requested FEID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Use the topmost matching row.
    #[default]
    FirstMatch,
    /// Fail with [`LookupError::DuplicateIdentifier`].
    Reject,
}

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub mapping: ColumnMapping,
    pub numeric: NumericMode,
    pub duplicates: DuplicatePolicy,
}

/// A mapped cell whose content could not be read as a number.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellWarning {
    pub column: String,
    pub field: PayoutField,
    pub raw: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub record: PayoutRecord,
    /// Empty unless lenient parsing zeroed out a malformed cell.
    pub warnings: Vec<CellWarning>,
}

/// Looks up `identifier` using the standard column mapping, lenient
/// number parsing and first-match semantics.
pub fn resolve_payout(
    snapshot: &SpreadsheetSnapshot,
    identifier: &str,
) -> Result<PayoutRecord, LookupError> {
    resolve_payout_with(snapshot, identifier, &ResolveOptions::default()).map(|r| r.record)
}

/// Looks up `identifier` in `snapshot` under the given options.
pub fn resolve_payout_with(
    snapshot: &SpreadsheetSnapshot,
    identifier: &str,
    options: &ResolveOptions,
) -> Result<Resolution, LookupError> {
    let wanted = identifier.trim();
    if wanted.is_empty() {
        return Err(LookupError::EmptyIdentifier);
    }
    if !snapshot.has_data() {
        return Err(LookupError::EmptySheet);
    }
    let headers = snapshot.header().unwrap_or(&[]);
    let id_column = find_identifier_column(headers).ok_or(LookupError::IdentifierColumnMissing)?;
    debug!(column = id_column, "identifier column located");

    let row = find_row(snapshot.data_rows(), id_column, wanted, options.duplicates)?;

    let mut breakdown = PayoutBreakdown::default();
    let mut warnings = Vec::new();
    for (index, header) in headers.iter().enumerate() {
        let column = header.to_string();
        let Some(field) = options.mapping.field_for(&column) else {
            continue;
        };
        let Some(cell) = row.get(index) else {
            continue;
        };
        match try_parse_numeric_cell(cell) {
            Some(value) => breakdown.set(field, value),
            None => {
                let column = column.trim().to_string();
                let raw = cell.to_string();
                if options.numeric == NumericMode::Strict {
                    return Err(LookupError::MalformedCell { column, field, raw });
                }
                warn!(feid = wanted, %column, %raw, "non-numeric payout cell treated as 0");
                breakdown.set(field, 0.0);
                warnings.push(CellWarning { column, field, raw });
            }
        }
    }

    let record = PayoutRecord {
        feid: identifier.to_string(),
        breakdown,
        total_payout: total_payout(&breakdown),
    };
    Ok(Resolution { record, warnings })
}

/// Resolves several FEIDs against the same snapshot in parallel.  The
/// output keeps the order of `identifiers`.
pub fn resolve_many<S>(
    snapshot: &SpreadsheetSnapshot,
    identifiers: &[S],
    options: &ResolveOptions,
) -> Vec<(String, Result<PayoutRecord, LookupError>)>
where
    S: AsRef<str> + Sync,
{
    identifiers
        .par_iter()
        .map(|id| {
            let id = id.as_ref();
            let result = resolve_payout_with(snapshot, id, options).map(|r| r.record);
            (id.to_string(), result)
        })
        .collect()
}

/// Earnings minus deductions.  The sign of each component is fixed by
/// [`PayoutField::is_deduction`].
pub fn total_payout(breakdown: &PayoutBreakdown) -> f64 {
    let earnings: f64 = PayoutField::ALL
        .iter()
        .filter(|f| !f.is_deduction())
        .map(|f| breakdown.get(*f))
        .sum();
    let deductions: f64 = PayoutField::ALL
        .iter()
        .filter(|f| f.is_deduction())
        .map(|f| breakdown.get(*f))
        .sum();
    earnings - deductions
}

/// Leftmost header mentioning `feid` or `fe id`, ignoring case.
fn find_identifier_column(headers: &[CellValue]) -> Option<usize> {
    headers.iter().position(|h| {
        let label = h.to_string().trim().to_lowercase();
        label.contains("feid") || label.contains("fe id")
    })
}

fn find_row<'a>(
    rows: &'a [Vec<CellValue>],
    column: usize,
    wanted: &str,
    policy: DuplicatePolicy,
) -> Result<&'a [CellValue], LookupError> {
    let mut matches = rows.iter().enumerate().filter(|(_, row)| {
        row.get(column)
            .filter(|cell| !cell.is_empty())
            .is_some_and(|cell| cell.to_string().trim() == wanted)
    });
    let (first_index, first) = matches.next().ok_or(LookupError::IdentifierNotFound)?;
    if policy == DuplicatePolicy::Reject {
        let others: Vec<usize> = matches.map(|(i, _)| i).collect();
        if !others.is_empty() {
            // +2: one for the header row, one for 1-based numbering.
            let rows = std::iter::once(first_index)
                .chain(others)
                .map(|i| i + 2)
                .collect();
            return Err(LookupError::DuplicateIdentifier { rows });
        }
    }
    Ok(first.as_slice())
}

/// Reads a cell as a number, treating anything unreadable as 0.
pub fn parse_numeric_cell(cell: &CellValue) -> f64 {
    try_parse_numeric_cell(cell).unwrap_or(0.0)
}

/// Reads a cell as a number.  Blank cells are 0; `None` means the cell
/// holds text with no leading number once currency symbols, thousands
/// separators and whitespace are removed.
pub fn try_parse_numeric_cell(cell: &CellValue) -> Option<f64> {
    match cell {
        CellValue::Empty => Some(0.0),
        CellValue::Number(n) if n.is_nan() => None,
        CellValue::Number(n) => Some(*n),
        CellValue::Text(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            let cleaned: String = trimmed
                .chars()
                .filter(|c| !matches!(c, '₹' | '$' | ',') && !c.is_whitespace())
                .collect();
            leading_float(&cleaned)
        }
    }
}

/// Parses the longest numeric prefix of `s`, ignoring whatever follows
/// it, e.g. `"12.5abc"` reads as 12.5.
fn leading_float(s: &str) -> Option<f64> {
    let bytes = s.as_bytes();
    let len = bytes.len();
    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    if s[end..].starts_with("Infinity") {
        return Some(if s.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }

    let int_start = end;
    while end < len && bytes[end].is_ascii_digit() {
        end += 1;
    }
    let mut digits = end - int_start;
    if end < len && bytes[end] == b'.' {
        let frac_start = end + 1;
        let mut j = frac_start;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > frac_start {
            digits += j - frac_start;
            end = j;
        }
    }
    if digits == 0 {
        return None;
    }
    if end < len && matches!(bytes[end], b'e' | b'E') {
        let mut j = end + 1;
        if j < len && matches!(bytes[j], b'+' | b'-') {
            j += 1;
        }
        let exp_start = j;
        while j < len && bytes[j].is_ascii_digit() {
            j += 1;
        }
        if j > exp_start {
            end = j;
        }
    }
    s[..end].parse::<f64>().ok()
}
