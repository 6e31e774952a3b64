//! Error types for payout lookup and sheet access.
//!
//! Every variant is a reportable condition.  The HTTP layer turns them
//! into `{"error": ...}` bodies using their `Display` text, so the
//! messages below are part of the public JSON contract.

use crate::models::PayoutField;
use thiserror::Error;

/// Reasons a payout lookup can fail.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LookupError {
    #[error("FEID is required")]
    EmptyIdentifier,
    /// The sheet has no header row or no data rows.
    #[error("No data found in sheet")]
    EmptySheet,
    #[error("FEID column not found in sheet")]
    IdentifierColumnMissing,
    #[error("FEID not found")]
    IdentifierNotFound,
    /// Only raised when duplicates are rejected.  Rows are 1-based sheet
    /// row numbers, header included.
    #[error("FEID appears in more than one row: {rows:?}")]
    DuplicateIdentifier { rows: Vec<usize> },
    /// Only raised in strict numeric mode.
    #[error("Malformed value '{raw}' in column '{column}' ({field})")]
    MalformedCell {
        column: String,
        field: PayoutField,
        raw: String,
    },
}

/// Failures of the spreadsheet collaborator.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("Sheet not found")]
    SheetNotFound,
    #[error("Invalid spreadsheet base URL: {0}")]
    InvalidBaseUrl(String),
    #[error("Failed to fetch data: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("Failed to fetch data: upstream returned HTTP {0}")]
    Upstream(u16),
    #[error("Failed to fetch data: invalid CSV ({0})")]
    InvalidCsv(#[from] csv::Error),
}
