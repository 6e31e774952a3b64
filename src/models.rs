//! Data models for the walker payout engine.
//!
//! The `models` module defines the spreadsheet snapshot consumed by the
//! resolver, the canonical payout fields it produces and the billing
//! cycle windows offered to walkers.  The output types derive
//! `Serialize` and `Deserialize` with the camelCase keys the web
//! frontend already expects.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// A single spreadsheet cell.
///
/// Sheets mix text and numbers freely; the resolver stringifies every
/// cell before parsing it, so the distinction only matters for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Empty,
}

impl CellValue {
    /// True for `Empty` and for text that is the empty string.
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.is_empty(),
            CellValue::Number(_) => false,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => f.write_str(s),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    }
}

impl From<String> for CellValue {
    fn from(s: String) -> Self {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s)
        }
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

/// The full contents of one sheet: row 0 holds the headers, every
/// following row is a data row.  Rows may be ragged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpreadsheetSnapshot {
    pub rows: Vec<Vec<CellValue>>,
}

impl SpreadsheetSnapshot {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Builds a snapshot from plain string rows, mostly handy in tests.
    pub fn from_text_rows<R, C>(rows: R) -> Self
    where
        R: IntoIterator<Item = C>,
        C: IntoIterator,
        C::Item: Into<String>,
    {
        let rows = rows
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .map(|c| {
                        let text: String = c.into();
                        CellValue::from(text)
                    })
                    .collect()
            })
            .collect();
        Self { rows }
    }

    /// Parses CSV text (as served by a sheet export) into a snapshot.
    /// The first record is kept as the header row.
    pub fn from_csv_str(data: &str) -> Result<Self, csv::Error> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(data.as_bytes());
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(CellValue::from).collect());
        }
        Ok(Self { rows })
    }

    /// A snapshot needs a header row and at least one data row.
    pub fn has_data(&self) -> bool {
        self.rows.len() >= 2
    }

    pub fn header(&self) -> Option<&[CellValue]> {
        self.rows.first().map(Vec::as_slice)
    }

    pub fn data_rows(&self) -> &[Vec<CellValue>] {
        self.rows.get(1..).unwrap_or(&[])
    }
}

/// The eight canonical payout components, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PayoutField {
    BasePayout,
    OtPayout,
    WalkerOrderFulfilment,
    OnTimeLogin,
    BestRankedStationReward,
    FestiveIncentives,
    CancellationAmount,
    WalkerLateLogin,
}

impl PayoutField {
    pub const ALL: [PayoutField; 8] = [
        PayoutField::BasePayout,
        PayoutField::OtPayout,
        PayoutField::WalkerOrderFulfilment,
        PayoutField::OnTimeLogin,
        PayoutField::BestRankedStationReward,
        PayoutField::FestiveIncentives,
        PayoutField::CancellationAmount,
        PayoutField::WalkerLateLogin,
    ];

    /// The JSON key used for this field.
    pub fn key(self) -> &'static str {
        match self {
            PayoutField::BasePayout => "basePayout",
            PayoutField::OtPayout => "otPayout",
            PayoutField::WalkerOrderFulfilment => "walkerOrderFulfilment",
            PayoutField::OnTimeLogin => "onTimeLogin",
            PayoutField::BestRankedStationReward => "bestRankedStationReward",
            PayoutField::FestiveIncentives => "festiveIncentives",
            PayoutField::CancellationAmount => "cancellationAmount",
            PayoutField::WalkerLateLogin => "walkerLateLogin",
        }
    }

    /// Cancellations and late logins are subtracted from the total;
    /// everything else is earnings.
    pub fn is_deduction(self) -> bool {
        matches!(
            self,
            PayoutField::CancellationAmount | PayoutField::WalkerLateLogin
        )
    }
}

impl fmt::Display for PayoutField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Header labels recognised in payout sheets.
const STANDARD_COLUMNS: [(&str, PayoutField); 8] = [
    ("Base Pay", PayoutField::BasePayout),
    ("Morning OT Payout", PayoutField::OtPayout),
    ("Walker Order Fulfilment", PayoutField::WalkerOrderFulfilment),
    ("Normal OT Payout", PayoutField::OnTimeLogin),
    ("Best Ranked Station", PayoutField::BestRankedStationReward),
    ("Festival Incentives", PayoutField::FestiveIncentives),
    ("Walker Cancellation", PayoutField::CancellationAmount),
    ("SM Cancellation", PayoutField::WalkerLateLogin),
];

/// Lookup table from a sheet header label to the payout field it feeds.
///
/// Labels are compared after trimming and are case-sensitive.  Headers
/// that are not in the table are ignored by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMapping {
    labels: HashMap<String, PayoutField>,
}

impl ColumnMapping {
    pub fn new<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, PayoutField)>,
        S: Into<String>,
    {
        let labels = entries
            .into_iter()
            .map(|(label, field)| (label.into().trim().to_string(), field))
            .collect();
        Self { labels }
    }

    /// The mapping used by the production payout sheets.
    pub fn standard() -> Self {
        Self::new(STANDARD_COLUMNS)
    }

    pub fn field_for(&self, header: &str) -> Option<PayoutField> {
        self.labels.get(header.trim()).copied()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self::standard()
    }
}

/// The eight payout components of one walker.  Absent columns stay 0.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutBreakdown {
    pub base_payout: f64,
    pub ot_payout: f64,
    pub walker_order_fulfilment: f64,
    pub on_time_login: f64,
    pub best_ranked_station_reward: f64,
    pub festive_incentives: f64,
    pub cancellation_amount: f64,
    pub walker_late_login: f64,
}

impl PayoutBreakdown {
    pub fn get(&self, field: PayoutField) -> f64 {
        match field {
            PayoutField::BasePayout => self.base_payout,
            PayoutField::OtPayout => self.ot_payout,
            PayoutField::WalkerOrderFulfilment => self.walker_order_fulfilment,
            PayoutField::OnTimeLogin => self.on_time_login,
            PayoutField::BestRankedStationReward => self.best_ranked_station_reward,
            PayoutField::FestiveIncentives => self.festive_incentives,
            PayoutField::CancellationAmount => self.cancellation_amount,
            PayoutField::WalkerLateLogin => self.walker_late_login,
        }
    }

    pub fn set(&mut self, field: PayoutField, value: f64) {
        let slot = match field {
            PayoutField::BasePayout => &mut self.base_payout,
            PayoutField::OtPayout => &mut self.ot_payout,
            PayoutField::WalkerOrderFulfilment => &mut self.walker_order_fulfilment,
            PayoutField::OnTimeLogin => &mut self.on_time_login,
            PayoutField::BestRankedStationReward => &mut self.best_ranked_station_reward,
            PayoutField::FestiveIncentives => &mut self.festive_incentives,
            PayoutField::CancellationAmount => &mut self.cancellation_amount,
            PayoutField::WalkerLateLogin => &mut self.walker_late_login,
        };
        *slot = value;
    }
}

/// The resolved payout of one walker, as returned by the HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    /// The identifier that was looked up, echoed back unchanged.
    pub feid: String,
    #[serde(flatten)]
    pub breakdown: PayoutBreakdown,
    /// Earnings minus deductions.
    pub total_payout: f64,
}

/// A 21st-to-20th settlement window named after the month it ends in.
///
/// Dates are plain calendar dates in `YYYY-MM-DD` form; both ends are
/// inclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingCycle {
    /// e.g. `"January 2025 (21 Dec - 20 Jan)"`.
    pub label: String,
    #[serde(rename = "startDateISO")]
    pub start_date_iso: String,
    #[serde(rename = "endDateISO")]
    pub end_date_iso: String,
    /// 0 for January through 11 for December.
    #[serde(rename = "monthIndex")]
    pub month_index: u32,
}

impl BillingCycle {
    /// `None` when the year is outside the range chrono can represent.
    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date_iso.parse().ok()
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date_iso.parse().ok()
    }

    /// Returns true if `date` falls inside the window, both ends included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        match (self.start_date(), self.end_date()) {
            (Some(start), Some(end)) => date >= start && date <= end,
            _ => false,
        }
    }
}
