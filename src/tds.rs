//! TDS (tax deducted at source) assessment.
//!
//! The `tds` module decides whether withholding applies to a walker's
//! payout and how much is withheld.  The rule is expressed through the
//! [`TdsCalculator`] trait so a different statutory scheme can be
//! plugged in without touching the resolver.  Assessments are for
//! display only; they never change a record's `totalPayout`.

use crate::models::PayoutRecord;
use serde::{Deserialize, Serialize};

/// Outcome of a TDS check for one payout.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TdsAssessment {
    pub tds_applicable: bool,
    pub tds_amount: f64,
    /// Base pay less the withheld amount.
    pub salary_after_tds: f64,
}

/// Decides the withholding for a payout.
///
/// Calculators must be thread-safe (`Send + Sync`) because the HTTP
/// layer shares one instance across requests.
pub trait TdsCalculator: Send + Sync {
    /// `fy_earnings_to_date` is what the walker earned earlier in the
    /// financial year, excluding `record`.
    fn assess(&self, record: &PayoutRecord, fy_earnings_to_date: f64) -> TdsAssessment;
}

/// Flat-rate withholding on base pay once either earnings threshold is
/// exceeded.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlatTds {
    /// Financial-year earnings, this month included, above which TDS applies.
    pub fy_threshold: f64,
    /// Single-month payout above which TDS applies.
    pub monthly_threshold: f64,
    pub rate: f64,
}

impl Default for FlatTds {
    fn default() -> Self {
        Self {
            fy_threshold: 100_000.0,
            monthly_threshold: 30_000.0,
            rate: 0.10,
        }
    }
}

impl TdsCalculator for FlatTds {
    fn assess(&self, record: &PayoutRecord, fy_earnings_to_date: f64) -> TdsAssessment {
        let monthly = record.total_payout;
        let applicable = fy_earnings_to_date + monthly > self.fy_threshold
            || monthly > self.monthly_threshold;
        let base = record.breakdown.base_payout;
        let tds_amount = if applicable { base * self.rate } else { 0.0 };
        TdsAssessment {
            tds_applicable: applicable,
            tds_amount,
            salary_after_tds: base - tds_amount,
        }
    }
}
