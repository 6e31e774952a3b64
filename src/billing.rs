//! Billing cycle generation.
//!
//! Walkers are settled on fixed windows running from the 21st of one
//! month through the 20th of the next.  A cycle is named after the month
//! it ends in, so the January cycle starts on 21 December of the
//! previous year.  Every month has both a 20th and a 21st, so cycle
//! generation never fails.

use crate::models::BillingCycle;
use chrono::{Datelike, Month, NaiveDate};
use std::str::FromStr;

const MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

/// Months offered by the recent-months selector, newest first.
const RECENT_WINDOW: [Month; 5] = [
    Month::August,
    Month::July,
    Month::June,
    Month::May,
    Month::April,
];

/// Ordering of a generated cycle list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOrder {
    /// January first.
    Ascending,
    /// Latest month first, for "most recent" pickers.
    Descending,
}

/// Which set of cycles to offer for a year.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CycleWindow {
    /// January to December, ascending.
    All,
    /// August back to April, descending.
    #[default]
    Recent,
}

impl FromStr for CycleWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "all" => Ok(CycleWindow::All),
            "recent" => Ok(CycleWindow::Recent),
            other => Err(format!("Unknown billing cycle window '{}'", other)),
        }
    }
}

/// Converts a 0-based month index (0 = January) to a [`Month`].
pub fn month_from_index(index: u32) -> Option<Month> {
    MONTHS.get(index as usize).copied()
}

fn month_index(month: Month) -> u32 {
    month.number_from_month() - 1
}

fn abbreviation(month: Month) -> &'static str {
    &month.name()[..3]
}

/// `YYYY-MM-DD`, with an explicit sign for years outside 0..=9999 as in
/// ISO 8601 expanded years (`-0005-02-21`, `+10000-01-20`).
fn iso_date(year: i64, month: Month, day: u32) -> String {
    let month = month.number_from_month();
    match year {
        0..=9999 => format!("{:04}-{:02}-{:02}", year, month, day),
        y if y < 0 => format!("-{:04}-{:02}-{:02}", -y, month, day),
        y => format!("+{}-{:02}-{:02}", y, month, day),
    }
}

/// The cycle ending on the 20th of `month` in `year`.
pub fn billing_cycle(year: i32, month: Month) -> BillingCycle {
    let prev = month.pred();
    let year_wide = i64::from(year);
    let prev_year = if month == Month::January {
        year_wide - 1
    } else {
        year_wide
    };
    BillingCycle {
        label: format!(
            "{} {} (21 {} - 20 {})",
            month.name(),
            year,
            abbreviation(prev),
            abbreviation(month)
        ),
        start_date_iso: iso_date(prev_year, prev, 21),
        end_date_iso: iso_date(year_wide, month, 20),
        month_index: month_index(month),
    }
}

/// Cycles for the given months of `year`, sorted by month in `order`.
/// Repeated months are emitted once.
pub fn cycles_for<I>(year: i32, months: I, order: CycleOrder) -> Vec<BillingCycle>
where
    I: IntoIterator<Item = Month>,
{
    let mut indices: Vec<u32> = months.into_iter().map(month_index).collect();
    indices.sort_unstable();
    indices.dedup();
    if order == CycleOrder::Descending {
        indices.reverse();
    }
    indices
        .into_iter()
        .filter_map(month_from_index)
        .map(|m| billing_cycle(year, m))
        .collect()
}

/// All twelve cycles of `year`, January first.
pub fn all_months_in_year(year: i32) -> Vec<BillingCycle> {
    cycles_for(year, MONTHS, CycleOrder::Ascending)
}

/// The April to August cycles of `year`, August first.
pub fn recent_months_window(year: i32) -> Vec<BillingCycle> {
    cycles_for(year, RECENT_WINDOW, CycleOrder::Descending)
}

pub fn generate_billing_cycles(year: i32, window: CycleWindow) -> Vec<BillingCycle> {
    match window {
        CycleWindow::All => all_months_in_year(year),
        CycleWindow::Recent => recent_months_window(year),
    }
}

/// The cycle `date` is settled in.  Days from the 21st onwards belong to
/// the following month's cycle.
pub fn cycle_containing(date: NaiveDate) -> BillingCycle {
    let month = month_from_index(date.month0()).unwrap_or(Month::January);
    if date.day() >= 21 {
        let year = if month == Month::December {
            date.year() + 1
        } else {
            date.year()
        };
        billing_cycle(year, month.succ())
    } else {
        billing_cycle(date.year(), month)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn january_cycle_starts_in_previous_year() {
        let cycle = billing_cycle(2025, Month::January);
        assert_eq!(cycle.start_date_iso, "2024-12-21");
        assert_eq!(cycle.end_date_iso, "2025-01-20");
        assert_eq!(cycle.label, "January 2025 (21 Dec - 20 Jan)");
        assert_eq!(cycle.month_index, 0);
    }

    #[test]
    fn february_boundaries_ignore_leap_years() {
        for year in [2024, 2025] {
            let cycle = billing_cycle(year, Month::February);
            assert_eq!(cycle.start_date_iso, format!("{}-01-21", year));
            assert_eq!(cycle.end_date_iso, format!("{}-02-20", year));
        }
        let march = billing_cycle(2024, Month::March);
        assert_eq!(march.start_date_iso, "2024-02-21");
        assert_eq!(march.label, "March 2024 (21 Feb - 20 Mar)");
    }

    #[test]
    fn extreme_years_do_not_overflow() {
        let cycles = all_months_in_year(i32::MIN);
        assert_eq!(cycles.len(), 12);
        assert_eq!(cycles[0].start_date_iso, "-2147483649-12-21");
        assert_eq!(cycles[0].end_date_iso, "-2147483648-01-20");

        let last = all_months_in_year(i32::MAX);
        assert_eq!(last[11].end_date_iso, "+2147483647-12-20");
    }

    #[test]
    fn negative_and_wide_years_keep_a_sign() {
        let march = billing_cycle(-5, Month::March);
        assert_eq!(march.start_date_iso, "-0005-02-21");
        assert_eq!(march.end_date_iso, "-0005-03-20");
        assert_eq!(march.start_date(), NaiveDate::from_ymd_opt(-5, 2, 21));

        let january = billing_cycle(0, Month::January);
        assert_eq!(january.start_date_iso, "-0001-12-21");
        assert_eq!(january.end_date_iso, "0000-01-20");

        let wide = billing_cycle(10000, Month::January);
        assert_eq!(wide.start_date_iso, "9999-12-21");
        assert_eq!(wide.end_date_iso, "+10000-01-20");
        assert_eq!(wide.end_date(), NaiveDate::from_ymd_opt(10000, 1, 20));
    }

    #[test]
    fn full_year_is_ascending() {
        let cycles = all_months_in_year(2025);
        assert_eq!(cycles.len(), 12);
        let indices: Vec<u32> = cycles.iter().map(|c| c.month_index).collect();
        assert_eq!(indices, (0..12).collect::<Vec<_>>());
        assert_eq!(cycles[11].label, "December 2025 (21 Nov - 20 Dec)");
        assert_eq!(cycles[8].label, "September 2025 (21 Aug - 20 Sep)");
    }

    #[test]
    fn recent_window_is_august_to_april_descending() {
        let cycles = recent_months_window(2025);
        let labels: Vec<&str> = cycles.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(
            labels,
            vec![
                "August 2025 (21 Jul - 20 Aug)",
                "July 2025 (21 Jun - 20 Jul)",
                "June 2025 (21 May - 20 Jun)",
                "May 2025 (21 Apr - 20 May)",
                "April 2025 (21 Mar - 20 Apr)",
            ]
        );
        assert_eq!(generate_billing_cycles(2025, CycleWindow::Recent), cycles);
    }

    #[test]
    fn windows_parse_by_name() {
        assert_eq!("all".parse::<CycleWindow>(), Ok(CycleWindow::All));
        assert_eq!(" Recent ".parse::<CycleWindow>(), Ok(CycleWindow::Recent));
        assert!("weekly".parse::<CycleWindow>().is_err());
    }

    #[test]
    fn generation_is_restartable() {
        assert_eq!(all_months_in_year(2030), all_months_in_year(2030));
    }

    #[test]
    fn custom_selection_dedups_and_orders() {
        let cycles = cycles_for(
            2025,
            [Month::March, Month::January, Month::March],
            CycleOrder::Descending,
        );
        let indices: Vec<u32> = cycles.iter().map(|c| c.month_index).collect();
        assert_eq!(indices, vec![2, 0]);
    }

    #[test]
    fn month_indices_are_bounded() {
        assert_eq!(month_from_index(0), Some(Month::January));
        assert_eq!(month_from_index(11), Some(Month::December));
        assert_eq!(month_from_index(12), None);
    }

    #[test]
    fn dates_map_to_their_settlement_cycle() {
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(cycle_containing(day(2025, 3, 20)).label, "March 2025 (21 Feb - 20 Mar)");
        assert_eq!(cycle_containing(day(2025, 3, 21)).label, "April 2025 (21 Mar - 20 Apr)");
        let rollover = cycle_containing(day(2024, 12, 25));
        assert_eq!(rollover.label, "January 2025 (21 Dec - 20 Jan)");
        assert!(rollover.contains(day(2024, 12, 25)));
    }
}
