//! Run-scoped date context.

use chrono::{DateTime, Datelike, Days, Local, NaiveDate, Utc};

/// Ukrainian month names in the genitive case, as used in "15 жовтня".
const MONTHS_GENITIVE: [&str; 12] = [
    "січня",
    "лютого",
    "березня",
    "квітня",
    "травня",
    "червня",
    "липня",
    "серпня",
    "вересня",
    "жовтня",
    "листопада",
    "грудня",
];

/// Dates fixed once at the start of a run. Nothing downstream reads the clock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Calendar date the run is executed on; dedup records are stamped with it.
    pub run_date: NaiveDate,
    pub started_at: DateTime<Utc>,
    /// Day whose listings are collected.
    pub target_day: NaiveDate,
    /// Target day as shown on listing cards, e.g. "15 жовтня".
    pub day_marker: String,
}

impl RunContext {
    /// Context for a given run date, targeting `offset_days` earlier.
    pub fn for_date(run_date: NaiveDate, offset_days: u32) -> Self {
        let target_day = run_date
            .checked_sub_days(Days::new(u64::from(offset_days)))
            .unwrap_or(run_date);
        Self {
            run_date,
            started_at: Utc::now(),
            target_day,
            day_marker: day_marker(target_day),
        }
    }

    /// Context for today's local date.
    pub fn now(offset_days: u32) -> Self {
        Self::for_date(Local::now().date_naive(), offset_days)
    }
}

/// Format a date the way listing cards do: day number and genitive month.
pub fn day_marker(date: NaiveDate) -> String {
    let month = MONTHS_GENITIVE[date.month0() as usize];
    format!("{} {}", date.day(), month)
}
