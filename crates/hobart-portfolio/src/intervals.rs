//! Processing windows.
//!
//! One window per calendar year, ending December 31 and starting on the last
//! business day before January 1 so the first observation of the year can be
//! paired with the last one of the year before.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use hobart_data::DateRange;

/// Build one window per year, in the order the years are given.
///
/// Years outside chrono's supported range are skipped.
pub fn generate_intervals(years: &[i32]) -> Vec<DateRange> {
    years.iter().filter_map(|&year| year_window(year)).collect()
}

fn year_window(year: i32) -> Option<DateRange> {
    let first_day = NaiveDate::from_ymd_opt(year, 1, 1)?;
    let last_day = NaiveDate::from_ymd_opt(year, 12, 31)?;

    let back = match first_day.weekday() {
        // back to the Friday before
        Weekday::Mon => 3,
        Weekday::Sun => 2,
        _ => 1,
    };

    Some(DateRange {
        start: first_day - Duration::days(back),
        end: last_day,
    })
}
