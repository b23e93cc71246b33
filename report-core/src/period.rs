//! Calendar and fiscal period math
//!
//! Imports are bucketed by calendar month; report assembly needs the prior
//! month end for beginning balances and the fiscal-year start for
//! fiscal-aligned ranges.

use chrono::{Datelike, Duration, NaiveDate};

use crate::error::{Error, Result};

/// One calendar-month import bucket, clamped to the requested range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonthBucket {
    /// Bucket start (the requested start for the first bucket, otherwise the
    /// first of the month)
    pub start: NaiveDate,
    /// Bucket end (the requested end for the last bucket, otherwise the last
    /// day of the month)
    pub end: NaiveDate,
}

/// Split an inclusive date range into calendar-month buckets.
///
/// A range inside a single month yields one bucket; `start > end` yields
/// none.
pub fn month_buckets(start: NaiveDate, end: NaiveDate) -> Vec<MonthBucket> {
    let mut buckets = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        let month_end = end_of_month(cursor);
        let bucket_end = month_end.min(end);
        buckets.push(MonthBucket {
            start: cursor,
            end: bucket_end,
        });
        cursor = bucket_end + Duration::days(1);
    }
    buckets
}

/// First day of the month containing `date`
pub fn month_floor(date: NaiveDate) -> NaiveDate {
    // with_day(1) cannot fail for day 1
    date.with_day(1).unwrap_or(date)
}

/// Last day of the month containing `date`
pub fn end_of_month(date: NaiveDate) -> NaiveDate {
    let (next_y, next_m) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    match NaiveDate::from_ymd_opt(next_y, next_m, 1) {
        Some(first_of_next) => first_of_next - Duration::days(1),
        None => date,
    }
}

/// Last day of the month before the one containing `date`
pub fn prior_month_end(date: NaiveDate) -> NaiveDate {
    month_floor(date) - Duration::days(1)
}

/// Start of the fiscal year containing `date`, for a fiscal year beginning
/// in `fy_start_month` (1..=12).
pub fn fiscal_year_start(date: NaiveDate, fy_start_month: u32) -> Result<NaiveDate> {
    if !(1..=12).contains(&fy_start_month) {
        return Err(Error::InvalidRange(format!(
            "fiscal year start month out of range: {}",
            fy_start_month
        )));
    }
    let year = if date.month() >= fy_start_month {
        date.year()
    } else {
        date.year() - 1
    };
    NaiveDate::from_ymd_opt(year, fy_start_month, 1)
        .ok_or_else(|| Error::InvalidRange(format!("invalid fiscal year start: {}-{}", year, fy_start_month)))
}
