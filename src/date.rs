//! Calendar dates as day counts since 1 January 1960.

use chrono::{Datelike, NaiveDate};

/// Days from the start of the March-based year to the first of each month
const MONTH_OFFSET: [i64; 12] = [306, 337, 0, 31, 61, 92, 122, 153, 184, 214, 245, 275];

/// Days from 1 March 1800 to 1 January 1960
const EPOCH_SHIFT: i64 = 58_379;

/// Day count of a proleptic Gregorian date relative to 1960-01-01
///
/// `month0` is 0-based (January is 0) and `day` is 1-based. The year is
/// counted from 1800 and starts on 1 March, so the leap day falls at the end
/// of the year.
pub fn days_since_1960(year: i32, month0: u32, day: u32) -> i64 {
    let month = (month0 % 12) as usize;
    let mut year = i64::from(year) - 1800;
    if month < 2 {
        year -= 1;
    }
    year * 365 + year.div_euclid(4) - year.div_euclid(100) + (year.div_euclid(100) + 2).div_euclid(4)
        + MONTH_OFFSET[month]
        + i64::from(day)
        - 1
        - EPOCH_SHIFT
}

pub fn from_naive_date(date: NaiveDate) -> i64 {
    days_since_1960(date.year(), date.month0(), date.day())
}
