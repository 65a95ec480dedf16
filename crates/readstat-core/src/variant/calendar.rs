//! Julian day conversion.
//!
//! Dates are serialized as a day number counted from the Julian epoch.
//! The conversion is the standard integer algorithm onto the proleptic
//! Gregorian calendar, except that the firmware's calendar has no year
//! zero: any computed year `<= 0` is shifted down by one.

use crate::error::{Error, Result};
use chrono::{Days, NaiveDate};

/// Offset that moves the Julian day origin onto a March-based era
const EPOCH_SHIFT: i64 = 32_044;

/// Days in a 400-year Gregorian cycle
const DAYS_PER_400Y: i64 = 146_097;

/// Days in a 4-year Julian cycle
const DAYS_PER_4Y: i64 = 1_461;

/// Converts a Julian day number to `(year, month, day)`.
///
/// Years before 1 CE come out as negative numbers with no year zero.
pub fn julian_day_to_ymd(julian_day: u32) -> (i32, u32, u32) {
    let a = i64::from(julian_day) + EPOCH_SHIFT;
    let b = (4 * a + 3).div_euclid(DAYS_PER_400Y);
    let c = a - (DAYS_PER_400Y * b).div_euclid(4);
    let d = (4 * c + 3).div_euclid(DAYS_PER_4Y);
    let e = c - (DAYS_PER_4Y * d).div_euclid(4);
    let m = (5 * e + 2).div_euclid(153);

    let day = e - (153 * m + 2).div_euclid(5) + 1;
    let month = m + 3 - 12 * m.div_euclid(10);
    let mut year = 100 * b + d - 4800 + m.div_euclid(10);
    if year <= 0 {
        year -= 1;
    }

    // day is in 1..=31 and month in 1..=12 for any u32 input
    (year as i32, month as u32, day as u32)
}

/// Converts a Julian day number to a calendar date.
///
/// A February 29 that lands on a non-leap year after the year-zero shift
/// rolls over into March, the way a normalizing calendar constructor does.
pub fn date_from_julian_day(julian_day: u32) -> Result<NaiveDate> {
    let (year, month, day) = julian_day_to_ymd(julian_day);

    NaiveDate::from_ymd_opt(year, month, day)
        .or_else(|| {
            NaiveDate::from_ymd_opt(year, month, 1)
                .and_then(|first| first.checked_add_days(Days::new(u64::from(day) - 1)))
        })
        .ok_or(Error::DateOutOfRange { julian_day })
}
