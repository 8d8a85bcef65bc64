//! Observation period parsing.
//!
//! Providers label time with SDMX period codes. Each code resolves to the first
//! calendar day of the period it names.

use chrono::{Datelike, NaiveDate};

/// Resolves an SDMX time period code to a calendar date.
///
/// Accepted forms: `2022`, `2022-03`, `2022M03`, `2022-Q3`, `2022Q3`,
/// `2022-S2`, `2022S2` and literal `2022-03-15`. Returns `None` for anything
/// else.
#[must_use]
pub fn parse_period(period: &str) -> Option<NaiveDate> {
    let period = period.trim();

    if let Ok(date) = NaiveDate::parse_from_str(period, "%Y-%m-%d") {
        return Some(date);
    }

    let (year_part, rest) = period.split_at_checked(4)?;
    if !year_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year: i32 = year_part.parse().ok()?;

    let rest = rest.strip_prefix('-').unwrap_or(rest);
    if rest.is_empty() {
        return NaiveDate::from_ymd_opt(year, 1, 1);
    }

    let month = match rest.as_bytes()[0] {
        b'Q' => match rest[1..].parse::<u32>().ok()? {
            q @ 1..=4 => (q - 1) * 3 + 1,
            _ => return None,
        },
        b'S' | b'H' => match rest[1..].parse::<u32>().ok()? {
            1 => 1,
            2 => 7,
            _ => return None,
        },
        b'M' => rest[1..].parse::<u32>().ok()?,
        _ => rest.parse::<u32>().ok()?,
    };

    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Returns the calendar year of a period code, if it parses.
#[must_use]
pub fn period_year(period: &str) -> Option<i32> {
    parse_period(period).map(|d| d.year())
}
