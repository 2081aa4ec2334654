//! SOA serial bookkeeping
//!
//! Serials use the date form `YYYYMMDDnn`: the date of the change followed by
//! a two-digit revision counter. A serial never moves backwards. If the
//! current serial is already ahead of today's base (more than 100 changes in
//! a day, or a serial in a different scheme) it is simply incremented.

use chrono::{Datelike, NaiveDate};

/// First serial of `date` (`YYYYMMDD00`)
pub fn date_base(date: NaiveDate) -> u32 {
    // Year is clamped so the result always fits in a u32
    let year = date.year().clamp(0, 4293) as u32;
    year * 1_000_000 + date.month() * 10_000 + date.day() * 100
}

/// Serial to write after a change made on `today`
pub fn next_serial(current: u32, today: NaiveDate) -> u32 {
    current.wrapping_add(1).max(date_base(today))
}
