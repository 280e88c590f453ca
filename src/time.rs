use chrono::{Datelike, NaiveDate, Utc};

/// Wall-clock "now" for production queries. Backtests must never call this.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

/// Signed number of whole calendar days from `earlier` to `later`.
pub fn days_between(later: NaiveDate, earlier: NaiveDate) -> i64 {
    (later - earlier).num_days()
}

/// Signed number of *complete* calendar months from `earlier` to `later`.
///
/// A month only counts once the day-of-month has been reached again, so
/// 2023-01-15 -> 2023-03-14 is one month and 2023-01-15 -> 2023-03-15 is two.
/// The last day of a shorter month completes it: 2024-01-31 -> 2024-02-29 is one.
pub fn whole_months_between(later: NaiveDate, earlier: NaiveDate) -> i32 {
    if later < earlier {
        return -whole_months_between(earlier, later);
    }
    let mut months =
        (later.year() - earlier.year()) * 12 + later.month() as i32 - earlier.month() as i32;
    if later.day() < earlier.day() && !is_last_day_of_month(later) {
        months -= 1;
    }
    months
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().map_or(true, |next| next.month() != date.month())
}

/// Parses `YYYY-MM-DD`, also accepting a longer timestamp that starts with a date
/// (`2024-03-01T10:00:00Z`, `2024-03-01 10:00:00`).
pub fn parse_date_prefix(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head = trimmed.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}
