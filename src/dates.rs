use time::{Date, OffsetDateTime};

/// Current calendar date (UTC).
pub fn today() -> Date {
    OffsetDateTime::now_utc().date()
}

/// The same calendar day `years` earlier; 29 February falls back to the 28th.
pub fn years_before(date: Date, years: i32) -> Date {
    let year = date.year() - years;
    Date::from_calendar_date(year, date.month(), date.day())
        .or_else(|_| Date::from_calendar_date(year, date.month(), date.day() - 1))
        .unwrap_or(date)
}
