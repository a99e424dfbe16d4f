//! FHIR date/dateTime handling.
//!
//! A FHIR date value denotes a range whose width depends on its precision:
//! - Year: 2023 -> [2023-01-01, 2024-01-01)
//! - Month: 2023-01 -> [2023-01-01, 2023-02-01)
//! - Day: 2023-01-15 -> [2023-01-15, 2023-01-16)
//! - Minute: 2023-01-15T10:30 -> one minute
//! - Second: 2023-01-15T10:30:00Z -> one second
//!
//! Values without an offset are taken as UTC.

use std::fmt;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::{Date, Duration, Month, OffsetDateTime, PrimitiveDateTime, Time};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct DateParseError(String);

impl DateParseError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatePrecision {
    Year,
    Month,
    Day,
    Minute,
    Second,
}

/// Half-open instant range `[start, end)` covered by a FHIR date value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: OffsetDateTime,
    pub end: OffsetDateTime,
    pub precision: DatePrecision,
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", format_instant(&self.start), format_instant(&self.end))
    }
}

fn calendar_start(year: i32, month: Month) -> Result<OffsetDateTime, DateParseError> {
    Date::from_calendar_date(year, month, 1)
        .map(|d| d.with_time(Time::MIDNIGHT).assume_utc())
        .map_err(|e| DateParseError::new(format!("Invalid date: {e}")))
}

fn parse_year(raw: &str) -> Result<i32, DateParseError> {
    if raw.len() != 4 || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(DateParseError::new(format!("Invalid year: {raw}")));
    }
    raw.parse()
        .map_err(|_| DateParseError::new(format!("Invalid year: {raw}")))
}

/// Parse a date string into the range its precision covers.
///
/// Fails when the end of the range falls outside the representable
/// calendar, e.g. for `9999-12-31`.
pub fn parse_date_range(date_str: &str) -> Result<DateRange, DateParseError> {
    let (start, precision) = parse_date_start(date_str)?;
    Ok(DateRange {
        start,
        end: range_end(start, precision)?,
        precision,
    })
}

/// Parse only the start instant and precision of a date value.
pub fn parse_date_start(date_str: &str) -> Result<(OffsetDateTime, DatePrecision), DateParseError> {
    let trimmed = date_str.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::new("Empty date value"));
    }

    // Year only: 2023
    if trimmed.len() == 4 {
        let year = parse_year(trimmed)?;
        return Ok((calendar_start(year, Month::January)?, DatePrecision::Year));
    }

    // Year-Month: 2023-01
    if trimmed.len() == 7 && trimmed.as_bytes().get(4) == Some(&b'-') {
        let year = parse_year(&trimmed[..4])?;
        let month_num: u8 = trimmed[5..]
            .parse()
            .map_err(|_| DateParseError::new(format!("Invalid month: {}", &trimmed[5..])))?;
        let month = Month::try_from(month_num)
            .map_err(|_| DateParseError::new(format!("Invalid month number: {month_num}")))?;
        return Ok((calendar_start(year, month)?, DatePrecision::Month));
    }

    // Full date: 2023-01-15
    if trimmed.len() == 10 && !trimmed.contains('T') {
        let date = Date::parse(trimmed, time::macros::format_description!("[year]-[month]-[day]"))
            .map_err(|e| DateParseError::new(format!("Invalid date: {e}")))?;
        return Ok((date.with_time(Time::MIDNIGHT).assume_utc(), DatePrecision::Day));
    }

    parse_datetime_start(trimmed)
}

fn parse_datetime_start(dt_str: &str) -> Result<(OffsetDateTime, DatePrecision), DateParseError> {
    if !dt_str.contains('T') {
        return Err(DateParseError::new(format!("Unrecognized date format: {dt_str}")));
    }

    let has_offset =
        dt_str.ends_with('Z') || dt_str.contains('+') || dt_str.rfind('-').is_some_and(|i| i > 10);

    if has_offset {
        let start = OffsetDateTime::parse(dt_str, &Rfc3339)
            .map_err(|e| DateParseError::new(format!("Invalid datetime: {e}")))?;
        return Ok((start, DatePrecision::Second));
    }

    let with_seconds =
        time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    if let Ok(pdt) = PrimitiveDateTime::parse(dt_str, &with_seconds) {
        return Ok((pdt.assume_utc(), DatePrecision::Second));
    }

    let no_seconds = time::macros::format_description!("[year]-[month]-[day]T[hour]:[minute]");
    let pdt = PrimitiveDateTime::parse(dt_str, &no_seconds)
        .map_err(|e| DateParseError::new(format!("Invalid datetime: {e}")))?;
    Ok((pdt.assume_utc(), DatePrecision::Minute))
}

/// Exclusive end of the range starting at `start`.
fn range_end(
    start: OffsetDateTime,
    precision: DatePrecision,
) -> Result<OffsetDateTime, DateParseError> {
    let step = match precision {
        DatePrecision::Year => return calendar_start(start.year() + 1, Month::January),
        DatePrecision::Month if start.month() == Month::December => {
            return calendar_start(start.year() + 1, Month::January);
        }
        DatePrecision::Month => return calendar_start(start.year(), start.month().next()),
        DatePrecision::Day => Duration::days(1),
        DatePrecision::Minute => Duration::minutes(1),
        DatePrecision::Second => Duration::seconds(1),
    };
    start
        .checked_add(step)
        .ok_or_else(|| DateParseError::new(format!("Date out of range: {}", format_instant(&start))))
}

/// Start instant of a stored date value, or `None` when it does not parse.
pub fn start_instant(value: &str) -> Option<OffsetDateTime> {
    parse_date_start(value).ok().map(|(start, _)| start)
}

/// Format an instant as RFC 3339.
pub fn format_instant(dt: &OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

pub fn now_utc() -> OffsetDateTime {
    OffsetDateTime::now_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_year_precision() {
        let r = parse_date_range("2023").unwrap();
        assert_eq!(r.start, datetime!(2023-01-01 0:00 UTC));
        assert_eq!(r.end, datetime!(2024-01-01 0:00 UTC));
        assert_eq!(r.precision, DatePrecision::Year);
    }

    #[test]
    fn test_month_precision_wraps_december() {
        let r = parse_date_range("2023-12").unwrap();
        assert_eq!(r.start, datetime!(2023-12-01 0:00 UTC));
        assert_eq!(r.end, datetime!(2024-01-01 0:00 UTC));

        let r = parse_date_range("2024-02").unwrap();
        assert_eq!(r.end, datetime!(2024-03-01 0:00 UTC));
    }

    #[test]
    fn test_day_precision() {
        let r = parse_date_range("2023-01-15").unwrap();
        assert_eq!(r.start, datetime!(2023-01-15 0:00 UTC));
        assert_eq!(r.end, datetime!(2023-01-16 0:00 UTC));
    }

    #[test]
    fn test_datetime_with_offset() {
        let r = parse_date_range("2023-01-15T10:30:00+02:00").unwrap();
        assert_eq!(r.start, datetime!(2023-01-15 8:30 UTC));
        assert_eq!(r.precision, DatePrecision::Second);
    }

    #[test]
    fn test_datetime_without_offset() {
        let r = parse_date_range("2023-01-15T10:30").unwrap();
        assert_eq!(r.start, datetime!(2023-01-15 10:30 UTC));
        assert_eq!(r.end, datetime!(2023-01-15 10:31 UTC));
    }

    #[test]
    fn test_malformed_dates() {
        for raw in ["", "20x3", "2023-13", "2023-02-30", "yesterday", "2023-01-15T25:00"] {
            assert!(parse_date_range(raw).is_err(), "expected error for {raw:?}");
        }
    }

    #[test]
    fn test_end_of_calendar() {
        for raw in ["9999-12-31", "9999-12-31T23:59:59Z", "9999-12-31T23:59", "9999-12", "9999"] {
            assert!(parse_date_range(raw).is_err(), "expected error for {raw:?}");
        }
        assert_eq!(
            start_instant("9999-12-31T23:59:59Z"),
            Some(datetime!(9999-12-31 23:59:59 UTC))
        );
        assert_eq!(
            start_instant("9999-12-31"),
            Some(datetime!(9999-12-31 0:00 UTC))
        );
        assert_eq!(
            parse_date_range("9998-12-31").unwrap().end,
            datetime!(9999-01-01 0:00 UTC)
        );
    }

    #[test]
    fn test_format_instant() {
        assert_eq!(
            format_instant(&datetime!(2023-05-15 14:30:00 UTC)),
            "2023-05-15T14:30:00Z"
        );
    }
}
