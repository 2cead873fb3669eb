//! Date values
//!
//! Date rules accept `YYYY-MM-DD`, RFC 3339 timestamps and relative
//! expressions evaluated against the validation clock:
//!
//! - `$now` - the current instant
//! - `$now(d:-7)` - seven days ago
//! - `$now(y:-1,M:2)` - one year back, two months forward
//!
//! Units are `y` (years), `M` (months), `d` (days), `h` (hours),
//! `m` (minutes) and `s` (seconds).

use std::sync::OnceLock;

use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};

/// Format dates are bound with; SQLite's `datetime()` produces the same shape
pub const SQL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn relative_date_regex() -> &'static regex::Regex {
    static RE_RELATIVE: OnceLock<regex::Regex> = OnceLock::new();
    RE_RELATIVE
        .get_or_init(|| regex::Regex::new(r"^\$now(?:\(([^)]*)\))?$").expect("Invalid regex"))
}

/// Parse a date rule value, resolving relative expressions against `now`
pub fn parse_date_value(value: &str, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
    if let Some(caps) = relative_date_regex().captures(value) {
        return match caps.get(1) {
            Some(offsets) => apply_offsets(now, offsets.as_str()),
            None => Some(now),
        };
    }

    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|dt| dt.and_utc())
}

fn apply_offsets(now: DateTime<Utc>, offsets: &str) -> Option<DateTime<Utc>> {
    let mut result = now;
    for part in offsets.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (unit, amount) = part.split_once(':')?;
        let amount: i64 = amount.trim().parse().ok()?;
        result = match unit.trim() {
            "y" => shift_months(result, amount.checked_mul(12)?)?,
            "M" => shift_months(result, amount)?,
            "d" => result.checked_add_signed(Duration::try_days(amount)?)?,
            "h" => result.checked_add_signed(Duration::try_hours(amount)?)?,
            "m" => result.checked_add_signed(Duration::try_minutes(amount)?)?,
            "s" => result.checked_add_signed(Duration::try_seconds(amount)?)?,
            _ => return None,
        };
    }
    Some(result)
}

fn shift_months(dt: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        dt.checked_add_months(magnitude)
    } else {
        dt.checked_sub_months(magnitude)
    }
}

/// Render a date the way it is bound into SQL
pub fn to_sql_datetime(dt: &DateTime<Utc>) -> String {
    dt.format(SQL_DATETIME_FORMAT).to_string()
}

/// Parse a stored timestamp; accepts the bound format and plain dates
pub fn parse_sql_datetime(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, SQL_DATETIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
                .map(|dt| dt.and_utc())
        })
}
