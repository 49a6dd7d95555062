use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;

/// Zone in which `HH:MM` overrides are written when the config names none.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Brussels;

/// Second-precision UTC timestamp with a literal offset, as used by the history file and the sun service.
const UTC_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S+00:00";

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{1,2}):(\d{2})$").expect("valid clock time regex"));

pub fn format_utc_timestamp(date: &DateTime<Utc>) -> String {
    date.format(UTC_TIMESTAMP_FORMAT).to_string()
}

pub fn parse_utc_timestamp(value: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(value, UTC_TIMESTAMP_FORMAT).map(|naive| naive.and_utc())
}

/// Parses a `H:MM` / `HH:MM` wall-clock time into a bare `NaiveTime`.
pub fn parse_clock_time(value: &str) -> Result<NaiveTime, String> {
    let value = value.trim();
    let captures = CLOCK_TIME
        .captures(value)
        .ok_or_else(|| format!("'{}' is not a HH:MM time", value))?;

    let hour: u32 = captures[1].parse().map_err(|e| format!("invalid hour in '{}': {}", value, e))?;
    let minute: u32 = captures[2]
        .parse()
        .map_err(|e| format!("invalid minute in '{}': {}", value, e))?;

    NaiveTime::from_hms_opt(hour, minute, 0).ok_or_else(|| format!("'{}' is out of range", value))
}

/// Resolves a wall-clock time on `reference_date` in `tz` to a UTC instant.
///
/// Returns `None` when `value` is empty or cannot be parsed. Failures are logged, never raised:
/// a room with a broken override simply falls back to the sun.
pub fn parse_local_time(reference_date: NaiveDate, tz: &Tz, value: Option<&str>) -> Option<DateTime<Utc>> {
    let value = value.map(str::trim).filter(|v| !v.is_empty())?;

    let time = match parse_clock_time(value) {
        Ok(time) => time,
        Err(err) => {
            log::warn!("Ignoring time override: {}", err);
            return None;
        }
    };

    // Nonexistent wall-clock times (spring forward) are dropped, ambiguous ones take the first occurrence.
    match tz.from_local_datetime(&reference_date.and_time(time)).earliest() {
        Some(local) => Some(local.with_timezone(&Utc)),
        None => {
            log::warn!("Ignoring time override: {} does not exist on {} in {}", value, reference_date, tz);
            None
        }
    }
}
