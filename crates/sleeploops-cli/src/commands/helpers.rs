//! Helper utility functions for CLI commands

use anyhow::{bail, Context, Result};
use chrono::{DateTime, FixedOffset, NaiveTime, Weekday};
use sleeploops_core::{monitor::LifecyclePhase, AppContext};

/// Open the engine on the default database, as a foreground app would
pub fn open_context() -> Result<AppContext> {
    AppContext::open(None, LifecyclePhase::Active).context("Failed to open sleeploops data")
}

/// Parse a wall-clock time such as `07:30` or `7:30`
pub fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s.trim(), "%H:%M")
        .with_context(|| format!("Invalid time '{s}'. Use HH:MM (e.g., 07:30)"))
}

/// Parse a weekday name or its number (0 = Sunday .. 6 = Saturday)
pub fn parse_weekday(s: &str) -> Result<Weekday> {
    let day = match s.trim().to_ascii_lowercase().as_str() {
        "0" | "sun" | "sunday" => Weekday::Sun,
        "1" | "mon" | "monday" => Weekday::Mon,
        "2" | "tue" | "tuesday" => Weekday::Tue,
        "3" | "wed" | "wednesday" => Weekday::Wed,
        "4" | "thu" | "thursday" => Weekday::Thu,
        "5" | "fri" | "friday" => Weekday::Fri,
        "6" | "sat" | "saturday" => Weekday::Sat,
        other => bail!("Unknown weekday '{other}'. Use a name (mon) or 0-6 starting Sunday"),
    };
    Ok(day)
}

/// Render epoch milliseconds in the given offset
pub fn format_millis(ms: i64, offset: &FixedOffset) -> String {
    DateTime::from_timestamp_millis(ms).map_or_else(
        || "-".to_string(),
        |t| t.with_timezone(offset).format("%Y-%m-%d %H:%M").to_string(),
    )
}

pub fn format_clock(time: &DateTime<FixedOffset>) -> String {
    time.format("%a %H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_of_day() {
        assert_eq!(
            parse_time_of_day("07:30").unwrap(),
            NaiveTime::from_hms_opt(7, 30, 0).unwrap()
        );
        assert_eq!(
            parse_time_of_day(" 7:05 ").unwrap(),
            NaiveTime::from_hms_opt(7, 5, 0).unwrap()
        );
        assert!(parse_time_of_day("25:00").is_err());
        assert!(parse_time_of_day("seven").is_err());
    }

    #[test]
    fn test_parse_weekday() {
        assert_eq!(parse_weekday("0").unwrap(), Weekday::Sun);
        assert_eq!(parse_weekday("Fri").unwrap(), Weekday::Fri);
        assert_eq!(parse_weekday("saturday").unwrap(), Weekday::Sat);
        assert!(parse_weekday("7").is_err());
    }

    #[test]
    fn test_format_millis() {
        let utc = FixedOffset::east_opt(0).unwrap();
        let tokyo = FixedOffset::east_opt(9 * 3600).unwrap();
        assert_eq!(format_millis(0, &utc), "1970-01-01 00:00");
        assert_eq!(format_millis(0, &tokyo), "1970-01-01 09:00");
        assert_eq!(format_millis(i64::MAX, &utc), "-");
    }
}
