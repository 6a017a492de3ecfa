//! Cron-expression + timezone validation (spec §4.8, §8): standard 5-field
//! cron via the `cron` crate, named timezone resolution via `chrono-tz`,
//! falling back to UTC with a warning on an unrecognized zone.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use cron::Schedule as CronSchedule;

/// Parses a standard 5-field cron expression (`min hour dom month dow`).
/// The `cron` crate expects a leading seconds field, so we prepend `"0 "`.
pub fn parse_cron(expr: &str) -> Result<CronSchedule, String> {
    let fields = expr.split_whitespace().count();
    if fields != 5 {
        return Err(format!(
            "expected a standard 5-field cron expression, got {fields} fields"
        ));
    }
    let with_seconds = format!("0 {expr}");
    CronSchedule::from_str(&with_seconds).map_err(|e| e.to_string())
}

/// Resolves a named timezone, falling back to UTC and logging a warning on
/// an unrecognized zone (spec §3: "timezone must be a recognized zone
/// (fallback UTC)").
pub fn resolve_timezone(name: &str) -> Tz {
    match name.parse::<Tz>() {
        Ok(tz) => tz,
        Err(_) => {
            tracing::warn!(timezone = name, "unrecognized timezone, falling back to UTC");
            Tz::UTC
        }
    }
}

/// Returns `true` if `expr` is a syntactically valid 5-field cron expression.
pub fn is_valid_cron(expr: &str) -> bool {
    parse_cron(expr).is_ok()
}

/// `getNextRunTime` (spec §4.8/§8): returns `None` on unparseable input,
/// otherwise the next tick strictly after `after`, expressed in UTC.
pub fn next_run_time(cron_expr: &str, timezone: &str, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let schedule = parse_cron(cron_expr).ok()?;
    let tz = resolve_timezone(timezone);
    let after_in_tz = after.with_timezone(&tz);
    let next = schedule.after(&after_in_tz).next()?;
    Some(next.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn valid_five_field_cron_parses() {
        assert!(is_valid_cron("0 9 * * *"));
        assert!(is_valid_cron("*/15 * * * *"));
    }

    #[test]
    fn garbage_cron_is_invalid() {
        assert!(!is_valid_cron("not a cron"));
        assert!(next_run_time("not a cron", "UTC", Utc::now()).is_none());
    }

    #[test]
    fn wrong_field_count_is_invalid() {
        assert!(!is_valid_cron("0 9 * *"));
    }

    #[test]
    fn unknown_timezone_falls_back_to_utc() {
        assert_eq!(resolve_timezone("Not/AZone"), Tz::UTC);
        assert_eq!(resolve_timezone("America/New_York"), chrono_tz::America::New_York);
    }

    #[test]
    fn next_run_time_is_strictly_after() {
        let now = Utc.with_ymd_and_hms(2026, 7, 28, 9, 0, 0).unwrap();
        let next = next_run_time("0 9 * * *", "UTC", now).unwrap();
        assert!(next > now);
    }
}
