//! Schedule calculator — next run time from a schedule type + value.
//!
//! Always computed from the moment the run completed, never the moment it
//! started, so a slow handler cannot stack an immediate re-run.

use chrono::{DateTime, Datelike, Duration, TimeZone, Utc, Weekday};
use houndhub_db::schedule;

/// Default interval when the value is unparsable.
const DEFAULT_INTERVAL_MINUTES: i64 = 60;

/// Compute the next run strictly after `completed_at`.
///
/// - `hourly`: +1 hour.
/// - `daily`: "HH:MM" resolves to tomorrow at that wall-clock time (a fixed
///   daily slot — it rolls a full day forward even when today's slot has not
///   passed yet); anything else is +1 day.
/// - `weekly`: "weekday [HH:MM]" resolves to the next occurrence of that
///   weekday, always at least one day ahead; anything else is +1 week.
/// - `interval`: +N minutes, clamped to at least 1; unparsable N is 60.
/// - unknown schedule types behave like daily.
pub fn next_run_after(
    schedule_type: &str,
    schedule_value: &str,
    completed_at: DateTime<Utc>,
) -> DateTime<Utc> {
    match schedule_type {
        schedule::HOURLY => completed_at + Duration::hours(1),
        schedule::WEEKLY => next_weekly(schedule_value, completed_at),
        schedule::INTERVAL => {
            let minutes = schedule_value
                .trim()
                .parse::<i64>()
                .unwrap_or(DEFAULT_INTERVAL_MINUTES)
                .max(1);
            completed_at + Duration::minutes(minutes)
        }
        _ => next_daily(schedule_value, completed_at),
    }
}

fn next_daily(value: &str, completed_at: DateTime<Utc>) -> DateTime<Utc> {
    match parse_hhmm(value) {
        Some((hour, minute)) => {
            let tomorrow = completed_at.date_naive() + Duration::days(1);
            match tomorrow.and_hms_opt(hour, minute, 0) {
                Some(naive) => Utc.from_utc_datetime(&naive),
                None => completed_at + Duration::days(1),
            }
        }
        None => completed_at + Duration::days(1),
    }
}

fn next_weekly(value: &str, completed_at: DateTime<Utc>) -> DateTime<Utc> {
    let mut parts = value.split_whitespace();
    let Some(target) = parts.next().and_then(parse_weekday) else {
        return completed_at + Duration::weeks(1);
    };
    let (hour, minute) = parts.next().and_then(parse_hhmm).unwrap_or((0, 0));

    let today = completed_at.weekday().num_days_from_monday() as i64;
    let mut days_ahead = (target.num_days_from_monday() as i64 - today).rem_euclid(7);
    if days_ahead == 0 {
        days_ahead = 7;
    }

    let date = completed_at.date_naive() + Duration::days(days_ahead);
    match date.and_hms_opt(hour, minute, 0) {
        Some(naive) => Utc.from_utc_datetime(&naive),
        None => completed_at + Duration::weeks(1),
    }
}

fn parse_hhmm(s: &str) -> Option<(u32, u32)> {
    let (h, m) = s.trim().split_once(':')?;
    let hour: u32 = h.parse().ok()?;
    let minute: u32 = m.parse().ok()?;
    if hour < 24 && minute < 60 {
        Some((hour, minute))
    } else {
        None
    }
}

fn parse_weekday(s: &str) -> Option<Weekday> {
    match s.to_ascii_lowercase().as_str() {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        // 2026-03-10 is a Tuesday
        Utc.with_ymd_and_hms(2026, 3, 10, h, m, 0).unwrap()
    }

    #[test]
    fn test_hourly() {
        assert_eq!(next_run_after("hourly", "", at(10, 30)), at(11, 30));
    }

    #[test]
    fn test_daily_with_time_always_lands_tomorrow() {
        // 09:00 today has not passed at 06:00, but the slot still rolls a
        // full day forward.
        let next = next_run_after("daily", "09:00", at(6, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 9, 0, 0).unwrap());
    }

    #[test]
    fn test_daily_without_time() {
        let next = next_run_after("daily", "", at(14, 5));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 11, 14, 5, 0).unwrap());
    }

    #[test]
    fn test_weekly_next_occurrence() {
        // Tuesday → next Friday at 08:30
        let next = next_run_after("weekly", "friday 08:30", at(12, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 13, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_weekly_same_day_rolls_a_week() {
        let next = next_run_after("weekly", "tuesday 08:00", at(12, 0));
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 3, 17, 8, 0, 0).unwrap());
    }

    #[test]
    fn test_weekly_unparsable_falls_back() {
        assert_eq!(
            next_run_after("weekly", "someday", at(12, 0)),
            at(12, 0) + Duration::weeks(1)
        );
    }

    #[test]
    fn test_interval() {
        assert_eq!(next_run_after("interval", "120", at(12, 0)), at(14, 0));
    }

    #[test]
    fn test_interval_zero_clamps_to_one_minute() {
        let next = next_run_after("interval", "0", at(12, 0));
        assert!(next >= at(12, 0) + Duration::minutes(1));
    }

    #[test]
    fn test_interval_negative_clamps() {
        assert_eq!(next_run_after("interval", "-30", at(12, 0)), at(12, 1));
    }

    #[test]
    fn test_interval_unparsable_defaults_to_an_hour() {
        assert_eq!(next_run_after("interval", "soon", at(12, 0)), at(13, 0));
    }

    #[test]
    fn test_unknown_type_behaves_like_daily() {
        let next = next_run_after("fortnightly", "", at(12, 0));
        assert_eq!(next, at(12, 0) + Duration::days(1));
        assert_eq!(next.hour(), 12);
    }
}
