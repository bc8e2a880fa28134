use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};

use crate::error::{CronError, Result};

/// A parsed, immutable schedule expression.
///
/// Two families are accepted:
///
/// - six-field cron syntax (`sec min hour day-of-month month day-of-week`,
///   with `*`, ranges, steps, lists and 3-letter month / weekday names;
///   an optional seventh year field is tolerated), including the named
///   shortcuts `@yearly`, `@monthly`, `@weekly`, `@daily` and `@hourly`;
/// - fixed intervals: `@every <duration>`, e.g. `@every 30s`, `@every 1h30m`.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// Cron expression, evaluated in UTC.
    Cron(cron::Schedule),
    /// Fixed interval between consecutive firings.
    Every(Duration),
}

impl Schedule {
    /// The smallest instant strictly after `after` at which this schedule
    /// fires.
    ///
    /// Returns `None` when the schedule has run out (possible for
    /// year-bounded cron expressions); interval schedules never run out.
    pub fn next_after(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Schedule::Cron(schedule) => schedule.after(&after).next(),
            Schedule::Every(interval) => Some(after + *interval),
        }
    }
}

impl FromStr for Schedule {
    type Err = CronError;

    fn from_str(spec: &str) -> Result<Self> {
        let spec = spec.trim();

        if let Some(interval) = spec.strip_prefix("@every ") {
            return Ok(Schedule::Every(parse_duration(interval.trim())?));
        }

        let schedule = cron::Schedule::from_str(spec)
            .map_err(|e| CronError::InvalidSchedule(format!("[{spec}]: {e}")))?;

        // A spec that can never fire again is a registration error, not
        // something to discover in the dispatch loop.
        if schedule.upcoming(Utc).next().is_none() {
            return Err(CronError::InvalidSchedule(format!(
                "[{spec}]: no future occurrence"
            )));
        }

        Ok(Schedule::Cron(schedule))
    }
}

/// Parse a Go-style duration literal: one or more `<integer><unit>` segments
/// with units `ms`, `s`, `m`, `h`, e.g. `200ms`, `90s`, `1h30m`.
fn parse_duration(text: &str) -> Result<Duration> {
    let invalid = || CronError::InvalidSchedule(format!("invalid duration [{text}]"));

    let bytes = text.as_bytes();
    let mut i = 0;
    let mut total_ms: i64 = 0;

    while i < bytes.len() {
        let digits_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == digits_start {
            return Err(invalid());
        }
        let value: i64 = text[digits_start..i].parse().map_err(|_| invalid())?;

        let unit_start = i;
        while i < bytes.len() && !bytes[i].is_ascii_digit() {
            i += 1;
        }
        let unit_ms = match &text[unit_start..i] {
            "ms" => 1,
            "s" => 1_000,
            "m" => 60_000,
            "h" => 3_600_000,
            _ => return Err(invalid()),
        };

        total_ms = value
            .checked_mul(unit_ms)
            .and_then(|ms| total_ms.checked_add(ms))
            .ok_or_else(invalid)?;
    }

    if total_ms <= 0 {
        return Err(invalid());
    }
    Ok(Duration::milliseconds(total_ms))
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, TimeZone, Timelike, Weekday};

    use super::*;

    #[test]
    fn parses_every_intervals() {
        for (spec, expected_ms) in [
            ("@every 200ms", 200),
            ("@every 90s", 90_000),
            ("@every 2m30s", 150_000),
            ("@every 1h30m", 5_400_000),
        ] {
            match spec.parse::<Schedule>().unwrap() {
                Schedule::Every(d) => assert_eq!(d.num_milliseconds(), expected_ms, "{spec}"),
                other => panic!("expected interval schedule for {spec}, got {other:?}"),
            }
        }
    }

    #[test]
    fn rejects_bad_intervals() {
        for spec in [
            "@every",
            "@every ",
            "@every 0s",
            "@every -5s",
            "@every tomato",
            "@every 10x",
            "@every s",
        ] {
            assert!(
                matches!(spec.parse::<Schedule>(), Err(CronError::InvalidSchedule(_))),
                "expected rejection for {spec}"
            );
        }
    }

    #[test]
    fn rejects_bad_cron_expressions() {
        for spec in ["not-a-schedule", "61 * * * * *", "* * * * JANJAN *"] {
            assert!(
                matches!(spec.parse::<Schedule>(), Err(CronError::InvalidSchedule(_))),
                "expected rejection for {spec}"
            );
        }
    }

    #[test]
    fn rejects_specs_with_no_future_occurrence() {
        // Year-bounded expression entirely in the past.
        assert!(matches!(
            "0 0 0 1 1 * 2000".parse::<Schedule>(),
            Err(CronError::InvalidSchedule(_))
        ));
    }

    #[test]
    fn next_after_is_strictly_increasing() {
        let schedule: Schedule = "*/10 * * * * *".parse().unwrap();
        let mut last = Utc::now();
        for _ in 0..50 {
            let next = schedule.next_after(last).unwrap();
            assert!(next > last);
            last = next;
        }

        let every: Schedule = "@every 1s".parse().unwrap();
        let mut last = Utc::now();
        for _ in 0..50 {
            let next = every.next_after(last).unwrap();
            assert!(next > last);
            last = next;
        }
    }

    #[test]
    fn instant_due_exactly_at_query_time_is_not_reselected() {
        let schedule: Schedule = "0 0 * * * *".parse().unwrap();
        let on_the_hour = Utc.with_ymd_and_hms(2031, 5, 14, 9, 0, 0).unwrap();
        let next = schedule.next_after(on_the_hour).unwrap();
        assert_eq!(next, on_the_hour + Duration::hours(1));
    }

    #[test]
    fn weekday_names_are_honored() {
        let schedule: Schedule = "0 0 0 * * MON".parse().unwrap();
        let next = schedule.next_after(Utc::now()).unwrap();
        assert_eq!(next.weekday(), Weekday::Mon);
        assert_eq!(next.hour(), 0);
        assert_eq!(next.minute(), 0);
    }

    #[test]
    fn named_shortcuts_parse() {
        let schedule: Schedule = "@hourly".parse().unwrap();
        let next = schedule.next_after(Utc::now()).unwrap();
        assert_eq!(next.minute(), 0);
        assert_eq!(next.second(), 0);

        let schedule: Schedule = "@daily".parse().unwrap();
        let next = schedule.next_after(Utc::now()).unwrap();
        assert_eq!(next.hour(), 0);
        assert_eq!(next.minute(), 0);
    }
}
