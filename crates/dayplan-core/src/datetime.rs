//! Wall-clock date expressions for the CLI. Everything is local naive
//! time; the engine has no timezone concept beyond that.

use anyhow::{Context, anyhow};
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

/// Parse a scheduling expression into a wall-clock datetime.
///
/// Supported forms: `now`, `today`, `tomorrow`, `yesterday` (midnight),
/// clock times (`9:30`, `3:23pm` — today at that time), `YYYY-MM-DD`
/// (midnight), `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM`, and full
/// `YYYY-MM-DDTHH:MM:SS`.
#[tracing::instrument(skip(now), fields(input = input))]
pub fn parse_date_expr(input: &str, now: NaiveDateTime) -> anyhow::Result<NaiveDateTime> {
    let token = input.trim();
    let lower = token.to_ascii_lowercase();

    match lower.as_str() {
        "now" => return Ok(now),
        "today" => return Ok(midnight(now.date())),
        "tomorrow" => return Ok(midnight(now.date()) + Duration::days(1)),
        "yesterday" => return Ok(midnight(now.date()) - Duration::days(1)),
        _ => {}
    }

    if let Some((hour, minute)) = parse_clock_time(token) {
        return now
            .date()
            .and_hms_opt(hour, minute, 0)
            .ok_or_else(|| anyhow!("failed to construct clock time: {token}"));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(token, fmt) {
            return Ok(ndt);
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(token, "%Y-%m-%d") {
        return Ok(midnight(date));
    }

    Err(anyhow!("unrecognized date expression: {input}")).with_context(|| {
        "supported formats: now/today/tomorrow/yesterday, clock times \
         (e.g. 9:30 or 3:23pm), YYYY-MM-DD, YYYY-MM-DD HH:MM, \
         YYYY-MM-DDTHH:MM"
    })
}

/// Parse a calendar-day expression (used by the `day` command).
pub fn parse_day_expr(input: &str, now: NaiveDateTime) -> anyhow::Result<NaiveDate> {
    parse_date_expr(input, now).map(|dt| dt.date())
}

fn midnight(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::MIN)
}

fn parse_clock_time(token: &str) -> Option<(u32, u32)> {
    let clock_re = Regex::new(r"(?i)^(?P<hour>\d{1,2}):(?P<minute>\d{2})\s*(?P<ampm>[ap]m)?$").ok()?;
    let captures = clock_re.captures(token.trim())?;

    let raw_hour = captures.name("hour")?.as_str().parse::<u32>().ok()?;
    let minute = captures.name("minute")?.as_str().parse::<u32>().ok()?;
    if minute > 59 {
        return None;
    }

    let hour = if let Some(ampm_match) = captures.name("ampm") {
        let ampm = ampm_match.as_str().to_ascii_lowercase();
        if raw_hour == 0 || raw_hour > 12 {
            return None;
        }
        match ampm.as_str() {
            "am" => {
                if raw_hour == 12 {
                    0
                } else {
                    raw_hour
                }
            }
            "pm" => {
                if raw_hour == 12 {
                    12
                } else {
                    raw_hour + 12
                }
            }
            _ => return None,
        }
    } else {
        if raw_hour > 23 {
            return None;
        }
        raw_hour
    };

    Some((hour, minute))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{parse_date_expr, parse_day_expr};

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 2, 17)
            .expect("valid date")
            .and_hms_opt(12, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn parses_relative_days() {
        assert_eq!(
            parse_date_expr("today", now()).expect("today"),
            NaiveDate::from_ymd_opt(2026, 2, 17)
                .expect("valid")
                .and_hms_opt(0, 0, 0)
                .expect("valid")
        );
        assert_eq!(
            parse_day_expr("tomorrow", now()).expect("tomorrow"),
            NaiveDate::from_ymd_opt(2026, 2, 18).expect("valid")
        );
    }

    #[test]
    fn parses_clock_times_on_the_current_day() {
        let parsed = parse_date_expr("3:23pm", now()).expect("clock time");
        assert_eq!(parsed.format("%Y-%m-%d %H:%M").to_string(), "2026-02-17 15:23");

        let parsed = parse_date_expr("9:30", now()).expect("24h clock time");
        assert_eq!(parsed.format("%H:%M").to_string(), "09:30");
    }

    #[test]
    fn parses_explicit_datetimes() {
        let parsed = parse_date_expr("2026-03-02 14:30", now()).expect("datetime");
        assert_eq!(parsed.format("%Y-%m-%dT%H:%M").to_string(), "2026-03-02T14:30");

        let parsed = parse_date_expr("2026-03-02", now()).expect("date");
        assert_eq!(parsed.format("%H:%M").to_string(), "00:00");
    }

    #[test]
    fn rejects_unknown_expressions() {
        assert!(parse_date_expr("someday", now()).is_err());
        assert!(parse_date_expr("25:99", now()).is_err());
    }
}
