//! Decides, for a series' rule and a candidate date, whether an occurrence
//! exists on that date.
//!
//! The legacy evaluator ignored the rule's `interval` entirely and anchored
//! weekly rules to Monday and monthly rules to the 1st. That behavior is the
//! default (`RecurrencePolicy::legacy`); true every-N stepping is opt-in via
//! `RecurrencePolicy::honor_interval`, anchored at the series creation date.

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::trace;

use crate::task::Recurrence;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecurrencePolicy {
    pub honor_interval: bool,
}

impl RecurrencePolicy {
    pub fn legacy() -> Self {
        Self {
            honor_interval: false,
        }
    }

    pub fn honor_interval() -> Self {
        Self {
            honor_interval: true,
        }
    }
}

/// Does `rule` produce an occurrence on `date`? `anchor` is the series
/// creation date; it only matters when the policy honors intervals.
pub fn matches(
    rule: &Recurrence,
    date: NaiveDate,
    anchor: NaiveDate,
    policy: RecurrencePolicy,
) -> bool {
    let matched = match rule {
        Recurrence::Daily { interval } => {
            if policy.honor_interval {
                interval_aligned(days_between(anchor, date), *interval)
            } else {
                true
            }
        }
        Recurrence::Weekly { interval } => {
            date.weekday() == Weekday::Mon
                && (!policy.honor_interval
                    || interval_aligned(weeks_between(anchor, date), *interval))
        }
        Recurrence::Monthly { interval } => {
            date.day() == 1
                && (!policy.honor_interval
                    || interval_aligned(months_between(anchor, date), *interval))
        }
        // `interval` has never applied to weekday sets.
        Recurrence::Weekdays { weekdays } => {
            weekdays.contains(&date.weekday().num_days_from_sunday())
        }
    };

    trace!(?rule, %date, %anchor, matched, "evaluated recurrence rule");
    matched
}

fn interval_aligned(distance: i64, interval: u32) -> bool {
    let step = i64::from(interval.max(1));
    distance >= 0 && distance % step == 0
}

fn days_between(anchor: NaiveDate, date: NaiveDate) -> i64 {
    (date - anchor).num_days()
}

/// Distance in whole calendar weeks between the Mondays of the two dates'
/// weeks.
fn weeks_between(anchor: NaiveDate, date: NaiveDate) -> i64 {
    let anchor_monday = anchor.week(Weekday::Mon).first_day();
    let date_monday = date.week(Weekday::Mon).first_day();
    (date_monday - anchor_monday).num_days() / 7
}

fn months_between(anchor: NaiveDate, date: NaiveDate) -> i64 {
    let anchor_total = i64::from(anchor.year()) * 12 + i64::from(anchor.month0());
    let date_total = i64::from(date.year()) * 12 + i64::from(date.month0());
    date_total - anchor_total
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike, NaiveDate};

    use super::{RecurrencePolicy, matches};
    use crate::task::Recurrence;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn daily_matches_every_date_under_legacy_policy() {
        let rule = Recurrence::Daily { interval: 3 };
        let anchor = date(2026, 1, 1);
        for offset in 0..10 {
            let candidate = anchor + chrono::Days::new(offset);
            assert!(matches(&rule, candidate, anchor, RecurrencePolicy::legacy()));
        }
    }

    #[test]
    fn daily_interval_skips_days_when_honored() {
        let rule = Recurrence::Daily { interval: 3 };
        let anchor = date(2026, 1, 1);
        let policy = RecurrencePolicy::honor_interval();

        assert!(matches(&rule, date(2026, 1, 1), anchor, policy));
        assert!(!matches(&rule, date(2026, 1, 2), anchor, policy));
        assert!(!matches(&rule, date(2026, 1, 3), anchor, policy));
        assert!(matches(&rule, date(2026, 1, 4), anchor, policy));
    }

    #[test]
    fn weekly_matches_only_mondays() {
        let rule = Recurrence::Weekly { interval: 1 };
        let anchor = date(2026, 1, 1);
        let policy = RecurrencePolicy::legacy();

        // 2026-03-02 is a Monday.
        assert!(matches(&rule, date(2026, 3, 2), anchor, policy));
        assert!(!matches(&rule, date(2026, 3, 3), anchor, policy));
        assert!(!matches(&rule, date(2026, 3, 8), anchor, policy));
        assert!(matches(&rule, date(2026, 3, 9), anchor, policy));
    }

    #[test]
    fn weekly_interval_skips_weeks_when_honored() {
        let rule = Recurrence::Weekly { interval: 2 };
        // Anchor in the week of Monday 2026-03-02.
        let anchor = date(2026, 3, 4);
        let policy = RecurrencePolicy::honor_interval();

        assert!(matches(&rule, date(2026, 3, 2), anchor, policy));
        assert!(!matches(&rule, date(2026, 3, 9), anchor, policy));
        assert!(matches(&rule, date(2026, 3, 16), anchor, policy));
    }

    #[test]
    fn monthly_matches_only_first_of_month() {
        let rule = Recurrence::Monthly { interval: 1 };
        let anchor = date(2026, 1, 15);
        let policy = RecurrencePolicy::legacy();

        assert!(matches(&rule, date(2026, 4, 1), anchor, policy));
        assert!(!matches(&rule, date(2026, 4, 2), anchor, policy));
        assert!(!matches(&rule, date(2026, 4, 30), anchor, policy));
    }

    #[test]
    fn monthly_interval_skips_months_when_honored() {
        let rule = Recurrence::Monthly { interval: 3 };
        let anchor = date(2026, 1, 15);
        let policy = RecurrencePolicy::honor_interval();

        assert!(matches(&rule, date(2026, 1, 1), anchor, policy));
        assert!(!matches(&rule, date(2026, 2, 1), anchor, policy));
        assert!(matches(&rule, date(2026, 4, 1), anchor, policy));
        assert!(matches(&rule, date(2026, 7, 1), anchor, policy));
    }

    #[test]
    fn weekday_set_matches_listed_days_across_weeks() {
        let rule = Recurrence::Weekdays {
            weekdays: vec![1, 3, 5],
        };
        let anchor = date(2026, 1, 1);
        let policy = RecurrencePolicy::legacy();

        let mut day = date(2026, 3, 1);
        let end = date(2026, 3, 31);
        while day <= end {
            let expected = matches!(
                day.weekday(),
                chrono::Weekday::Mon | chrono::Weekday::Wed | chrono::Weekday::Fri
            );
            assert_eq!(matches(&rule, day, anchor, policy), expected, "{day}");
            day = day + chrono::Days::new(1);
        }
    }

    #[test]
    fn empty_weekday_set_matches_nothing() {
        let rule = Recurrence::Weekdays { weekdays: vec![] };
        let anchor = date(2026, 1, 1);
        for offset in 0..14 {
            let candidate = anchor + chrono::Days::new(offset);
            assert!(!matches(&rule, candidate, anchor, RecurrencePolicy::legacy()));
        }
    }
}
