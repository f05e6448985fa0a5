//! The time grid: the ordered slot sequence for a day and the mapping of
//! points in time onto slots.

use chrono::{NaiveDate, NaiveDateTime, Timelike};

use crate::task::Task;

pub const DEFAULT_GRANULARITY_MINUTES: u32 = 30;
pub const DEFAULT_START_HOUR: u32 = 6;
pub const DEFAULT_END_HOUR: u32 = 23;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeGrid {
    pub granularity_minutes: u32,
    pub start_hour: u32,
    pub end_hour: u32,
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self {
            granularity_minutes: DEFAULT_GRANULARITY_MINUTES,
            start_hour: DEFAULT_START_HOUR,
            end_hour: DEFAULT_END_HOUR,
        }
    }
}

impl TimeGrid {
    pub fn new(granularity_minutes: u32, start_hour: u32, end_hour: u32) -> Self {
        Self {
            // A zero granularity would make the slot sequence infinite.
            granularity_minutes: granularity_minutes.max(1),
            start_hour: start_hour.min(24),
            end_hour: end_hour.min(24),
        }
    }

    /// The 24-hour, hourly variant.
    pub fn full_day() -> Self {
        Self::new(60, 0, 24)
    }

    /// Slot start times spanning `[start_hour:00, end_hour:00)` of `date`.
    /// The iterator is lazy and restartable; clone it to walk the day again.
    pub fn slots(&self, date: NaiveDate) -> DaySlots {
        DaySlots {
            date,
            granularity_minutes: self.granularity_minutes,
            next_minute: self.start_hour * 60,
            end_minute: self.end_hour * 60,
        }
    }

    /// Floor `at` to the nearest slot boundary within the same day.
    pub fn slot_for(&self, at: NaiveDateTime) -> NaiveDateTime {
        let minute_of_day = at.hour() * 60 + at.minute();
        let floored = minute_of_day - minute_of_day % self.granularity_minutes;
        at.date()
            .and_hms_opt(floored / 60, floored % 60, 0)
            .unwrap_or_else(|| at.date().and_hms_opt(0, 0, 0).expect("midnight exists"))
    }

    /// Does the task's scheduled span cover `slot`? Tasks occupy
    /// `[scheduled, scheduled + duration)`.
    pub fn occupies(&self, task: &Task, slot: NaiveDateTime) -> bool {
        let Some(start) = task.scheduled_date else {
            return false;
        };
        let end = start + chrono::Duration::minutes(i64::from(task.duration_minutes));
        start <= slot && slot < end
    }

    /// Is `slot` the slot the task is anchored at? Comparison is by
    /// date + hour + minute; seconds and finer are ignored.
    pub fn starts_in_slot(&self, task: &Task, slot: NaiveDateTime) -> bool {
        let Some(start) = task.scheduled_date else {
            return false;
        };
        start.date() == slot.date()
            && start.hour() == slot.hour()
            && start.minute() == slot.minute()
    }
}

#[derive(Debug, Clone)]
pub struct DaySlots {
    date: NaiveDate,
    granularity_minutes: u32,
    next_minute: u32,
    end_minute: u32,
}

impl Iterator for DaySlots {
    type Item = NaiveDateTime;

    fn next(&mut self) -> Option<NaiveDateTime> {
        if self.next_minute >= self.end_minute {
            return None;
        }
        let minute = self.next_minute;
        self.next_minute += self.granularity_minutes;
        self.date.and_hms_opt(minute / 60, minute % 60, 0)
    }
}

pub fn format_duration(minutes: u32) -> String {
    let hours = minutes / 60;
    let mins = minutes % 60;

    if hours == 0 {
        format!("{mins} min")
    } else if mins == 0 {
        format!("{hours} hour{}", if hours > 1 { "s" } else { "" })
    } else {
        format!("{hours} hour{} {mins} min", if hours > 1 { "s" } else { "" })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{TimeGrid, format_duration};
    use crate::task::Task;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date")
    }

    #[test]
    fn default_grid_covers_six_to_eleven_pm() {
        let grid = TimeGrid::default();
        let slots: Vec<_> = grid.slots(day()).collect();

        assert_eq!(slots.len(), 34);
        assert_eq!(slots[0], day().and_hms_opt(6, 0, 0).expect("valid"));
        assert_eq!(slots[1], day().and_hms_opt(6, 30, 0).expect("valid"));
        assert_eq!(*slots.last().expect("nonempty"), day().and_hms_opt(22, 30, 0).expect("valid"));
    }

    #[test]
    fn full_day_grid_has_24_hourly_slots() {
        let grid = TimeGrid::full_day();
        let slots: Vec<_> = grid.slots(day()).collect();

        assert_eq!(slots.len(), 24);
        assert_eq!(slots[0], day().and_hms_opt(0, 0, 0).expect("valid"));
        assert_eq!(*slots.last().expect("nonempty"), day().and_hms_opt(23, 0, 0).expect("valid"));
    }

    #[test]
    fn slot_iterator_is_restartable() {
        let grid = TimeGrid::default();
        let slots = grid.slots(day());
        let first: Vec<_> = slots.clone().collect();
        let second: Vec<_> = slots.collect();
        assert_eq!(first, second);
    }

    #[test]
    fn slot_for_floors_within_the_day() {
        let grid = TimeGrid::default();
        let at = day().and_hms_opt(9, 44, 59).expect("valid");
        assert_eq!(grid.slot_for(at), day().and_hms_opt(9, 30, 0).expect("valid"));

        let exact = day().and_hms_opt(9, 30, 0).expect("valid");
        assert_eq!(grid.slot_for(exact), exact);
    }

    #[test]
    fn occupancy_covers_span_but_anchor_is_start_only() {
        let grid = TimeGrid::default();
        let mut task = Task::new(
            "Deep work".to_string(),
            90,
            "#3366ff".to_string(),
            day().and_hms_opt(8, 0, 0).expect("valid"),
        );
        task.scheduled_date = Some(day().and_hms_opt(9, 0, 0).expect("valid"));

        let nine = day().and_hms_opt(9, 0, 0).expect("valid");
        let ten = day().and_hms_opt(10, 0, 0).expect("valid");
        let ten_thirty = day().and_hms_opt(10, 30, 0).expect("valid");

        assert!(grid.occupies(&task, nine));
        assert!(grid.occupies(&task, ten));
        assert!(!grid.occupies(&task, ten_thirty));

        assert!(grid.starts_in_slot(&task, nine));
        assert!(!grid.starts_in_slot(&task, ten));
    }

    #[test]
    fn anchor_ignores_seconds() {
        let grid = TimeGrid::default();
        let mut task = Task::new(
            "Imported".to_string(),
            30,
            "#3366ff".to_string(),
            day().and_hms_opt(8, 0, 0).expect("valid"),
        );
        // Imported data can carry arbitrary seconds.
        task.scheduled_date = Some(day().and_hms_opt(9, 0, 45).expect("valid"));

        let nine = day().and_hms_opt(9, 0, 0).expect("valid");
        assert!(grid.starts_in_slot(&task, nine));
        assert!(!grid.starts_in_slot(&task, day().and_hms_opt(9, 30, 0).expect("valid")));
    }

    #[test]
    fn unscheduled_task_occupies_nothing() {
        let grid = TimeGrid::default();
        let task = Task::new(
            "Someday".to_string(),
            30,
            "#999999".to_string(),
            day().and_hms_opt(8, 0, 0).expect("valid"),
        );
        for slot in grid.slots(day()) {
            assert!(!grid.occupies(&task, slot));
        }
    }

    #[test]
    fn durations_format_like_the_editor() {
        assert_eq!(format_duration(45), "45 min");
        assert_eq!(format_duration(60), "1 hour");
        assert_eq!(format_duration(120), "2 hours");
        assert_eq!(format_duration(90), "1 hour 30 min");
    }
}
