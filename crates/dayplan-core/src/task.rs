use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a series repeats. `interval` means repeat-every-N; whether it is
/// honored or ignored is decided by the evaluation policy, not the rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Recurrence {
    Daily { interval: u32 },
    Weekly { interval: u32 },
    Monthly { interval: u32 },
    /// Weekday numbers use 0=Sunday..6=Saturday.
    Weekdays { weekdays: Vec<u32> },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,

    pub title: String,

    #[serde(default)]
    pub description: Option<String>,

    pub duration_minutes: u32,

    pub color: String,

    #[serde(default)]
    pub recurrence: Option<Recurrence>,

    #[serde(default)]
    pub scheduled_date: Option<NaiveDateTime>,

    pub completed: bool,

    #[serde(default)]
    pub completed_at: Option<NaiveDateTime>,

    pub created_at: NaiveDateTime,

    #[serde(default)]
    pub parent_task_id: Option<String>,

    #[serde(default)]
    pub is_occurrence: bool,
}

/// Fields a caller may change through `TaskStore::update_task`. Identity,
/// creation time, and occurrence linkage are deliberately not here.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub duration_minutes: Option<u32>,
    pub color: Option<String>,
    pub recurrence: Option<Option<Recurrence>>,
}

impl Task {
    pub fn new(
        title: String,
        duration_minutes: u32,
        color: String,
        now: NaiveDateTime,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title,
            description: None,
            duration_minutes,
            color,
            recurrence: None,
            scheduled_date: None,
            completed: false,
            completed_at: None,
            created_at: now,
            parent_task_id: None,
            is_occurrence: false,
        }
    }

    /// A series definition is a task carrying a recurrence rule. It is the
    /// template occurrences are generated from and never sits on the grid
    /// itself.
    pub fn is_series(&self) -> bool {
        self.recurrence.is_some() && !self.is_occurrence
    }

    /// Derive the occurrence for this series on `date`. The id is a pure
    /// function of (series, date), which is what makes generation
    /// idempotent.
    pub fn occurrence_for(&self, date: NaiveDate) -> Task {
        Task {
            id: occurrence_id(&self.id, date),
            title: self.title.clone(),
            description: self.description.clone(),
            duration_minutes: self.duration_minutes,
            color: self.color.clone(),
            recurrence: self.recurrence.clone(),
            scheduled_date: None,
            completed: false,
            completed_at: None,
            created_at: self.created_at,
            parent_task_id: Some(self.id.clone()),
            is_occurrence: true,
        }
    }

    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(description) = &patch.description {
            self.description = description.clone();
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(color) = &patch.color {
            self.color = color.clone();
        }
        if let Some(recurrence) = &patch.recurrence {
            self.recurrence = recurrence.clone();
        }
    }
}

pub fn occurrence_id(series_id: &str, date: NaiveDate) -> String {
    format!("{}-{}", series_id, date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{Task, TaskPatch, occurrence_id};

    fn noon(y: i32, m: u32, d: u32) -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .expect("valid date")
            .and_hms_opt(12, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn occurrence_id_is_deterministic() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        assert_eq!(occurrence_id("abc", date), "abc-2026-03-02");
        assert_eq!(occurrence_id("abc", date), occurrence_id("abc", date));
    }

    #[test]
    fn occurrence_carries_own_state() {
        let mut series = Task::new("Standup".to_string(), 15, "#ff0000".to_string(), noon(2026, 3, 1));
        series.recurrence = Some(super::Recurrence::Daily { interval: 1 });
        series.completed = true;
        series.scheduled_date = Some(noon(2026, 3, 1));

        let date = NaiveDate::from_ymd_opt(2026, 3, 2).expect("valid date");
        let occurrence = series.occurrence_for(date);

        assert_eq!(occurrence.parent_task_id.as_deref(), Some(series.id.as_str()));
        assert!(occurrence.is_occurrence);
        assert!(!occurrence.completed);
        assert!(occurrence.scheduled_date.is_none());
        assert_eq!(occurrence.id, occurrence_id(&series.id, date));
    }

    #[test]
    fn patch_cannot_touch_identity() {
        let mut task = Task::new("Read".to_string(), 60, "#00ff00".to_string(), noon(2026, 1, 5));
        let id = task.id.clone();
        let created = task.created_at;

        task.apply_patch(&TaskPatch {
            title: Some("Read more".to_string()),
            duration_minutes: Some(90),
            ..TaskPatch::default()
        });

        assert_eq!(task.id, id);
        assert_eq!(task.created_at, created);
        assert_eq!(task.title, "Read more");
        assert_eq!(task.duration_minutes, 90);
    }
}
