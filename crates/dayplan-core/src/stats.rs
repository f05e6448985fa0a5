//! Completion and scheduling statistics, per series and overall.

use crate::task::Task;

#[derive(Debug, Clone)]
pub struct SeriesStats {
    pub task_id: String,
    pub title: String,
    pub total_instances: usize,
    pub completed_instances: usize,
    pub scheduled_instances: usize,
    pub completion_rate: f64,
}

#[derive(Debug, Clone)]
pub struct Statistics {
    /// Counts over the full instance population: standalone tasks, series
    /// definitions, and generated occurrences alike.
    pub total_tasks: usize,
    pub completed_tasks: usize,
    pub scheduled_tasks: usize,
    pub completion_rate: f64,
    pub scheduling_rate: f64,
    pub per_series: Vec<SeriesStats>,
}

pub fn compute(tasks: &[Task]) -> Statistics {
    let total_tasks = tasks.len();
    let completed_tasks = tasks.iter().filter(|t| t.completed).count();
    let scheduled_tasks = tasks.iter().filter(|t| t.scheduled_date.is_some()).count();

    // Each definition counts as its own instance, so the set is never empty.
    let per_series = tasks
        .iter()
        .filter(|t| t.parent_task_id.is_none())
        .map(|definition| {
            let instances: Vec<&Task> = tasks
                .iter()
                .filter(|t| {
                    t.id == definition.id || t.parent_task_id.as_deref() == Some(&definition.id)
                })
                .collect();
            let completed = instances.iter().filter(|t| t.completed).count();
            let scheduled = instances.iter().filter(|t| t.scheduled_date.is_some()).count();

            SeriesStats {
                task_id: definition.id.clone(),
                title: definition.title.clone(),
                total_instances: instances.len(),
                completed_instances: completed,
                scheduled_instances: scheduled,
                completion_rate: rate(completed, instances.len()),
            }
        })
        .collect();

    Statistics {
        total_tasks,
        completed_tasks,
        scheduled_tasks,
        completion_rate: rate(completed_tasks, total_tasks),
        scheduling_rate: rate(scheduled_tasks, total_tasks),
        per_series,
    }
}

fn rate(part: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::compute;
    use crate::task::{Recurrence, Task};

    fn now() -> chrono::NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 3, 2)
            .expect("valid date")
            .and_hms_opt(8, 0, 0)
            .expect("valid time")
    }

    #[test]
    fn empty_population_yields_zero_rates() {
        let stats = compute(&[]);
        assert_eq!(stats.total_tasks, 0);
        assert_eq!(stats.completion_rate, 0.0);
        assert_eq!(stats.scheduling_rate, 0.0);
        assert!(stats.per_series.is_empty());
    }

    #[test]
    fn series_counts_itself_plus_its_occurrences() {
        let mut series = Task::new("Gym".to_string(), 60, "#ff8800".to_string(), now());
        series.recurrence = Some(Recurrence::Daily { interval: 1 });

        let date = NaiveDate::from_ymd_opt(2026, 3, 3).expect("valid date");
        let mut occurrence = series.occurrence_for(date);
        occurrence.completed = true;
        occurrence.completed_at = Some(now());

        let standalone = Task::new("Taxes".to_string(), 120, "#0000ff".to_string(), now());

        let tasks = vec![series.clone(), occurrence, standalone];
        let stats = compute(&tasks);

        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.per_series.len(), 2);

        let gym = stats
            .per_series
            .iter()
            .find(|s| s.task_id == series.id)
            .expect("gym stats");
        assert_eq!(gym.total_instances, 2);
        assert_eq!(gym.completed_instances, 1);
        assert!((gym.completion_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn never_expanded_series_has_one_instance() {
        let mut series = Task::new("Review".to_string(), 30, "#00ffcc".to_string(), now());
        series.recurrence = Some(Recurrence::Weekly { interval: 1 });

        let stats = compute(&[series]);
        assert_eq!(stats.per_series.len(), 1);
        assert_eq!(stats.per_series[0].total_instances, 1);
        assert_eq!(stats.per_series[0].completion_rate, 0.0);
    }
}
