//! The task store: canonical in-memory task set with write-through
//! persistence behind an injected `Persistence` implementation.
//!
//! All mutations are synchronous and atomic with respect to the in-memory
//! model. Mutations addressing an unknown id are silent no-ops so a stale
//! caller cannot wedge the UI.

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, instrument};

use crate::recurrence::{self, RecurrencePolicy};
use crate::stats::{self, Statistics};
use crate::task::{Recurrence, Task, TaskPatch, occurrence_id};

/// Everything the store persists: the task collection plus the ids of
/// occurrences the user explicitly removed, so a reconciliation pass does
/// not resurrect them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreState {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub removed_occurrences: BTreeSet<String>,
}

pub trait Persistence {
    fn load(&self) -> anyhow::Result<StoreState>;
    fn save(&self, state: &StoreState) -> anyhow::Result<()>;
}

/// Production persistence: one JSON document in one file under the data
/// directory, replaced atomically on every save.
#[derive(Debug)]
pub struct JsonFileStore {
    pub path: PathBuf,
}

impl JsonFileStore {
    #[instrument(skip(data_dir))]
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        fs::create_dir_all(data_dir)
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let path = data_dir.join("tasks.data");
        if !path.exists() {
            fs::write(&path, "")?;
        }

        info!(file = %path.display(), "opened task store file");
        Ok(Self { path })
    }
}

impl Persistence for JsonFileStore {
    #[instrument(skip(self))]
    fn load(&self) -> anyhow::Result<StoreState> {
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed reading {}", self.path.display()))?;
        if raw.trim().is_empty() {
            return Ok(StoreState::default());
        }

        let state: StoreState = serde_json::from_str(&raw)
            .with_context(|| format!("failed parsing {}", self.path.display()))?;
        debug!(count = state.tasks.len(), "loaded tasks");
        Ok(state)
    }

    #[instrument(skip(self, state))]
    fn save(&self, state: &StoreState) -> anyhow::Result<()> {
        debug!(file = %self.path.display(), count = state.tasks.len(), "saving tasks atomically");

        let dir = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir)?;
        let serialized = serde_json::to_string(state)?;
        temp.write_all(serialized.as_bytes())?;
        temp.flush()?;

        temp.persist(&self.path)
            .map_err(|err| anyhow!("failed to persist {}: {}", self.path.display(), err))?;
        Ok(())
    }
}

/// In-memory persistence double for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: std::cell::RefCell<StoreState>,
}

impl Persistence for MemoryStore {
    fn load(&self) -> anyhow::Result<StoreState> {
        Ok(self.state.borrow().clone())
    }

    fn save(&self, state: &StoreState) -> anyhow::Result<()> {
        *self.state.borrow_mut() = state.clone();
        Ok(())
    }
}

/// What a caller supplies to create a task; the store owns id allocation
/// and timestamps.
#[derive(Debug, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub duration_minutes: u32,
    pub color: String,
    pub recurrence: Option<Recurrence>,
}

#[derive(Debug)]
pub struct TaskStore<P: Persistence> {
    tasks: Vec<Task>,
    removed_occurrences: BTreeSet<String>,
    persistence: P,
}

impl<P: Persistence> TaskStore<P> {
    pub fn open(persistence: P) -> anyhow::Result<Self> {
        let state = persistence.load().context("failed to load task store")?;
        Ok(Self {
            tasks: state.tasks,
            removed_occurrences: state.removed_occurrences,
            persistence,
        })
    }

    pub fn list_tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn add_task(&mut self, draft: TaskDraft, now: NaiveDateTime) -> anyhow::Result<Task> {
        let mut task = Task::new(draft.title, draft.duration_minutes, draft.color, now);
        task.description = draft.description;
        task.recurrence = draft.recurrence;

        self.tasks.push(task.clone());
        self.persist()?;
        info!(id = %task.id, "task added");
        Ok(task)
    }

    #[instrument(skip(self, patch))]
    pub fn update_task(&mut self, id: &str, patch: &TaskPatch) -> anyhow::Result<()> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "update for unknown id ignored");
            return Ok(());
        };
        task.apply_patch(patch);
        self.persist()
    }

    /// Remove the task and cascade to every occurrence it generated.
    /// Removing a single generated occurrence leaves a tombstone so the
    /// next reconciliation pass does not recreate it; removing a whole
    /// series clears that series' tombstones along with its occurrences.
    #[instrument(skip(self))]
    pub fn delete_task(&mut self, id: &str) -> anyhow::Result<()> {
        let Some(target) = self.get(id).cloned() else {
            debug!(id, "delete for unknown id ignored");
            return Ok(());
        };

        let before = self.tasks.len();
        self.tasks
            .retain(|t| t.id != id && t.parent_task_id.as_deref() != Some(id));

        if target.is_occurrence {
            self.removed_occurrences.insert(target.id.clone());
        } else {
            let cascade_prefix = format!("{id}-");
            self.removed_occurrences
                .retain(|tomb| !tomb.starts_with(&cascade_prefix));
        }

        info!(id, removed = before - self.tasks.len(), "task deleted");
        self.persist()
    }

    #[instrument(skip(self))]
    pub fn schedule_task(&mut self, id: &str, at: NaiveDateTime) -> anyhow::Result<()> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "schedule for unknown id ignored");
            return Ok(());
        };
        // Drops overwrite any prior placement; overlap is allowed and left
        // to the layout partition.
        task.scheduled_date = Some(at);
        self.persist()
    }

    #[instrument(skip(self))]
    pub fn unschedule_task(&mut self, id: &str) -> anyhow::Result<()> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "unschedule for unknown id ignored");
            return Ok(());
        };
        task.scheduled_date = None;
        self.persist()
    }

    /// Toggle completion. The completed timestamp exists exactly while the
    /// task is completed.
    #[instrument(skip(self))]
    pub fn complete_task(&mut self, id: &str, now: NaiveDateTime) -> anyhow::Result<()> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "complete for unknown id ignored");
            return Ok(());
        };

        task.completed = !task.completed;
        task.completed_at = if task.completed { Some(now) } else { None };
        self.persist()
    }

    /// The per-load reconciliation pass: ensure each series whose rule
    /// matches `date` has exactly one occurrence for that date. Idempotent
    /// on the derived occurrence id; tombstoned ids stay absent.
    #[instrument(skip(self))]
    pub fn generate_occurrences(
        &mut self,
        date: NaiveDate,
        policy: RecurrencePolicy,
    ) -> anyhow::Result<usize> {
        let mut generated = Vec::new();

        for series in self.tasks.iter().filter(|t| t.is_series()) {
            let Some(rule) = &series.recurrence else {
                continue;
            };
            if !recurrence::matches(rule, date, series.created_at.date(), policy) {
                continue;
            }

            let oid = occurrence_id(&series.id, date);
            if self.removed_occurrences.contains(&oid) {
                debug!(id = %oid, "occurrence tombstoned, skipping");
                continue;
            }
            if self.tasks.iter().any(|t| t.id == oid) {
                continue;
            }
            generated.push(series.occurrence_for(date));
        }

        let count = generated.len();
        if count > 0 {
            self.tasks.extend(generated);
            self.persist()?;
            info!(count, %date, "generated occurrences");
        }
        Ok(count)
    }

    /// The day's occurrence set: every task placed on `date`'s grid.
    pub fn occurrences_for_date(&self, date: NaiveDate) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.scheduled_date.is_some_and(|at| at.date() == date))
            .collect()
    }

    pub fn statistics(&self) -> Statistics {
        stats::compute(&self.tasks)
    }

    /// Replace the whole collection (import path). Tombstones are reset;
    /// the imported set is taken as the new truth.
    #[instrument(skip(self, tasks))]
    pub fn replace_all(&mut self, tasks: Vec<Task>) -> anyhow::Result<()> {
        self.tasks = tasks;
        self.removed_occurrences.clear();
        self.persist()
    }

    fn persist(&self) -> anyhow::Result<()> {
        let state = StoreState {
            tasks: self.tasks.clone(),
            removed_occurrences: self.removed_occurrences.clone(),
        };
        self.persistence.save(&state)
    }
}
