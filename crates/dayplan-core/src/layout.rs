//! Positions the occurrences of a day on the rendered grid: vertical extent
//! from duration, horizontal partition when several tasks share a start
//! slot, and the resize gesture that edits duration.

use chrono::NaiveDateTime;
use tracing::{debug, instrument};

use crate::grid::TimeGrid;
use crate::store::{Persistence, TaskStore};
use crate::task::{Task, TaskPatch};

pub const SNAP_INCREMENT_MINUTES: u32 = 30;
pub const MIN_DURATION_MINUTES: u32 = 30;
pub const MAX_DURATION_MINUTES: u32 = 480;

/// Pixel height of one grid unit and the matching minutes-per-pixel scale.
/// One 30-minute slot renders 80px tall.
pub const UNIT_HEIGHT_PX: f32 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlotPosition {
    pub left_pct: f32,
    pub width_pct: f32,
    pub z_index: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct LayoutEngine {
    pub granularity_minutes: u32,
    pub unit_height_px: f32,
    pub min_height_px: f32,
}

impl Default for LayoutEngine {
    fn default() -> Self {
        Self {
            granularity_minutes: 30,
            unit_height_px: UNIT_HEIGHT_PX,
            min_height_px: UNIT_HEIGHT_PX,
        }
    }
}

impl LayoutEngine {
    /// Rendered height for a task of `duration_minutes`. During a live
    /// resize the caller passes the preview duration instead of the stored
    /// one.
    pub fn task_height(&self, duration_minutes: u32) -> f32 {
        let units = duration_minutes as f32 / self.granularity_minutes as f32;
        (units * self.unit_height_px).max(self.min_height_px)
    }

    /// Horizontal placement for `task_id` among the tasks sharing its start
    /// slot. The set is partitioned evenly in input order; stacking order
    /// increases with index so later entries paint on top. An id absent
    /// from the set gets the full-width single-occupant position rather
    /// than overlapping the first occupant.
    pub fn position_in_slot(&self, tasks_at_slot: &[Task], task_id: &str) -> SlotPosition {
        let total = tasks_at_slot.len();
        let Some(index) = tasks_at_slot.iter().position(|task| task.id == task_id) else {
            return SlotPosition {
                left_pct: 0.0,
                width_pct: 100.0,
                z_index: 10,
            };
        };

        if total <= 1 {
            return SlotPosition {
                left_pct: 0.0,
                width_pct: 100.0,
                z_index: 10,
            };
        }

        let width = 100.0 / total as f32;
        SlotPosition {
            left_pct: index as f32 * width,
            width_pct: width,
            z_index: 10 + index as u32,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResizeEdge {
    Top,
    Bottom,
}

#[derive(Debug, Clone, PartialEq)]
enum ResizeState {
    Idle,
    Resizing {
        task_id: String,
        edge: ResizeEdge,
        anchor_y: f32,
        original_duration: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResizeCommit {
    pub duration_minutes: u32,
}

/// The resize gesture as an explicit state machine: `Idle -> Resizing ->
/// Idle`. The preview value exists only while the gesture is active; the
/// store is touched solely with the value `release` returns. Gestures are
/// single-occupancy: `begin` refuses while another resize is in flight.
#[derive(Debug, Clone)]
pub struct ResizeGesture {
    state: ResizeState,
    minutes_per_pixel: f32,
}

impl Default for ResizeGesture {
    fn default() -> Self {
        Self {
            state: ResizeState::Idle,
            minutes_per_pixel: SNAP_INCREMENT_MINUTES as f32 / UNIT_HEIGHT_PX,
        }
    }
}

impl ResizeGesture {
    pub fn with_scale(minutes_per_pixel: f32) -> Self {
        Self {
            state: ResizeState::Idle,
            minutes_per_pixel,
        }
    }

    pub fn is_active(&self) -> bool {
        !matches!(self.state, ResizeState::Idle)
    }

    pub fn active_task(&self) -> Option<&str> {
        match &self.state {
            ResizeState::Idle => None,
            ResizeState::Resizing { task_id, .. } => Some(task_id),
        }
    }

    #[instrument(skip(self))]
    pub fn begin(
        &mut self,
        task_id: &str,
        edge: ResizeEdge,
        pointer_y: f32,
        current_duration: u32,
    ) -> bool {
        if self.is_active() {
            debug!(task_id, "resize refused, another gesture is active");
            return false;
        }
        self.state = ResizeState::Resizing {
            task_id: task_id.to_string(),
            edge,
            anchor_y: pointer_y,
            original_duration: current_duration,
        };
        true
    }

    /// Preview duration for the current pointer position. Deltas snap to
    /// 30-minute increments; the top edge grows the task as it moves
    /// earlier, the bottom edge as it moves later.
    pub fn preview(&self, pointer_y: f32) -> Option<u32> {
        let ResizeState::Resizing {
            edge,
            anchor_y,
            original_duration,
            ..
        } = &self.state
        else {
            return None;
        };

        let delta_px = pointer_y - anchor_y;
        let raw_minutes = delta_px * self.minutes_per_pixel;
        let snap = SNAP_INCREMENT_MINUTES as f32;
        let snapped = (raw_minutes / snap).round() as i64 * i64::from(SNAP_INCREMENT_MINUTES);

        let base = i64::from(*original_duration);
        let resized = match edge {
            ResizeEdge::Top => base - snapped,
            ResizeEdge::Bottom => base + snapped,
        };

        Some(resized.clamp(
            i64::from(MIN_DURATION_MINUTES),
            i64::from(MAX_DURATION_MINUTES),
        ) as u32)
    }

    /// Pointer release: commits the preview and returns to idle. Releasing
    /// without having moved yields the original duration, so committing it
    /// is a no-op for the caller's data.
    #[instrument(skip(self))]
    pub fn release(&mut self, pointer_y: f32) -> Option<(String, ResizeCommit)> {
        let duration = self.preview(pointer_y)?;
        let ResizeState::Resizing { task_id, .. } =
            std::mem::replace(&mut self.state, ResizeState::Idle)
        else {
            return None;
        };
        debug!(task_id = %task_id, duration, "resize committed");
        Some((
            task_id,
            ResizeCommit {
                duration_minutes: duration,
            },
        ))
    }

    /// Abandon the gesture without committing. Nothing binds this yet; it
    /// exists so an escape action can be added without reworking call
    /// sites.
    pub fn cancel(&mut self) {
        self.state = ResizeState::Idle;
    }
}

/// Pointer release at `pointer_y`: commit the gesture's final duration to
/// the store. No-op when the gesture is idle.
pub fn commit_resize<P: Persistence>(
    store: &mut TaskStore<P>,
    gesture: &mut ResizeGesture,
    pointer_y: f32,
) -> anyhow::Result<()> {
    let Some((task_id, commit)) = gesture.release(pointer_y) else {
        return Ok(());
    };
    store.update_task(
        &task_id,
        &TaskPatch {
            duration_minutes: Some(commit.duration_minutes),
            ..TaskPatch::default()
        },
    )
}

/// Drop an occurrence onto the grid: the drop point snaps to its slot and
/// overwrites any prior placement. Overlap with tasks already in the slot
/// is allowed; the horizontal partition keeps them distinguishable.
pub fn drop_on_slot<P: Persistence>(
    store: &mut TaskStore<P>,
    grid: &TimeGrid,
    task_id: &str,
    at: NaiveDateTime,
) -> anyhow::Result<()> {
    store.schedule_task(task_id, grid.slot_for(at))
}
