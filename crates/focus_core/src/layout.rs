//! Geometry for the week grid: projecting occurrences into day columns
//! and turning pointer drags into creation requests.
//!
//! Overlapping blocks are stacked in place rather than packed into
//! side-by-side lanes; the grid stays a pure projection of time.

use chrono::{Duration, NaiveDateTime, Timelike};
use serde::Serialize;

use crate::recurrence::Occurrence;
use crate::schedule::EventColor;
use crate::window::Window;

/// Grid snap for drag selection.
pub const SLOT_MINUTES: u32 = 15;
/// Shorter events still render at this height so they stay clickable.
pub const MIN_VISIBLE_MINUTES: u32 = 20;
pub const MINUTES_PER_DAY: u32 = 24 * 60;

/// One occurrence positioned on the grid, ready to render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalendarBlock {
    pub occurrence_id: String,
    pub schedule_id: String,
    pub title: String,
    pub color: EventColor,
    /// Day column inside the window, leftmost day is 0.
    pub day: u32,
    /// Minutes since midnight where the block begins.
    pub top_min: u32,
    /// True duration in minutes.
    pub span_min: u32,
    /// Rendered height in minutes, never below [`MIN_VISIBLE_MINUTES`].
    pub height_min: u32,
}

/// Rendered height for a block of the given duration.
pub fn visual_height(span_min: u32) -> u32 {
    span_min.max(MIN_VISIBLE_MINUTES)
}

/// Positions one occurrence inside `window`, or `None` when it falls
/// outside it.
pub fn project(occurrence: &Occurrence, window: Window) -> Option<CalendarBlock> {
    let date = occurrence.date();
    if !window.contains(date) {
        return None;
    }
    let day = date.signed_duration_since(window.start).num_days() as u32;
    let time = occurrence.start.time();
    let top_min = time.hour() * 60 + time.minute();
    let span_min = occurrence
        .end
        .signed_duration_since(occurrence.start)
        .num_minutes()
        .clamp(0, i64::from(MINUTES_PER_DAY)) as u32;
    Some(CalendarBlock {
        occurrence_id: occurrence.id.clone(),
        schedule_id: occurrence.schedule_id.clone(),
        title: occurrence.title.clone(),
        color: occurrence.color,
        day,
        top_min,
        span_min,
        height_min: visual_height(span_min),
    })
}

/// Projects a whole plan, keeping its time ordering.
pub fn layout(occurrences: &[Occurrence], window: Window) -> Vec<CalendarBlock> {
    occurrences
        .iter()
        .filter_map(|occurrence| project(occurrence, window))
        .collect()
}

/// A quantized pointer position on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridCell {
    pub day: u32,
    pub hour: u32,
    pub minute: u32,
}

impl GridCell {
    /// Snaps raw pointer coordinates onto the grid: day 0..=6,
    /// hour 0..=23, minute rounded down to a quarter hour.
    pub fn quantized(day: u32, hour: u32, minute: u32) -> Self {
        Self {
            day: day.min(6),
            hour: hour.min(23),
            minute: (minute.min(59) / SLOT_MINUTES) * SLOT_MINUTES,
        }
    }

    fn minutes(self) -> u32 {
        self.hour * 60 + self.minute
    }
}

/// The slot a completed drag selected, on a single day column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotRange {
    pub day: u32,
    pub start_min: u32,
    pub end_min: u32,
}

impl SlotRange {
    /// Maps the slot back onto concrete timestamps inside `window`.
    ///
    /// An `end_min` of 1440 resolves to the following midnight; the
    /// draft validators decide whether such a range is acceptable.
    pub fn resolve(self, window: Window) -> Option<(NaiveDateTime, NaiveDateTime)> {
        let date = window
            .start
            .checked_add_signed(Duration::days(i64::from(self.day)))?;
        let midnight = date.and_hms_opt(0, 0, 0)?;
        let start = midnight + Duration::minutes(i64::from(self.start_min));
        let end = midnight + Duration::minutes(i64::from(self.end_min));
        Some((start, end))
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
enum DragState {
    #[default]
    Idle,
    Dragging { anchor: GridCell, current: GridCell },
}

/// Drag-to-create tracker for the week grid.
///
/// Lives beside the rendered grid and consumes pointer events; it emits
/// a [`SlotRange`] only on a completed drag. The selection stays on the
/// day column first touched, so horizontal travel changes nothing but
/// is not an error.
#[derive(Debug, Default, Clone, Copy)]
pub struct DragSelect {
    state: DragState,
}

impl DragSelect {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Live selection rectangle for preview rendering.
    pub fn preview(&self) -> Option<SlotRange> {
        match self.state {
            DragState::Dragging { anchor, current } => Some(selected_range(anchor, current)),
            DragState::Idle => None,
        }
    }

    pub fn pointer_down(&mut self, day: u32, hour: u32, minute: u32) {
        let cell = GridCell::quantized(day, hour, minute);
        self.state = DragState::Dragging {
            anchor: cell,
            current: cell,
        };
    }

    pub fn pointer_move(&mut self, day: u32, hour: u32, minute: u32) {
        if let DragState::Dragging { anchor, .. } = self.state {
            self.state = DragState::Dragging {
                anchor,
                current: GridCell::quantized(day, hour, minute),
            };
        }
    }

    /// Completes the drag, yielding the selected slot. A release with
    /// no drag in progress yields nothing.
    pub fn pointer_up(&mut self) -> Option<SlotRange> {
        match std::mem::take(&mut self.state) {
            DragState::Dragging { anchor, current } => Some(selected_range(anchor, current)),
            DragState::Idle => None,
        }
    }

    /// Abandons the drag without emitting anything.
    pub fn pointer_leave(&mut self) {
        self.state = DragState::Idle;
    }
}

/// Orders the two drag endpoints; a zero-length selection widens to a
/// full hour so a plain click still creates a usable event.
fn selected_range(anchor: GridCell, current: GridCell) -> SlotRange {
    let lo = anchor.minutes().min(current.minutes());
    let hi = anchor.minutes().max(current.minutes());
    let (start_min, end_min) = if lo == hi {
        (lo, (lo + 60).min(MINUTES_PER_DAY))
    } else {
        (lo, hi)
    };
    SlotRange {
        day: anchor.day,
        start_min,
        end_min,
    }
}
