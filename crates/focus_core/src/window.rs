use chrono::{Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::recurrence::{self, Occurrence};
use crate::schedule::Schedule;

/// Which span of the calendar a view is asking for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    Day,
    #[default]
    Week,
}

impl ViewMode {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "day" => Some(Self::Day),
            "week" => Some(Self::Week),
            _ => None,
        }
    }
}

/// Half-open date range `[start, end)` queries and expansions run over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Window {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl Window {
    pub fn span(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single_day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date + Duration::days(1),
        }
    }

    /// Seven days beginning on the configured first day of the week.
    pub fn week_of(date: NaiveDate, week_start: Weekday) -> Self {
        let first = date.week(week_start).first_day();
        Self {
            start: first,
            end: first + Duration::days(7),
        }
    }

    pub fn for_view(reference: NaiveDate, view: ViewMode, week_start: Weekday) -> Self {
        match view {
            ViewMode::Day => Self::single_day(reference),
            ViewMode::Week => Self::week_of(reference, week_start),
        }
    }

    pub fn len_days(&self) -> i64 {
        self.end.signed_duration_since(self.start).num_days()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date < self.end
    }

    /// Whether a closed day range `[first, last]` touches this window.
    pub fn intersects_days(&self, first: NaiveDate, last: NaiveDate) -> bool {
        last >= self.start && first < self.end
    }

    pub fn days(self) -> impl Iterator<Item = NaiveDate> {
        (0..self.len_days().max(0)).map(move |i| self.start + Duration::days(i))
    }
}

/// Everything a calendar view needs to render one window.
#[derive(Debug, Clone, Serialize)]
pub struct WindowPlan {
    pub window: Window,
    pub occurrences: Vec<Occurrence>,
}

/// Resolves every schedule into concrete occurrences for the window
/// named by `reference` and `view`.
///
/// Non-recurring rows are included directly when their start falls in
/// the window; recurring rows are expanded. The result is ordered by
/// start time, with insertion order breaking ties.
pub fn plan_window(
    schedules: &[Schedule],
    reference: NaiveDate,
    view: ViewMode,
    week_start: Weekday,
) -> WindowPlan {
    let window = Window::for_view(reference, view, week_start);
    plan(schedules, window)
}

pub fn plan(schedules: &[Schedule], window: Window) -> WindowPlan {
    let mut occurrences: Vec<Occurrence> = Vec::new();
    for schedule in schedules {
        if !schedule.recurrence.is_recurring() {
            if window.contains(schedule.start_time.date()) {
                occurrences.push(Occurrence::single(schedule));
            }
        } else {
            occurrences.extend(recurrence::expand(schedule, window));
        }
    }
    occurrences.sort_by_key(|occurrence| occurrence.start);
    WindowPlan {
        window,
        occurrences,
    }
}
