//! Read-only aggregation over todos: completion rate, focus time,
//! per-day activity and the achievement thresholds derived from them.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate};
use serde::Serialize;

use crate::todo::Todo;

/// Completion counters for a todo list.
///
/// `rate_percent` is 0 for an empty list; the division is guarded so
/// the value is always a real percentage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompletionStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub rate_percent: u32,
}

impl CompletionStats {
    pub fn of(todos: &[Todo]) -> Self {
        let total = todos.len();
        let completed = todos.iter().filter(|todo| todo.completed).count();
        let rate_percent = if total == 0 {
            0
        } else {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        };
        Self {
            total,
            completed,
            pending: total - completed,
            rate_percent,
        }
    }
}

/// Accumulated focus-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FocusStats {
    pub total_seconds: u64,
    pub session_count: u64,
    pub average_session_seconds: u64,
}

impl FocusStats {
    pub fn of(todos: &[Todo]) -> Self {
        let total_seconds = todos.iter().map(|todo| todo.total_time_spent).sum();
        let session_count = todos.iter().map(|todo| u64::from(todo.session_count)).sum();
        let average_session_seconds = if session_count == 0 {
            0
        } else {
            total_seconds / session_count
        };
        Self {
            total_seconds,
            session_count,
            average_session_seconds,
        }
    }
}

/// Work done on one calendar day.
///
/// Todos only carry aggregate counters, so each todo's full focus time
/// is attributed to the day it was last worked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DayActivity {
    pub date: NaiveDate,
    pub todos_worked: u32,
    pub seconds: u64,
}

/// Buckets todos by the day they were last worked on, oldest first.
pub fn daily_activity(todos: &[Todo]) -> Vec<DayActivity> {
    let mut buckets: BTreeMap<NaiveDate, (u32, u64)> = BTreeMap::new();
    for todo in todos {
        let Some(stamp) = todo.last_worked_at else {
            continue;
        };
        let entry = buckets.entry(stamp.date_naive()).or_default();
        entry.0 += 1;
        entry.1 += todo.total_time_spent;
    }
    buckets
        .into_iter()
        .map(|(date, (todos_worked, seconds))| DayActivity {
            date,
            todos_worked,
            seconds,
        })
        .collect()
}

/// Activity for every day of the trailing window ending at `today`,
/// quiet days included as zeros, oldest first.
pub fn activity_heatmap(todos: &[Todo], today: NaiveDate, days: u32) -> Vec<DayActivity> {
    let by_day: BTreeMap<NaiveDate, DayActivity> = daily_activity(todos)
        .into_iter()
        .map(|activity| (activity.date, activity))
        .collect();
    (0..days)
        .map(|offset| {
            let date = today - Duration::days(i64::from(days - 1 - offset));
            by_day.get(&date).copied().unwrap_or(DayActivity {
                date,
                todos_worked: 0,
                seconds: 0,
            })
        })
        .collect()
}

/// Consecutive days with focus activity, counted back from `today`.
///
/// A day with no work yet does not break the run; the streak then
/// continues from yesterday.
pub fn activity_streak(todos: &[Todo], today: NaiveDate) -> u32 {
    let days: Vec<NaiveDate> = daily_activity(todos)
        .into_iter()
        .map(|activity| activity.date)
        .collect();
    let mut cursor = if days.contains(&today) {
        today
    } else if days.contains(&(today - Duration::days(1))) {
        today - Duration::days(1)
    } else {
        return 0;
    };
    let mut streak = 0;
    while days.contains(&cursor) {
        streak += 1;
        cursor = cursor - Duration::days(1);
    }
    streak
}

/// Milestones surfaced on the stats page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Achievement {
    FirstSession,
    TenTasksDone,
    HundredSessions,
    TenHoursFocused,
    WeekStreak,
}

impl Achievement {
    pub fn title(self) -> &'static str {
        match self {
            Self::FirstSession => "First focus",
            Self::TenTasksDone => "Finisher",
            Self::HundredSessions => "Centurion",
            Self::TenHoursFocused => "Deep diver",
            Self::WeekStreak => "Seven in a row",
        }
    }
}

/// Achievements unlocked by the current todo list, in display order.
pub fn achievements(todos: &[Todo], today: NaiveDate) -> Vec<Achievement> {
    let completion = CompletionStats::of(todos);
    let focus = FocusStats::of(todos);
    let mut unlocked = Vec::new();
    if focus.session_count >= 1 {
        unlocked.push(Achievement::FirstSession);
    }
    if completion.completed >= 10 {
        unlocked.push(Achievement::TenTasksDone);
    }
    if focus.session_count >= 100 {
        unlocked.push(Achievement::HundredSessions);
    }
    if focus.total_seconds >= 10 * 3600 {
        unlocked.push(Achievement::TenHoursFocused);
    }
    if activity_streak(todos, today) >= 7 {
        unlocked.push(Achievement::WeekStreak);
    }
    unlocked
}
