use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

use crate::schedule::{EventColor, Recurrence, Schedule};
use crate::window::Window;

/// Hard bound on pattern steps per expansion. Keeps the engine total
/// over corrupt rows instead of looping on them.
pub const MAX_EXPANSION_STEPS: u32 = 365;

/// One concrete instance of a (possibly recurring) schedule.
///
/// Never persisted. Derived instances get a synthetic id built from the
/// parent id and the instance start, so re-expansion yields byte-equal
/// ids and UI lists can diff against them.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Occurrence {
    pub id: String,
    pub schedule_id: String,
    pub title: String,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub color: EventColor,
    pub derived: bool,
}

impl Occurrence {
    /// A non-recurring schedule standing as its own single occurrence.
    pub fn single(schedule: &Schedule) -> Self {
        Self {
            id: schedule.id.clone(),
            schedule_id: schedule.id.clone(),
            title: schedule.title.clone(),
            start: schedule.start_time,
            end: schedule.end_time,
            color: schedule.color,
            derived: false,
        }
    }

    fn derived_on(schedule: &Schedule, date: NaiveDate) -> Self {
        let start = date.and_time(schedule.start_time.time());
        let end = start + schedule.duration();
        Self {
            id: synthetic_id(&schedule.id, start),
            schedule_id: schedule.id.clone(),
            title: schedule.title.clone(),
            start,
            end,
            color: schedule.color,
            derived: true,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.start.date()
    }
}

fn synthetic_id(schedule_id: &str, start: NaiveDateTime) -> String {
    format!("{}@{}", schedule_id, start.format("%Y-%m-%dT%H:%M"))
}

/// Expands `schedule` into its occurrences inside `window`.
///
/// The sequence is lazy and finite; the iterator is `Clone`, so cloning
/// it (or calling `expand` again) restarts the walk from the beginning.
pub fn expand(schedule: &Schedule, window: Window) -> Occurrences {
    Occurrences::new(schedule.clone(), window)
}

/// Pure "does this series occur on `date`" check — the single-day
/// counterpart of [`expand`], used where only today matters.
pub fn occurs_on(schedule: &Schedule, date: NaiveDate) -> bool {
    let anchor = schedule.start_time.date();
    if !schedule.recurrence.is_recurring() {
        return date == anchor;
    }
    if date < anchor {
        return false;
    }
    if let Some(series_end) = schedule.recurrence_end {
        if date > series_end {
            return false;
        }
    }
    if schedule.excluded_days().contains(&date) {
        return false;
    }
    pattern_matches(schedule.recurrence, anchor, date)
}

/// First occurrence starting on or after `from`, scanning up to a year
/// ahead. Used for reminder scheduling.
pub fn next_occurrence(schedule: &Schedule, from: NaiveDate) -> Option<Occurrence> {
    let horizon = from.checked_add_signed(Duration::days(366))?;
    expand(schedule, Window::span(from, horizon)).next()
}

/// Lazy occurrence sequence produced by [`expand`].
#[derive(Debug, Clone)]
pub struct Occurrences {
    schedule: Schedule,
    window: Window,
    excluded: Vec<NaiveDate>,
    state: ExpandState,
}

#[derive(Debug, Clone, Copy)]
enum ExpandState {
    /// Non-recurring: the row itself, at most once.
    Single { done: bool },
    /// Single-day window: one pure predicate probe, no walking.
    Probe { date: NaiveDate, done: bool },
    /// Multi-day window: walk pattern dates measured from the series
    /// anchor, starting at the first candidate inside the window.
    Walk { offset: u32, steps: u32, done: bool },
}

impl Occurrences {
    fn new(schedule: Schedule, window: Window) -> Self {
        let excluded = schedule.excluded_days();
        let state = if !schedule.recurrence.is_recurring() {
            ExpandState::Single { done: false }
        } else if window.len_days() == 1 {
            ExpandState::Probe {
                date: window.start,
                done: false,
            }
        } else {
            let anchor = schedule.start_time.date();
            match first_offset_on_or_after(schedule.recurrence, anchor, window.start) {
                Some(offset) => ExpandState::Walk {
                    offset,
                    steps: 0,
                    done: false,
                },
                None => ExpandState::Walk {
                    offset: 0,
                    steps: 0,
                    done: true,
                },
            }
        };
        Self {
            schedule,
            window,
            excluded,
            state,
        }
    }

    fn next_single(&mut self) -> Option<Occurrence> {
        let ExpandState::Single { done } = self.state else {
            return None;
        };
        if done {
            return None;
        }
        self.state = ExpandState::Single { done: true };
        let first_day = self.schedule.start_time.date();
        let last_day = self.schedule.end_time.date();
        if self.window.intersects_days(first_day, last_day) {
            Some(Occurrence::single(&self.schedule))
        } else {
            None
        }
    }

    fn next_probe(&mut self) -> Option<Occurrence> {
        let ExpandState::Probe { date, done } = self.state else {
            return None;
        };
        if done {
            return None;
        }
        self.state = ExpandState::Probe { date, done: true };
        if occurs_on(&self.schedule, date) {
            Some(Occurrence::derived_on(&self.schedule, date))
        } else {
            None
        }
    }

    fn next_walk(&mut self) -> Option<Occurrence> {
        loop {
            let ExpandState::Walk { offset, steps, done } = self.state else {
                return None;
            };
            if done {
                return None;
            }
            if steps >= MAX_EXPANSION_STEPS {
                debug!(schedule_id = %self.schedule.id, "expansion step cap reached");
                self.finish_walk(offset, steps);
                return None;
            }
            let anchor = self.schedule.start_time.date();
            let Some(date) = nth_pattern_date(self.schedule.recurrence, anchor, offset) else {
                self.finish_walk(offset, steps);
                return None;
            };
            if date >= self.window.end {
                self.finish_walk(offset, steps);
                return None;
            }
            if let Some(series_end) = self.schedule.recurrence_end {
                if date > series_end {
                    self.finish_walk(offset, steps);
                    return None;
                }
            }
            self.state = ExpandState::Walk {
                offset: offset + 1,
                steps: steps + 1,
                done: false,
            };
            if date < self.window.start {
                continue;
            }
            if !pattern_matches(self.schedule.recurrence, anchor, date) {
                continue;
            }
            if self.excluded.contains(&date) {
                continue;
            }
            return Some(Occurrence::derived_on(&self.schedule, date));
        }
    }

    fn finish_walk(&mut self, offset: u32, steps: u32) {
        self.state = ExpandState::Walk {
            offset,
            steps,
            done: true,
        };
    }
}

impl Iterator for Occurrences {
    type Item = Occurrence;

    fn next(&mut self) -> Option<Occurrence> {
        match self.state {
            ExpandState::Single { .. } => self.next_single(),
            ExpandState::Probe { .. } => self.next_probe(),
            ExpandState::Walk { .. } => self.next_walk(),
        }
    }
}

/// The `offset`-th pattern date of a series, measured from the anchor.
///
/// Month and year offsets are always applied to the anchor itself, never
/// to a previously clamped date, so a series anchored on the 31st keeps
/// landing on month ends instead of drifting to the 28th.
fn nth_pattern_date(recurrence: Recurrence, anchor: NaiveDate, offset: u32) -> Option<NaiveDate> {
    match recurrence {
        Recurrence::None => (offset == 0).then_some(anchor),
        Recurrence::Daily | Recurrence::Weekdays | Recurrence::Weekends => {
            anchor.checked_add_signed(Duration::days(i64::from(offset)))
        }
        Recurrence::Weekly => anchor.checked_add_signed(Duration::days(i64::from(offset) * 7)),
        Recurrence::Monthly => add_months(anchor, offset),
        Recurrence::Yearly => add_months(anchor, offset.checked_mul(12)?),
    }
}

/// Smallest offset whose pattern date lands on or after `from`, so a
/// walk never has to crawl through years of history before the window.
fn first_offset_on_or_after(
    recurrence: Recurrence,
    anchor: NaiveDate,
    from: NaiveDate,
) -> Option<u32> {
    if from <= anchor {
        return Some(0);
    }
    let gap_days = from.signed_duration_since(anchor).num_days();
    let initial = match recurrence {
        Recurrence::None => 0,
        Recurrence::Daily | Recurrence::Weekdays | Recurrence::Weekends => gap_days,
        Recurrence::Weekly => gap_days / 7,
        Recurrence::Monthly => i64::from(months_between(anchor, from).max(0)),
        Recurrence::Yearly => i64::from((from.year() - anchor.year()).max(0)),
    };
    let mut offset = u32::try_from(initial).ok()?;
    // The closed-form jump can land one period short of `from`.
    for _ in 0..2 {
        let date = nth_pattern_date(recurrence, anchor, offset)?;
        if date >= from {
            return Some(offset);
        }
        offset = offset.checked_add(1)?;
    }
    nth_pattern_date(recurrence, anchor, offset)
        .filter(|date| *date >= from)
        .map(|_| offset)
}

fn pattern_matches(recurrence: Recurrence, anchor: NaiveDate, date: NaiveDate) -> bool {
    match recurrence {
        Recurrence::None => date == anchor,
        Recurrence::Daily => true,
        Recurrence::Weekdays => is_weekday(date),
        Recurrence::Weekends => !is_weekday(date),
        Recurrence::Weekly => date.weekday() == anchor.weekday(),
        Recurrence::Monthly => date.day() == clamped_day(anchor.day(), date.year(), date.month()),
        Recurrence::Yearly => {
            date.month() == anchor.month()
                && date.day() == clamped_day(anchor.day(), date.year(), date.month())
        }
    }
}

fn is_weekday(date: NaiveDate) -> bool {
    date.weekday().number_from_monday() <= 5
}

/// Day-of-month a series anchored on `anchor_day` lands on in the given
/// month: the anchor day, clamped to the month's length.
fn clamped_day(anchor_day: u32, year: i32, month: u32) -> u32 {
    anchor_day.min(days_in_month(year, month))
}

fn add_months(date: NaiveDate, months: u32) -> Option<NaiveDate> {
    let total_months = date.year() * 12 + (date.month() as i32 - 1) + months as i32;
    let target_year = total_months.div_euclid(12);
    let target_month = (total_months.rem_euclid(12) + 1) as u32;
    let day = date.day().min(days_in_month(target_year, target_month));
    NaiveDate::from_ymd_opt(target_year, target_month, day)
}

fn months_between(start: NaiveDate, end: NaiveDate) -> i32 {
    (end.year() - start.year()) * 12 + (end.month() as i32 - start.month() as i32)
}

fn days_in_month(year: i32, month: u32) -> u32 {
    match month {
        1 | 3 | 5 | 7 | 8 | 10 | 12 => 31,
        4 | 6 | 9 | 11 => 30,
        2 => {
            if is_leap_year(year) {
                29
            } else {
                28
            }
        }
        _ => 30,
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || year % 400 == 0
}
