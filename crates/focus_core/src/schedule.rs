use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Repeat pattern of a schedule series.
///
/// Stored as a lowercase string; values written by older clients that
/// this build no longer understands decode as `None` so legacy rows
/// keep loading.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Weekdays,
    Weekends,
    Monthly,
    Yearly,
}

impl Recurrence {
    pub fn is_recurring(self) -> bool {
        self != Recurrence::None
    }

    fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "daily" => Recurrence::Daily,
            "weekly" => Recurrence::Weekly,
            "weekdays" => Recurrence::Weekdays,
            "weekends" => Recurrence::Weekends,
            "monthly" => Recurrence::Monthly,
            "yearly" => Recurrence::Yearly,
            _ => Recurrence::None,
        }
    }
}

impl From<String> for Recurrence {
    fn from(value: String) -> Self {
        Recurrence::parse(&value)
    }
}

/// Fixed display palette; unknown stored values fall back to the default.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum EventColor {
    #[default]
    Blue,
    Green,
    Red,
    Orange,
    Purple,
    Teal,
    Pink,
    Gray,
}

impl EventColor {
    pub const ALL: [EventColor; 8] = [
        EventColor::Blue,
        EventColor::Green,
        EventColor::Red,
        EventColor::Orange,
        EventColor::Purple,
        EventColor::Teal,
        EventColor::Pink,
        EventColor::Gray,
    ];

    pub fn css_hex(self) -> &'static str {
        match self {
            EventColor::Blue => "#3b82f6",
            EventColor::Green => "#22c55e",
            EventColor::Red => "#ef4444",
            EventColor::Orange => "#f97316",
            EventColor::Purple => "#a855f7",
            EventColor::Teal => "#14b8a6",
            EventColor::Pink => "#ec4899",
            EventColor::Gray => "#6b7280",
        }
    }

    fn parse(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "blue" => EventColor::Blue,
            "green" => EventColor::Green,
            "red" => EventColor::Red,
            "orange" => EventColor::Orange,
            "purple" => EventColor::Purple,
            "teal" => EventColor::Teal,
            "pink" => EventColor::Pink,
            "gray" => EventColor::Gray,
            _ => EventColor::default(),
        }
    }
}

impl From<String> for EventColor {
    fn from(value: String) -> Self {
        EventColor::parse(&value)
    }
}

/// A calendar event series as stored in the `schedules` collection.
///
/// For a non-recurring schedule the stored times are the one and only
/// occurrence. For a recurring series they describe the first
/// occurrence; every generated instance reuses its time-of-day and
/// duration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Schedule {
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    #[serde(default)]
    pub color: EventColor,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub recurrence_end: Option<NaiveDate>,
    #[serde(default)]
    pub excluded_dates: Vec<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Schedule {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_event_times(self.start_time, self.end_time)
    }

    pub fn duration(&self) -> Duration {
        self.end_time - self.start_time
    }

    /// Exclusion dates that parse as ISO dates. Anything unparseable is
    /// ignored so a corrupt entry never breaks expansion.
    pub fn excluded_days(&self) -> Vec<NaiveDate> {
        self.excluded_dates
            .iter()
            .filter_map(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
            .collect()
    }
}

/// Parameters for creating a schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleDraft {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub start_time: NaiveDateTime,
    pub end_time: NaiveDateTime,
    pub color: EventColor,
    pub recurrence: Recurrence,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_end: Option<NaiveDate>,
    pub excluded_dates: Vec<String>,
}

impl ScheduleDraft {
    pub fn new(
        title: impl Into<String>,
        start_time: NaiveDateTime,
        end_time: NaiveDateTime,
    ) -> Self {
        Self {
            title: title.into(),
            description: None,
            start_time,
            end_time,
            color: EventColor::default(),
            recurrence: Recurrence::None,
            recurrence_end: None,
            excluded_dates: Vec::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_title(&self.title)?;
        validate_event_times(self.start_time, self.end_time)
    }
}

/// Partial edit to a schedule series. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<EventColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<Recurrence>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_end: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excluded_dates: Option<Vec<String>>,
}

impl SchedulePatch {
    /// Folds the patch into `schedule`, used to validate the merged
    /// record before anything is written.
    pub fn apply_to(&self, schedule: &mut Schedule) {
        if let Some(title) = &self.title {
            schedule.title = title.clone();
        }
        if let Some(description) = &self.description {
            schedule.description = Some(description.clone());
        }
        if let Some(start_time) = self.start_time {
            schedule.start_time = start_time;
        }
        if let Some(end_time) = self.end_time {
            schedule.end_time = end_time;
        }
        if let Some(color) = self.color {
            schedule.color = color;
        }
        if let Some(recurrence) = self.recurrence {
            schedule.recurrence = recurrence;
        }
        if let Some(recurrence_end) = self.recurrence_end {
            schedule.recurrence_end = Some(recurrence_end);
        }
        if let Some(excluded_dates) = &self.excluded_dates {
            schedule.excluded_dates = excluded_dates.clone();
        }
    }
}

pub fn validate_title(title: &str) -> Result<(), ValidationError> {
    if title.trim().is_empty() {
        return Err(ValidationError::EmptyTitle);
    }
    Ok(())
}

pub fn validate_event_times(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::EndNotAfterStart);
    }
    if start.date() != end.date() {
        return Err(ValidationError::SpansMultipleDays);
    }
    if end.time() > latest_end_of_day() {
        return Err(ValidationError::EndsAfterLatestSlot);
    }
    Ok(())
}

fn latest_end_of_day() -> NaiveTime {
    NaiveTime::from_hms_opt(23, 30, 0).unwrap()
}
