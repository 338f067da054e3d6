//! Runtime preferences, read from `FOCUS_*` environment variables.
//! A variable that is absent or unreadable falls back to the default,
//! so a bad environment never blocks startup.

use chrono::Weekday;
use tracing::warn;

use crate::window::ViewMode;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FocusConfig {
    /// First day of the calendar week.
    pub week_start: Weekday,
    /// View the calendar opens in.
    pub default_view: ViewMode,
    /// Focus session length.
    pub focus_minutes: u32,
    /// Short break length.
    pub short_break_minutes: u32,
    /// Long break length.
    pub long_break_minutes: u32,
    /// Focus sessions finished before a long break is offered.
    pub sessions_before_long_break: u32,
    /// How long before an event its reminder should fire.
    pub reminder_lead_minutes: i64,
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            week_start: Weekday::Sun,
            default_view: ViewMode::Week,
            focus_minutes: 25,
            short_break_minutes: 5,
            long_break_minutes: 15,
            sessions_before_long_break: 4,
            reminder_lead_minutes: 10,
        }
    }
}

impl FocusConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = lookup("FOCUS_WEEK_START") {
            match raw.parse::<Weekday>() {
                Ok(day) => config.week_start = day,
                Err(_) => warn!(value = %raw, "unreadable FOCUS_WEEK_START, keeping default"),
            }
        }
        if let Some(raw) = lookup("FOCUS_DEFAULT_VIEW") {
            match ViewMode::parse(&raw) {
                Some(view) => config.default_view = view,
                None => warn!(value = %raw, "unreadable FOCUS_DEFAULT_VIEW, keeping default"),
            }
        }
        read_u32(&lookup, "FOCUS_SESSION_MINUTES", &mut config.focus_minutes);
        read_u32(
            &lookup,
            "FOCUS_SHORT_BREAK_MINUTES",
            &mut config.short_break_minutes,
        );
        read_u32(
            &lookup,
            "FOCUS_LONG_BREAK_MINUTES",
            &mut config.long_break_minutes,
        );
        read_u32(
            &lookup,
            "FOCUS_SESSIONS_BEFORE_LONG_BREAK",
            &mut config.sessions_before_long_break,
        );
        // A cadence of zero would divide the cycle by nothing.
        config.sessions_before_long_break = config.sessions_before_long_break.max(1);
        if let Some(raw) = lookup("FOCUS_REMINDER_LEAD_MINUTES") {
            match raw.parse::<i64>() {
                Ok(minutes) => config.reminder_lead_minutes = minutes.max(0),
                Err(_) => {
                    warn!(value = %raw, "unreadable FOCUS_REMINDER_LEAD_MINUTES, keeping default")
                }
            }
        }
        config
    }
}

fn read_u32(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut u32) {
    if let Some(raw) = lookup(key) {
        match raw.parse::<u32>() {
            Ok(value) => *slot = value,
            Err(_) => warn!(value = %raw, key, "unreadable setting, keeping default"),
        }
    }
}
