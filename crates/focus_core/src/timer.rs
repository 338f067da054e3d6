//! Focus timer sessions that survive restarts.
//!
//! A session never ticks: it stores the instant it was started plus the
//! seconds banked before that, and every read recomputes elapsed time
//! from the wall clock. Persisting the struct and loading it later
//! resumes the countdown exactly where it stands.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::FocusConfig;

pub const DEFAULT_FOCUS_SECONDS: u64 = 25 * 60;
pub const DEFAULT_SHORT_BREAK_SECONDS: u64 = 5 * 60;
pub const DEFAULT_LONG_BREAK_SECONDS: u64 = 15 * 60;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Focus,
    ShortBreak,
    LongBreak,
}

impl Phase {
    pub fn is_break(self) -> bool {
        matches!(self, Phase::ShortBreak | Phase::LongBreak)
    }
}

/// A countdown toward `target_seconds`, optionally bound to a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FocusSession {
    pub todo_id: Option<String>,
    pub phase: Phase,
    pub target_seconds: u64,
    accumulated_seconds: u64,
    started_at: Option<DateTime<Utc>>,
}

/// What a finished session amounted to, ready to be logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub todo_id: Option<String>,
    pub phase: Phase,
    pub seconds: u64,
    /// Whether the target was reached before the session ended.
    pub completed: bool,
}

impl FocusSession {
    /// A paused session at zero elapsed time.
    pub fn new(phase: Phase, target_seconds: u64, todo_id: Option<String>) -> Self {
        Self {
            todo_id,
            phase,
            target_seconds,
            accumulated_seconds: 0,
            started_at: None,
        }
    }

    pub fn focus(todo_id: Option<String>) -> Self {
        Self::new(Phase::Focus, DEFAULT_FOCUS_SECONDS, todo_id)
    }

    pub fn breather() -> Self {
        Self::new(Phase::ShortBreak, DEFAULT_SHORT_BREAK_SECONDS, None)
    }

    pub fn is_running(&self) -> bool {
        self.started_at.is_some()
    }

    /// Starts the countdown. Calling on a running session keeps the
    /// original anchor.
    pub fn start(&mut self, now: DateTime<Utc>) {
        if self.started_at.is_none() {
            self.started_at = Some(now);
        }
    }

    /// Banks the running segment and stops the countdown.
    pub fn pause(&mut self, now: DateTime<Utc>) {
        if let Some(anchor) = self.started_at.take() {
            self.accumulated_seconds += segment_seconds(anchor, now);
        }
    }

    /// Seconds spent so far, banked plus the live segment.
    pub fn elapsed_seconds(&self, now: DateTime<Utc>) -> u64 {
        let live = self
            .started_at
            .map(|anchor| segment_seconds(anchor, now))
            .unwrap_or(0);
        self.accumulated_seconds + live
    }

    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> u64 {
        self.target_seconds.saturating_sub(self.elapsed_seconds(now))
    }

    pub fn is_complete(&self, now: DateTime<Utc>) -> bool {
        self.elapsed_seconds(now) >= self.target_seconds
    }

    /// Ends the session and reports what it amounted to.
    pub fn finish(mut self, now: DateTime<Utc>) -> SessionOutcome {
        self.pause(now);
        SessionOutcome {
            todo_id: self.todo_id,
            phase: self.phase,
            seconds: self.accumulated_seconds,
            completed: self.accumulated_seconds >= self.target_seconds,
        }
    }
}

/// Alternates focus and break phases, inserting a long break after every
/// Nth finished focus session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCycle {
    focus_finished: u32,
}

impl SessionCycle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Focus sessions finished since the cycle began.
    pub fn focus_finished(&self) -> u32 {
        self.focus_finished
    }

    /// Records a finished phase and names the one that should follow.
    pub fn advance(&mut self, finished: Phase, config: &FocusConfig) -> Phase {
        match finished {
            Phase::Focus => {
                self.focus_finished += 1;
                let cadence = config.sessions_before_long_break.max(1);
                if self.focus_finished % cadence == 0 {
                    Phase::LongBreak
                } else {
                    Phase::ShortBreak
                }
            }
            Phase::ShortBreak | Phase::LongBreak => Phase::Focus,
        }
    }

    /// Builds a session for a phase, sized from the configuration.
    pub fn session_for(
        &self,
        phase: Phase,
        config: &FocusConfig,
        todo_id: Option<String>,
    ) -> FocusSession {
        let minutes = match phase {
            Phase::Focus => config.focus_minutes,
            Phase::ShortBreak => config.short_break_minutes,
            Phase::LongBreak => config.long_break_minutes,
        };
        FocusSession::new(phase, u64::from(minutes) * 60, todo_id)
    }
}

/// Length of a running segment; a clock that moved backwards counts as
/// zero rather than underflowing.
fn segment_seconds(anchor: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    now.signed_duration_since(anchor).num_seconds().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    #[test]
    fn accumulates_only_while_running() {
        let mut session = FocusSession::focus(Some("todo-1".into()));
        session.start(at(0));
        session.pause(at(300));
        assert_eq!(session.elapsed_seconds(at(600)), 300, "paused time is free");

        session.start(at(600));
        assert_eq!(session.elapsed_seconds(at(900)), 600);
    }

    #[test]
    fn elapsed_recomputes_from_wall_clock_after_a_restart() {
        let mut session = FocusSession::focus(None);
        session.start(at(0));

        let stored = serde_json::to_string(&session).unwrap();
        let revived: FocusSession = serde_json::from_str(&stored).unwrap();

        assert!(revived.is_running());
        assert_eq!(revived.elapsed_seconds(at(120)), 120);
    }

    #[test]
    fn remaining_time_saturates_at_zero() {
        let mut session = FocusSession::new(Phase::Focus, 60, None);
        session.start(at(0));
        assert_eq!(session.remaining_seconds(at(45)), 15);
        assert!(!session.is_complete(at(45)));
        assert_eq!(session.remaining_seconds(at(90)), 0);
        assert!(session.is_complete(at(90)));
    }

    #[test]
    fn starting_twice_keeps_the_first_anchor() {
        let mut session = FocusSession::focus(None);
        session.start(at(0));
        session.start(at(60));
        session.pause(at(120));
        assert_eq!(session.elapsed_seconds(at(120)), 120);
    }

    #[test]
    fn pausing_a_paused_session_changes_nothing() {
        let mut session = FocusSession::focus(None);
        session.pause(at(100));
        assert_eq!(session.elapsed_seconds(at(200)), 0);
    }

    #[test]
    fn a_backwards_clock_never_underflows() {
        let mut session = FocusSession::focus(None);
        session.start(at(100));
        session.pause(at(40));
        assert_eq!(session.elapsed_seconds(at(200)), 0);
    }

    #[test]
    fn finish_reports_the_phase_and_banked_seconds() {
        let mut session = FocusSession::new(Phase::ShortBreak, 300, Some("todo-9".into()));
        session.start(at(0));
        let outcome = session.finish(at(180));
        assert_eq!(outcome.phase, Phase::ShortBreak);
        assert_eq!(outcome.todo_id.as_deref(), Some("todo-9"));
        assert_eq!(outcome.seconds, 180);
        assert!(!outcome.completed, "180 of 300 seconds is not a full break");
    }

    #[test]
    fn overshooting_the_target_counts_as_completed() {
        let mut session = FocusSession::new(Phase::Focus, 60, None);
        session.start(at(0));
        let outcome = session.finish(at(75));
        assert_eq!(outcome.seconds, 75);
        assert!(outcome.completed);
    }

    #[test]
    fn default_targets_follow_the_pomodoro_shape() {
        assert_eq!(FocusSession::focus(None).target_seconds, 1500);
        assert_eq!(FocusSession::breather().target_seconds, 300);
        assert!(FocusSession::breather().phase.is_break());
    }

    #[test]
    fn cycle_offers_a_long_break_after_the_fourth_focus() {
        let config = FocusConfig::default();
        let mut cycle = SessionCycle::new();
        for round in 1..=3 {
            assert_eq!(cycle.advance(Phase::Focus, &config), Phase::ShortBreak);
            assert_eq!(cycle.focus_finished(), round);
            assert_eq!(cycle.advance(Phase::ShortBreak, &config), Phase::Focus);
        }
        assert_eq!(cycle.advance(Phase::Focus, &config), Phase::LongBreak);
        assert_eq!(cycle.advance(Phase::LongBreak, &config), Phase::Focus);
    }

    #[test]
    fn cycle_sizes_sessions_from_the_config() {
        let config = FocusConfig {
            focus_minutes: 50,
            long_break_minutes: 20,
            ..FocusConfig::default()
        };
        let cycle = SessionCycle::new();

        let focus = cycle.session_for(Phase::Focus, &config, Some("todo-1".into()));
        assert_eq!(focus.target_seconds, 3000);
        assert_eq!(focus.todo_id.as_deref(), Some("todo-1"));

        let rest = cycle.session_for(Phase::LongBreak, &config, None);
        assert_eq!(rest.target_seconds, 1200);
        assert!(rest.phase.is_break());
    }
}
