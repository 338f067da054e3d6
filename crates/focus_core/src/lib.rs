//! Domain core for the focus planner: todos, schedules, recurrence
//! expansion, calendar geometry, timers and the stats derived from
//! them. Everything here is pure and synchronous; persistence and
//! change subscriptions live in `focus_sync`.

pub mod config;
pub mod error;
pub mod layout;
pub mod notify;
pub mod recurrence;
pub mod schedule;
pub mod stats;
pub mod timer;
pub mod todo;
pub mod window;

pub use config::FocusConfig;
pub use error::ValidationError;
pub use layout::{CalendarBlock, DragSelect, SlotRange};
pub use notify::{Notification, NotificationKind, NotificationSink, NullSink, ReminderRequest};
pub use recurrence::{expand, next_occurrence, occurs_on, Occurrence};
pub use schedule::{EventColor, Recurrence, Schedule, ScheduleDraft, SchedulePatch};
pub use stats::{Achievement, CompletionStats, DayActivity, FocusStats};
pub use timer::{FocusSession, Phase, SessionCycle, SessionOutcome};
pub use todo::{Priority, Todo, TodoDraft, TodoPatch};
pub use window::{plan_window, ViewMode, Window, WindowPlan};
