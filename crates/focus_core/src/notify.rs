//! Notification surface. The core only decides *what* to announce;
//! delivery (toasts, system notifications, web push) is a sink concern
//! and lives behind [`NotificationSink`].

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Error,
}

/// One user-facing announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn info(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Info,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn success(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Success,
            title: title.into(),
            body: body.into(),
        }
    }

    pub fn error(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            kind: NotificationKind::Error,
            title: title.into(),
            body: body.into(),
        }
    }
}

/// A reminder to fire shortly before a schedule occurrence begins.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderRequest {
    pub schedule_id: String,
    pub title: String,
    pub fire_at: DateTime<Utc>,
}

/// Where announcements go. Implementations decide presentation; sinks
/// that only show immediate messages can ignore the reminder hooks.
pub trait NotificationSink: Send + Sync {
    fn deliver(&self, notification: &Notification);

    /// Registers a future reminder. Replaces any pending reminder for
    /// the same schedule.
    fn schedule_reminder(&self, _reminder: &ReminderRequest) {}

    /// Drops any pending reminder for the schedule.
    fn clear_reminder(&self, _schedule_id: &str) {}
}

/// Swallows everything. Useful default when no UI is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl NotificationSink for NullSink {
    fn deliver(&self, _notification: &Notification) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        delivered: Mutex<Vec<Notification>>,
        reminders: Mutex<Vec<String>>,
    }

    impl NotificationSink for RecordingSink {
        fn deliver(&self, notification: &Notification) {
            self.delivered.lock().unwrap().push(notification.clone());
        }

        fn schedule_reminder(&self, reminder: &ReminderRequest) {
            self.reminders
                .lock()
                .unwrap()
                .push(reminder.schedule_id.clone());
        }
    }

    #[test]
    fn constructors_tag_the_kind() {
        assert_eq!(Notification::info("a", "b").kind, NotificationKind::Info);
        assert_eq!(
            Notification::success("a", "b").kind,
            NotificationKind::Success
        );
        assert_eq!(Notification::error("a", "b").kind, NotificationKind::Error);
    }

    #[test]
    fn sinks_work_as_trait_objects() {
        let sink = RecordingSink::default();
        let boxed: &dyn NotificationSink = &sink;
        boxed.deliver(&Notification::info("Synced", "2 todos refreshed"));
        boxed.schedule_reminder(&ReminderRequest {
            schedule_id: "sched-1".into(),
            title: "Standup".into(),
            fire_at: Utc::now(),
        });
        boxed.clear_reminder("sched-1");

        assert_eq!(sink.delivered.lock().unwrap().len(), 1);
        assert_eq!(sink.reminders.lock().unwrap().as_slice(), ["sched-1"]);
    }

    #[test]
    fn null_sink_accepts_everything() {
        let sink = NullSink;
        sink.deliver(&Notification::error("Sync failed", "network unreachable"));
        sink.clear_reminder("sched-9");
    }
}
