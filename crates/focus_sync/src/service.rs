//! The application-facing service: one user's todos and schedules,
//! cached in memory and kept current through the store's change feed.
//!
//! Reads come from the cache. Writes go to the store first; the store
//! answers each accepted write with a change event, and the handler
//! re-fetches the touched collection. Completion toggles and focus
//! logging additionally apply their edit to the cache up front so the
//! UI never waits on the round trip; a pending-write guard keeps a
//! concurrent re-fetch from clobbering that edit, and a failed write
//! restores the server's truth by re-fetching.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use anyhow::{bail, Context};
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use tracing::{debug, error, instrument, warn};

use focus_core::notify::{Notification, NotificationSink, ReminderRequest};
use focus_core::recurrence;
use focus_core::schedule::{validate_title, Schedule, ScheduleDraft, SchedulePatch};
use focus_core::stats::{self, Achievement, CompletionStats, DayActivity, FocusStats};
use focus_core::timer::{Phase, SessionOutcome};
use focus_core::todo::{Todo, TodoDraft, TodoPatch};
use focus_core::window::{plan_window, ViewMode, WindowPlan};
use focus_core::FocusConfig;

use crate::error::{StoreError, StoreResult, SyncError, SyncResult};
use crate::store::{ChangeEvent, ChangeHandler, Collection, Query, RecordStore, Subscription};

#[derive(Clone)]
pub struct SyncService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    store: Arc<dyn RecordStore>,
    owner_id: String,
    config: FocusConfig,
    sink: Option<Box<dyn NotificationSink>>,
    state: RwLock<CacheState>,
    pending: Mutex<PendingWrites>,
    subscriptions: Mutex<Vec<Subscription>>,
}

#[derive(Default)]
struct CacheState {
    todos: Vec<Todo>,
    schedules: Vec<Schedule>,
}

/// Optimistic edits still waiting on the backend, keyed by record and
/// valued by a token so an older write cannot clear the guard a newer
/// write installed.
#[derive(Default)]
struct PendingWrites {
    next_token: u64,
    rows: HashMap<(Collection, String), u64>,
}

pub struct SyncServiceBuilder {
    store: Option<Arc<dyn RecordStore>>,
    owner_id: String,
    config: FocusConfig,
    sink: Option<Box<dyn NotificationSink>>,
}

impl SyncServiceBuilder {
    pub fn new() -> Self {
        Self {
            store: None,
            owner_id: "local".to_owned(),
            config: FocusConfig::default(),
            sink: None,
        }
    }

    pub fn store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn owner(mut self, owner_id: impl Into<String>) -> Self {
        self.owner_id = owner_id.into();
        self
    }

    pub fn config(mut self, config: FocusConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifications(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> anyhow::Result<SyncService> {
        let Some(store) = self.store else {
            bail!("a record store is required");
        };
        let inner = Arc::new(ServiceInner {
            store,
            owner_id: self.owner_id,
            config: self.config,
            sink: self.sink,
            state: RwLock::new(CacheState::default()),
            pending: Mutex::new(PendingWrites::default()),
            subscriptions: Mutex::new(Vec::new()),
        });
        for collection in [Collection::Todos, Collection::Schedules] {
            let weak = Arc::downgrade(&inner);
            let handler: ChangeHandler = Arc::new(move |event: &ChangeEvent| {
                ServiceInner::on_change(&weak, event);
            });
            let id = inner
                .store
                .subscribe(collection, handler)
                .with_context(|| format!("subscribing to {collection} changes"))?;
            inner
                .subscriptions
                .lock()
                .push(Subscription::new(&inner.store, id));
        }
        inner
            .refresh_collection(Collection::Todos)
            .context("initial todo fetch")?;
        inner
            .refresh_collection(Collection::Schedules)
            .context("initial schedule fetch")?;
        debug!(owner = %inner.owner_id, "sync service ready");
        Ok(SyncService { inner })
    }
}

impl Default for SyncServiceBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncService {
    pub fn builder() -> SyncServiceBuilder {
        SyncServiceBuilder::new()
    }

    pub fn config(&self) -> &FocusConfig {
        &self.inner.config
    }

    /// Snapshot of the cached todo list.
    pub fn todos(&self) -> Vec<Todo> {
        self.inner.state.read().todos.clone()
    }

    /// Snapshot of the cached schedule list.
    pub fn schedules(&self) -> Vec<Schedule> {
        self.inner.state.read().schedules.clone()
    }

    /// Re-fetches both collections.
    pub fn refresh(&self) -> StoreResult<()> {
        self.inner.refresh_collection(Collection::Todos)?;
        self.inner.refresh_collection(Collection::Schedules)
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn create_todo(&self, draft: TodoDraft) -> SyncResult<Todo> {
        draft.validate()?;
        let mut row = serde_json::to_value(&draft).map_err(StoreError::from)?;
        if let Some(fields) = row.as_object_mut() {
            fields.insert("owner_id".into(), Value::String(self.inner.owner_id.clone()));
            fields.insert("completed".into(), Value::Bool(false));
            fields.insert("total_time_spent".into(), Value::from(0));
            fields.insert("session_count".into(), Value::from(0));
        }
        let stored = self
            .inner
            .store
            .insert(Collection::Todos, row)
            .map_err(|e| self.inner.surface_failure(Collection::Todos, "save the todo", e))?;
        let todo: Todo = serde_json::from_value(stored).map_err(StoreError::from)?;
        debug!(id = %todo.id, "todo created");
        Ok(todo)
    }

    #[instrument(skip(self, patch))]
    pub fn update_todo(&self, id: &str, patch: TodoPatch) -> SyncResult<Todo> {
        if let Some(title) = &patch.title {
            validate_title(title)?;
        }
        let row = serde_json::to_value(&patch).map_err(StoreError::from)?;
        let stored = self
            .inner
            .store
            .update(Collection::Todos, id, row)
            .map_err(|e| self.inner.surface_failure(Collection::Todos, "update the todo", e))?;
        Ok(serde_json::from_value(stored).map_err(StoreError::from)?)
    }

    #[instrument(skip(self))]
    pub fn delete_todo(&self, id: &str) -> SyncResult<()> {
        self.inner
            .store
            .delete(Collection::Todos, id)
            .map_err(|e| self.inner.surface_failure(Collection::Todos, "delete the todo", e))?;
        Ok(())
    }

    /// Flips a todo's completion state, cache first.
    #[instrument(skip(self))]
    pub fn toggle_todo_completed(&self, id: &str) -> SyncResult<bool> {
        let next = {
            let mut state = self.inner.state.write();
            let Some(todo) = state.todos.iter_mut().find(|todo| todo.id == id) else {
                return Err(StoreError::not_found("todo", id).into());
            };
            todo.completed = !todo.completed;
            todo.completed
        };
        let token = self.inner.mark_pending(Collection::Todos, id);
        let result = self
            .inner
            .store
            .update(Collection::Todos, id, json!({ "completed": next }));
        self.inner.clear_pending(Collection::Todos, id, token);
        match result {
            Ok(_) => {
                self.inner.refresh_collection(Collection::Todos)?;
                Ok(next)
            }
            Err(error) => {
                Err(self
                    .inner
                    .surface_failure(Collection::Todos, "update the todo", error))
            }
        }
    }

    /// Books a finished focus session onto its todo: counters are
    /// incremented server-side so two devices logging at once cannot
    /// lose seconds. Break sessions and unbound sessions book nothing.
    #[instrument(skip(self, outcome), fields(todo_id = ?outcome.todo_id, seconds = outcome.seconds))]
    pub fn log_focus(&self, outcome: &SessionOutcome) -> SyncResult<()> {
        if outcome.phase != Phase::Focus || outcome.seconds == 0 {
            return Ok(());
        }
        let Some(todo_id) = outcome.todo_id.as_deref() else {
            return Ok(());
        };
        let worked_at = Utc::now();
        {
            let mut state = self.inner.state.write();
            let Some(todo) = state.todos.iter_mut().find(|todo| todo.id == todo_id) else {
                return Err(StoreError::not_found("todo", todo_id).into());
            };
            todo.record_focus(outcome.seconds, worked_at);
        }
        let token = self.inner.mark_pending(Collection::Todos, todo_id);
        let result = self
            .inner
            .store
            .increment(
                Collection::Todos,
                todo_id,
                &[
                    ("total_time_spent", outcome.seconds as i64),
                    ("session_count", 1),
                ],
            )
            .and_then(|_| {
                self.inner.store.update(
                    Collection::Todos,
                    todo_id,
                    json!({ "last_worked_at": worked_at.to_rfc3339() }),
                )
            });
        self.inner.clear_pending(Collection::Todos, todo_id, token);
        match result {
            Ok(_) => {
                self.inner.refresh_collection(Collection::Todos)?;
                Ok(())
            }
            Err(error) => {
                Err(self
                    .inner
                    .surface_failure(Collection::Todos, "log the session", error))
            }
        }
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub fn create_schedule(&self, draft: ScheduleDraft) -> SyncResult<Schedule> {
        draft.validate()?;
        let mut row = serde_json::to_value(&draft).map_err(StoreError::from)?;
        if let Some(fields) = row.as_object_mut() {
            fields.insert("owner_id".into(), Value::String(self.inner.owner_id.clone()));
        }
        let stored = self
            .inner
            .store
            .insert(Collection::Schedules, row)
            .map_err(|e| self.inner.surface_failure(Collection::Schedules, "save the event", e))?;
        let schedule: Schedule = serde_json::from_value(stored).map_err(StoreError::from)?;
        self.inner.queue_reminder(&schedule);
        debug!(id = %schedule.id, "schedule created");
        Ok(schedule)
    }

    /// Applies a partial edit. The merged record is validated before
    /// anything is sent, so a patch cannot push a stored event into an
    /// invalid shape.
    #[instrument(skip(self, patch))]
    pub fn update_schedule(&self, id: &str, patch: SchedulePatch) -> SyncResult<Schedule> {
        let merged = {
            let state = self.inner.state.read();
            let Some(current) = state.schedules.iter().find(|schedule| schedule.id == id) else {
                return Err(StoreError::not_found("schedule", id).into());
            };
            let mut merged = current.clone();
            patch.apply_to(&mut merged);
            merged
        };
        merged.validate()?;
        let row = serde_json::to_value(&patch).map_err(StoreError::from)?;
        let stored = self
            .inner
            .store
            .update(Collection::Schedules, id, row)
            .map_err(|e| {
                self.inner
                    .surface_failure(Collection::Schedules, "update the event", e)
            })?;
        let schedule: Schedule = serde_json::from_value(stored).map_err(StoreError::from)?;
        self.inner.queue_reminder(&schedule);
        Ok(schedule)
    }

    #[instrument(skip(self))]
    pub fn delete_schedule(&self, id: &str) -> SyncResult<()> {
        self.inner.store.delete(Collection::Schedules, id).map_err(|e| {
            self.inner
                .surface_failure(Collection::Schedules, "delete the event", e)
        })?;
        if let Some(sink) = &self.inner.sink {
            sink.clear_reminder(id);
        }
        Ok(())
    }

    /// Calendar occurrences for the day or week around `reference`.
    pub fn plan(&self, reference: NaiveDate, view: ViewMode) -> WindowPlan {
        let state = self.inner.state.read();
        plan_window(&state.schedules, reference, view, self.inner.config.week_start)
    }

    pub fn completion_stats(&self) -> CompletionStats {
        CompletionStats::of(&self.inner.state.read().todos)
    }

    pub fn focus_stats(&self) -> FocusStats {
        FocusStats::of(&self.inner.state.read().todos)
    }

    pub fn daily_activity(&self) -> Vec<DayActivity> {
        stats::daily_activity(&self.inner.state.read().todos)
    }

    /// Per-day activity for the trailing `days` ending at `today`,
    /// quiet days included.
    pub fn activity_heatmap(&self, today: NaiveDate, days: u32) -> Vec<DayActivity> {
        stats::activity_heatmap(&self.inner.state.read().todos, today, days)
    }

    pub fn achievements(&self, today: NaiveDate) -> Vec<Achievement> {
        stats::achievements(&self.inner.state.read().todos, today)
    }
}

impl ServiceInner {
    fn on_change(weak: &Weak<ServiceInner>, event: &ChangeEvent) {
        let Some(inner) = weak.upgrade() else {
            return;
        };
        debug!(
            collection = %event.collection,
            kind = ?event.kind,
            id = %event.record_id,
            "change event"
        );
        if let Err(error) = inner.refresh_collection(event.collection) {
            warn!(%error, collection = %event.collection, "re-fetch after change failed");
        }
    }

    fn refresh_collection(&self, collection: Collection) -> StoreResult<()> {
        let order_field = match collection {
            Collection::Todos => "created_at",
            Collection::Schedules => "start_time",
        };
        let query = Query::new()
            .filter("owner_id", self.owner_id.clone())
            .order_asc(order_field);
        let rows = self.store.query(collection, &query)?;
        let guarded: Vec<String> = {
            let pending = self.pending.lock();
            pending
                .rows
                .keys()
                .filter(|(c, _)| *c == collection)
                .map(|(_, id)| id.clone())
                .collect()
        };
        match collection {
            Collection::Todos => {
                let mut fresh = decode_rows::<Todo>(collection, rows);
                let mut state = self.state.write();
                preserve_guarded(&mut fresh, &state.todos, &guarded, |todo| &todo.id);
                state.todos = fresh;
            }
            Collection::Schedules => {
                let mut fresh = decode_rows::<Schedule>(collection, rows);
                let mut state = self.state.write();
                preserve_guarded(&mut fresh, &state.schedules, &guarded, |schedule| {
                    &schedule.id
                });
                state.schedules = fresh;
            }
        }
        Ok(())
    }

    fn mark_pending(&self, collection: Collection, id: &str) -> u64 {
        let mut pending = self.pending.lock();
        pending.next_token += 1;
        let token = pending.next_token;
        pending.rows.insert((collection, id.to_owned()), token);
        token
    }

    fn clear_pending(&self, collection: Collection, id: &str, token: u64) {
        let mut pending = self.pending.lock();
        let key = (collection, id.to_owned());
        if pending.rows.get(&key) == Some(&token) {
            pending.rows.remove(&key);
        }
    }

    /// Logs a storage failure, restores the cache from the backend and
    /// tells the user. Errors are surfaced, never swallowed.
    fn surface_failure(
        &self,
        collection: Collection,
        action: &str,
        failure: StoreError,
    ) -> SyncError {
        error!(error = %failure, collection = %collection, action, "storage write failed");
        if let Err(refresh_error) = self.refresh_collection(collection) {
            warn!(%refresh_error, collection = %collection, "re-fetch after failure also failed");
        }
        if let Some(sink) = &self.sink {
            let notification = if failure.is_auth() {
                Notification::error("Sign in required", "Sign in to keep your changes synced.")
            } else {
                Notification::error(format!("Couldn't {action}"), failure.to_string())
            };
            sink.deliver(&notification);
        }
        SyncError::Store(failure)
    }

    /// Re-arms the reminder for a schedule's next occurrence.
    fn queue_reminder(&self, schedule: &Schedule) {
        let Some(sink) = &self.sink else {
            return;
        };
        let today = Utc::now().date_naive();
        let Some(upcoming) = recurrence::next_occurrence(schedule, today) else {
            sink.clear_reminder(&schedule.id);
            return;
        };
        let lead = Duration::minutes(self.config.reminder_lead_minutes);
        let fire_at = Utc.from_utc_datetime(&upcoming.start) - lead;
        sink.schedule_reminder(&ReminderRequest {
            schedule_id: schedule.id.clone(),
            title: schedule.title.clone(),
            fire_at,
        });
    }
}

fn decode_rows<T: serde::de::DeserializeOwned>(collection: Collection, rows: Vec<Value>) -> Vec<T> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<T>(row) {
            Ok(decoded) => Some(decoded),
            Err(error) => {
                warn!(%error, collection = %collection, "skipping malformed row");
                None
            }
        })
        .collect()
}

/// Replaces freshly fetched rows with their cached versions for every
/// record that still has an optimistic write in flight.
fn preserve_guarded<T: Clone>(
    fresh: &mut Vec<T>,
    cached: &[T],
    guarded_ids: &[String],
    id_of: impl Fn(&T) -> &str,
) {
    for id in guarded_ids {
        let Some(local) = cached.iter().find(|item| id_of(item) == id) else {
            continue;
        };
        if let Some(slot) = fresh.iter_mut().find(|item| id_of(item) == id) {
            *slot = local.clone();
        } else {
            fresh.push(local.clone());
        }
    }
}
