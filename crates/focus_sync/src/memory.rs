//! In-memory [`RecordStore`] used for local mode and tests. Behaves
//! like the remote backend: server-assigned ids and timestamps, merge
//! semantics for updates, and a change event after every mutation.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::error::{StoreError, StoreResult};
use crate::store::{
    ChangeEvent, ChangeHandler, ChangeKind, Collection, Query, RecordStore, SubscriptionId,
};

#[derive(Default)]
struct Tables {
    todos: Vec<Value>,
    schedules: Vec<Value>,
}

impl Tables {
    fn rows(&self, collection: Collection) -> &Vec<Value> {
        match collection {
            Collection::Todos => &self.todos,
            Collection::Schedules => &self.schedules,
        }
    }

    fn rows_mut(&mut self, collection: Collection) -> &mut Vec<Value> {
        match collection {
            Collection::Todos => &mut self.todos,
            Collection::Schedules => &mut self.schedules,
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    handlers: RwLock<Vec<(SubscriptionId, Collection, ChangeHandler)>>,
    next_subscription: AtomicU64,
    fault: Mutex<Option<StoreError>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next storage call fail with `error`. Used by tests to
    /// exercise failure paths without a real backend.
    pub fn fail_next_with(&self, error: StoreError) {
        *self.fault.lock() = Some(error);
    }

    fn take_fault(&self) -> StoreResult<()> {
        match self.fault.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Handlers run synchronously but strictly after the table lock is
    /// released, so a handler may call straight back into the store.
    fn emit(&self, event: ChangeEvent) {
        let interested: Vec<ChangeHandler> = {
            let handlers = self.handlers.read();
            handlers
                .iter()
                .filter(|(_, collection, _)| *collection == event.collection)
                .map(|(_, _, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in interested {
            handler(&event);
        }
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

fn find_row_mut<'a>(rows: &'a mut [Value], id: &str) -> Option<&'a mut Value> {
    rows.iter_mut().find(|row| row_id(row) == Some(id))
}

fn compare_fields(a: Option<&Value>, b: Option<&Value>) -> std::cmp::Ordering {
    use std::cmp::Ordering;
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

impl RecordStore for MemoryStore {
    fn query(&self, collection: Collection, query: &Query) -> StoreResult<Vec<Value>> {
        self.take_fault()?;
        let mut rows: Vec<Value> = {
            let tables = self.tables.read();
            tables
                .rows(collection)
                .iter()
                .filter(|row| {
                    query
                        .filters()
                        .iter()
                        .all(|(field, value)| row.get(field) == Some(value))
                })
                .cloned()
                .collect()
        };
        if let Some((field, ascending)) = query.ordering() {
            rows.sort_by(|a, b| {
                let ordering = compare_fields(a.get(field), b.get(field));
                if ascending {
                    ordering
                } else {
                    ordering.reverse()
                }
            });
        }
        if let Some(limit) = query.max_rows() {
            rows.truncate(limit);
        }
        debug!(collection = %collection, rows = rows.len(), "memory query");
        Ok(rows)
    }

    fn insert(&self, collection: Collection, record: Value) -> StoreResult<Value> {
        self.take_fault()?;
        let Value::Object(mut fields) = record else {
            return Err(StoreError::rejected("row must be a JSON object"));
        };
        let id = match fields.get("id").and_then(Value::as_str) {
            Some(existing) if !existing.is_empty() => existing.to_owned(),
            _ => Uuid::new_v4().to_string(),
        };
        fields.insert("id".into(), Value::String(id.clone()));
        let stamp = Utc::now().to_rfc3339();
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(stamp.clone()));
        fields.insert("updated_at".into(), Value::String(stamp));
        let stored = Value::Object(fields);
        self.tables.write().rows_mut(collection).push(stored.clone());
        self.emit(ChangeEvent {
            collection,
            kind: ChangeKind::Inserted,
            record_id: id,
        });
        Ok(stored)
    }

    fn update(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<Value> {
        self.take_fault()?;
        let Value::Object(patch_fields) = patch else {
            return Err(StoreError::rejected("patch must be a JSON object"));
        };
        let updated = {
            let mut tables = self.tables.write();
            let row = find_row_mut(tables.rows_mut(collection), id)
                .ok_or_else(|| StoreError::not_found(collection.entity(), id))?;
            let Some(fields) = row.as_object_mut() else {
                return Err(StoreError::malformed(collection, "row is not an object"));
            };
            for (key, value) in patch_fields {
                fields.insert(key, value);
            }
            fields.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
            row.clone()
        };
        self.emit(ChangeEvent {
            collection,
            kind: ChangeKind::Updated,
            record_id: id.to_owned(),
        });
        Ok(updated)
    }

    fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.take_fault()?;
        {
            let mut tables = self.tables.write();
            let rows = tables.rows_mut(collection);
            let before = rows.len();
            rows.retain(|row| row_id(row) != Some(id));
            if rows.len() == before {
                return Err(StoreError::not_found(collection.entity(), id));
            }
        }
        self.emit(ChangeEvent {
            collection,
            kind: ChangeKind::Deleted,
            record_id: id.to_owned(),
        });
        Ok(())
    }

    fn increment(
        &self,
        collection: Collection,
        id: &str,
        deltas: &[(&str, i64)],
    ) -> StoreResult<Value> {
        self.take_fault()?;
        let updated = {
            let mut tables = self.tables.write();
            let row = find_row_mut(tables.rows_mut(collection), id)
                .ok_or_else(|| StoreError::not_found(collection.entity(), id))?;
            let Some(fields) = row.as_object_mut() else {
                return Err(StoreError::malformed(collection, "row is not an object"));
            };
            for (field, delta) in deltas.iter().copied() {
                let current = fields.get(field).and_then(Value::as_i64).unwrap_or(0);
                fields.insert(field.to_owned(), Value::from(current + delta));
            }
            fields.insert("updated_at".into(), Value::String(Utc::now().to_rfc3339()));
            row.clone()
        };
        self.emit(ChangeEvent {
            collection,
            kind: ChangeKind::Updated,
            record_id: id.to_owned(),
        });
        Ok(updated)
    }

    fn subscribe(
        &self,
        collection: Collection,
        handler: ChangeHandler,
    ) -> StoreResult<SubscriptionId> {
        let id = SubscriptionId(self.next_subscription.fetch_add(1, AtomicOrdering::Relaxed));
        self.handlers.write().push((id, collection, handler));
        Ok(id)
    }

    fn unsubscribe(&self, subscription: SubscriptionId) {
        self.handlers
            .write()
            .retain(|(id, _, _)| *id != subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Subscription;
    use serde_json::json;

    #[test]
    fn insert_fills_in_server_assigned_fields() {
        let store = MemoryStore::new();
        let stored = store
            .insert(Collection::Todos, json!({ "title": "Water plants" }))
            .unwrap();
        assert!(!stored["id"].as_str().unwrap().is_empty());
        assert!(stored["created_at"].is_string());
        assert!(stored["updated_at"].is_string());
    }

    #[test]
    fn update_merges_the_patch_into_the_row() {
        let store = MemoryStore::new();
        let stored = store
            .insert(
                Collection::Todos,
                json!({ "title": "Water plants", "completed": false }),
            )
            .unwrap();
        let id = stored["id"].as_str().unwrap();

        let updated = store
            .update(Collection::Todos, id, json!({ "completed": true }))
            .unwrap();
        assert_eq!(updated["completed"], json!(true));
        assert_eq!(updated["title"], json!("Water plants"));
    }

    #[test]
    fn missing_rows_surface_not_found() {
        let store = MemoryStore::new();
        let error = store
            .update(Collection::Schedules, "ghost", json!({}))
            .unwrap_err();
        assert_eq!(error.to_string(), "schedule ghost not found");
        assert!(store.delete(Collection::Todos, "ghost").is_err());
    }

    #[test]
    fn increment_starts_missing_counters_at_zero() {
        let store = MemoryStore::new();
        let stored = store
            .insert(Collection::Todos, json!({ "title": "Read" }))
            .unwrap();
        let id = stored["id"].as_str().unwrap();

        let updated = store
            .increment(
                Collection::Todos,
                id,
                &[("total_time_spent", 900), ("session_count", 1)],
            )
            .unwrap();
        assert_eq!(updated["total_time_spent"], json!(900));
        assert_eq!(updated["session_count"], json!(1));

        let again = store
            .increment(Collection::Todos, id, &[("total_time_spent", 600)])
            .unwrap();
        assert_eq!(again["total_time_spent"], json!(1500));
    }

    #[test]
    fn query_applies_filters_ordering_and_limit() {
        let store = MemoryStore::new();
        for (title, owner, spent) in [
            ("one", "me", 30),
            ("two", "me", 10),
            ("other", "them", 99),
            ("three", "me", 20),
        ] {
            store
                .insert(
                    Collection::Todos,
                    json!({ "title": title, "owner_id": owner, "total_time_spent": spent }),
                )
                .unwrap();
        }

        let rows = store
            .query(
                Collection::Todos,
                &Query::new()
                    .filter("owner_id", "me")
                    .order_desc("total_time_spent")
                    .limit(2),
            )
            .unwrap();
        let titles: Vec<&str> = rows.iter().map(|row| row["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["one", "three"]);
    }

    #[test]
    fn unfiltered_queries_keep_insertion_order() {
        let store = MemoryStore::new();
        for title in ["a", "b", "c"] {
            store
                .insert(Collection::Schedules, json!({ "title": title }))
                .unwrap();
        }
        let rows = store
            .query(Collection::Schedules, &Query::new())
            .unwrap();
        let titles: Vec<&str> = rows.iter().map(|row| row["title"].as_str().unwrap()).collect();
        assert_eq!(titles, vec!["a", "b", "c"]);
    }

    #[test]
    fn change_handlers_may_reenter_the_store() {
        let store = Arc::new(MemoryStore::new());
        let seen: Arc<Mutex<Vec<(ChangeKind, usize)>>> = Arc::new(Mutex::new(Vec::new()));

        let store_in_handler = Arc::clone(&store);
        let seen_in_handler = Arc::clone(&seen);
        store
            .subscribe(
                Collection::Todos,
                Arc::new(move |event| {
                    let rows = store_in_handler
                        .query(Collection::Todos, &Query::new())
                        .unwrap();
                    seen_in_handler.lock().push((event.kind, rows.len()));
                }),
            )
            .unwrap();

        let stored = store
            .insert(Collection::Todos, json!({ "title": "Ship it" }))
            .unwrap();
        store
            .delete(Collection::Todos, stored["id"].as_str().unwrap())
            .unwrap();

        assert_eq!(
            seen.lock().as_slice(),
            &[(ChangeKind::Inserted, 1), (ChangeKind::Deleted, 0)]
        );
    }

    #[test]
    fn dropping_a_subscription_detaches_its_handler() {
        let store: Arc<dyn RecordStore> = Arc::new(MemoryStore::new());
        let seen: Arc<Mutex<usize>> = Arc::new(Mutex::new(0));

        let seen_in_handler = Arc::clone(&seen);
        let id = store
            .subscribe(
                Collection::Todos,
                Arc::new(move |_| *seen_in_handler.lock() += 1),
            )
            .unwrap();
        let guard = Subscription::new(&store, id);

        store
            .insert(Collection::Todos, json!({ "title": "first" }))
            .unwrap();
        drop(guard);
        store
            .insert(Collection::Todos, json!({ "title": "second" }))
            .unwrap();

        assert_eq!(*seen.lock(), 1);
    }

    #[test]
    fn injected_faults_fail_exactly_one_call() {
        let store = MemoryStore::new();
        store.fail_next_with(StoreError::unreachable("socket closed"));
        assert!(store.query(Collection::Todos, &Query::new()).is_err());
        assert!(store.query(Collection::Todos, &Query::new()).is_ok());
    }
}
