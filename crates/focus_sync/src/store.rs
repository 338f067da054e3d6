//! Storage contract the service is built against.
//!
//! The service never talks to a concrete backend; it receives an
//! `Arc<dyn RecordStore>` and works purely in terms of collections of
//! JSON rows. [`crate::memory::MemoryStore`] implements the contract
//! for local use and tests; a remote adapter implements the same trait
//! against its wire API.

use std::fmt;
use std::sync::{Arc, Weak};

use serde_json::Value;

use crate::error::StoreResult;

/// Collections this app reads and writes. User settings and push
/// subscriptions exist server-side but are owned by other surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Todos,
    Schedules,
}

impl Collection {
    pub fn name(self) -> &'static str {
        match self {
            Collection::Todos => "todos",
            Collection::Schedules => "schedules",
        }
    }

    /// Singular noun for error messages.
    pub fn entity(self) -> &'static str {
        match self {
            Collection::Todos => "todo",
            Collection::Schedules => "schedule",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Equality filters plus ordering and a row cap: the only query shape
/// the app needs.
#[derive(Debug, Clone, Default)]
pub struct Query {
    filters: Vec<(String, Value)>,
    order: Option<(String, bool)>,
    limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push((field.to_owned(), value.into()));
        self
    }

    pub fn order_asc(mut self, field: &str) -> Self {
        self.order = Some((field.to_owned(), true));
        self
    }

    pub fn order_desc(mut self, field: &str) -> Self {
        self.order = Some((field.to_owned(), false));
        self
    }

    pub fn limit(mut self, rows: usize) -> Self {
        self.limit = Some(rows);
        self
    }

    pub fn filters(&self) -> &[(String, Value)] {
        &self.filters
    }

    /// Ordering as `(field, ascending)`, if any.
    pub fn ordering(&self) -> Option<(&str, bool)> {
        self.order.as_ref().map(|(field, asc)| (field.as_str(), *asc))
    }

    pub fn max_rows(&self) -> Option<usize> {
        self.limit
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

/// Notification that a collection changed. Carries no row data: the
/// subscriber re-fetches, so one code path serves every change shape.
#[derive(Debug, Clone)]
pub struct ChangeEvent {
    pub collection: Collection,
    pub kind: ChangeKind,
    pub record_id: String,
}

pub type ChangeHandler = Arc<dyn Fn(&ChangeEvent) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// Backend contract. All mutations are remote-first: they return only
/// after the backend accepted the write, and the backend is the one
/// emitting the matching [`ChangeEvent`].
pub trait RecordStore: Send + Sync {
    fn query(&self, collection: Collection, query: &Query) -> StoreResult<Vec<Value>>;

    /// Inserts a row, filling in server-assigned fields, and returns
    /// the stored row.
    fn insert(&self, collection: Collection, record: Value) -> StoreResult<Value>;

    /// Merges `patch` into an existing row and returns the result.
    fn update(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<Value>;

    fn delete(&self, collection: Collection, id: &str) -> StoreResult<()>;

    /// Adds the given deltas to numeric fields of one row, atomically
    /// with respect to concurrent writers, and returns the result.
    fn increment(
        &self,
        collection: Collection,
        id: &str,
        deltas: &[(&str, i64)],
    ) -> StoreResult<Value>;

    fn subscribe(&self, collection: Collection, handler: ChangeHandler)
        -> StoreResult<SubscriptionId>;

    fn unsubscribe(&self, subscription: SubscriptionId);
}

/// Detaches its change handler when dropped.
pub struct Subscription {
    store: Weak<dyn RecordStore>,
    id: SubscriptionId,
}

impl Subscription {
    pub fn new(store: &Arc<dyn RecordStore>, id: SubscriptionId) -> Self {
        Self {
            store: Arc::downgrade(store),
            id,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(store) = self.store.upgrade() {
            store.unsubscribe(self.id);
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
