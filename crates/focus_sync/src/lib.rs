//! Data access for the focus planner. Storage backends implement
//! [`RecordStore`]; [`SyncService`] layers caching, change
//! subscriptions, optimistic edits and user-facing error reporting on
//! top of whichever store it is given.

pub mod error;
pub mod memory;
pub mod service;
pub mod store;

pub use error::{StoreError, StoreResult, SyncError, SyncResult};
pub use memory::MemoryStore;
pub use service::{SyncService, SyncServiceBuilder};
pub use store::{
    ChangeEvent, ChangeHandler, ChangeKind, Collection, Query, RecordStore, Subscription,
    SubscriptionId,
};
